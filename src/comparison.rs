//! Condition expressions for if/while steps.
//!
//! The built-in [`ComparisonEvaluator`] understands a small comparison
//! language:
//!
//! ```text
//! __severity__:value >= 7 AND __ip__:value IN ('10.0.0.1', '10.0.0.2')
//! __host__:value MATCHES '^web-[0-9]+$' OR __override__:value = true
//! ```
//!
//! Operands are bare words or single-quoted literals; `name:value`
//! placeholders inside them are replaced from the step scope. Two operands
//! that both parse as numbers are compared numerically, anything else is
//! compared as text. `AND` binds tighter than `OR`; parentheses group.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::playbook::Variables;

/// Evaluates a boolean expression against a variable scope.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, variables: &Variables) -> Result<bool>;
}

/// The default comparison-language evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEvaluator;

impl ComparisonEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ConditionEvaluator for ComparisonEvaluator {
    fn evaluate(&self, expression: &str, variables: &Variables) -> Result<bool> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(Error::Condition("empty condition".to_string()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(Error::Condition(format!(
                "unexpected {} in condition '{}'",
                token.describe(),
                expression
            )));
        }

        expr.eval(variables)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Quoted(q) => format!("'{}'", q),
            Token::Op(op) => format!("operator {:?}", op),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(_, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                literal.push(escaped);
                            }
                        }
                        '\'' => {
                            closed = true;
                            break;
                        }
                        other => literal.push(other),
                    }
                }
                if !closed {
                    return Err(Error::Condition(format!(
                        "unterminated string literal in '{}'",
                        input
                    )));
                }
                tokens.push(Token::Quoted(literal));
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let next_is_eq = matches!(chars.peek(), Some(&(_, '=')));
                let op = match (ch, next_is_eq) {
                    ('=', _) => {
                        // Accept both '=' and '=='
                        if next_is_eq {
                            chars.next();
                        }
                        CompareOp::Eq
                    }
                    ('!', true) => {
                        chars.next();
                        CompareOp::Ne
                    }
                    ('<', true) => {
                        chars.next();
                        CompareOp::Le
                    }
                    ('>', true) => {
                        chars.next();
                        CompareOp::Ge
                    }
                    ('<', false) => CompareOp::Lt,
                    ('>', false) => CompareOp::Gt,
                    _ => {
                        return Err(Error::Condition(format!(
                            "unexpected '!' in condition '{}'",
                            input
                        )))
                    }
                };
                tokens.push(Token::Op(op));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | ',' | '\'' | '=' | '!' | '<' | '>')
                    {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug)]
struct Operand {
    text: String,
}

impl Operand {
    fn resolve(&self, variables: &Variables) -> String {
        variables.interpolate(&self.text)
    }
}

#[derive(Debug)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Compare(Operand, CompareOp, Operand),
    In {
        lhs: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    Matches(Operand, Operand),
    Literal(Operand),
}

impl Expr {
    fn eval(&self, variables: &Variables) -> Result<bool> {
        match self {
            Expr::Or(terms) => {
                for term in terms {
                    if term.eval(variables)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::And(terms) => {
                for term in terms {
                    if !term.eval(variables)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Compare(lhs, op, rhs) => {
                let ordering = compare(&lhs.resolve(variables), &rhs.resolve(variables));
                Ok(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                })
            }
            Expr::In { lhs, list, negated } => {
                let value = lhs.resolve(variables);
                let found = list
                    .iter()
                    .any(|item| compare(&value, &item.resolve(variables)) == Ordering::Equal);
                Ok(found != *negated)
            }
            Expr::Matches(lhs, pattern) => {
                let pattern = pattern.resolve(variables);
                let regex = regex_lite::Regex::new(&pattern).map_err(|e| {
                    Error::Condition(format!("Invalid regex '{}': {}", pattern, e))
                })?;
                Ok(regex.is_match(&lhs.resolve(variables)))
            }
            Expr::Literal(operand) => {
                let value = operand.resolve(variables);
                match value.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    _ => Err(Error::Condition(format!(
                        "'{}' is not a boolean; expected a comparison",
                        value
                    ))),
                }
            }
        }
    }
}

fn compare(lhs: &str, rhs: &str) -> Ordering {
    match (lhs.trim().parse::<f64>(), rhs.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => lhs.cmp(rhs),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::Condition(format!(
                "expected {} but found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(Error::Condition(format!(
                "expected {} at end of condition",
                expected.describe()
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_and()?];
        while self.peek().is_some_and(|t| t.is_keyword("OR")) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_comparison()?];
        while self.peek().is_some_and(|t| t.is_keyword("AND")) {
            self.pos += 1;
            terms.push(self.parse_comparison()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        let lhs = self.parse_operand()?;

        match self.peek().cloned() {
            Some(Token::Op(op)) => {
                self.pos += 1;
                let rhs = self.parse_operand()?;
                Ok(Expr::Compare(lhs, op, rhs))
            }
            Some(token) if token.is_keyword("IN") => {
                self.pos += 1;
                let list = self.parse_list()?;
                Ok(Expr::In {
                    lhs,
                    list,
                    negated: false,
                })
            }
            Some(token)
                if token.is_keyword("NOT")
                    && self.peek_at(1).is_some_and(|t| t.is_keyword("IN")) =>
            {
                self.pos += 2;
                let list = self.parse_list()?;
                Ok(Expr::In {
                    lhs,
                    list,
                    negated: true,
                })
            }
            Some(token) if token.is_keyword("MATCHES") => {
                self.pos += 1;
                let pattern = self.parse_operand()?;
                Ok(Expr::Matches(lhs, pattern))
            }
            _ => Ok(Expr::Literal(lhs)),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Operand>> {
        self.expect(Token::LParen)?;
        let mut items = vec![self.parse_operand()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            items.push(self.parse_operand()?);
        }
        self.expect(Token::RParen)?;
        Ok(items)
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::Quoted(text)) => Ok(Operand { text }),
            Some(Token::Word(text))
                if !["AND", "OR", "IN", "NOT", "MATCHES"]
                    .iter()
                    .any(|k| text.eq_ignore_ascii_case(k)) =>
            {
                Ok(Operand { text })
            }
            Some(token) => Err(Error::Condition(format!(
                "expected an operand but found {}",
                token.describe()
            ))),
            None => Err(Error::Condition(
                "expected an operand at end of condition".to_string(),
            )),
        }
    }
}
