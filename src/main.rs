use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde_json::json;

use playbook_engine::config::Config;
use playbook_engine::executors::{CapabilityRegistry, DebugCapability};
use playbook_engine::playbook::{parse_playbook_file, validate_playbook, Variable};
use playbook_engine::storage::MemoryRepository;
use playbook_engine::{telemetry, Engine};

#[derive(Parser)]
#[command(name = "playbook-engine")]
#[command(about = "Execute security playbooks as step graphs", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/playbook-engine/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a playbook file
    Validate {
        /// Path to playbook JSON or YAML file
        file: PathBuf,
    },
    /// Validate and execute a playbook file
    Run {
        /// Path to playbook JSON or YAML file
        file: PathBuf,
        /// Directory holding playbooks called by playbook-action steps
        #[arg(short, long)]
        playbooks: Option<PathBuf>,
        /// Playbook variable overrides (name=value)
        #[arg(short, long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Agent names served by the debug capability
        #[arg(long = "debug-agent")]
        debug_agents: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid variable format '{}'. Expected name=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    telemetry::init_telemetry(&config.logging);

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file)?,
        Commands::Run {
            file,
            playbooks,
            vars,
            debug_agents,
        } => {
            let succeeded = cmd_run(&config, &file, playbooks, &vars, &debug_agents).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Completions { shell } => cmd_completions(shell)?,
    }

    Ok(())
}

/// Shell completion variants
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

fn cmd_completions(shell: CompletionShell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let playbook = parse_playbook_file(file)?;
    match validate_playbook(&playbook) {
        Ok(()) => print_json(&json!({
            "success": true,
            "playbook_id": playbook.id,
            "name": playbook.name,
            "steps": playbook.workflow.len(),
            "agents": playbook.agent_definitions.len(),
            "targets": playbook.target_definitions.len(),
        })),
        Err(e) => {
            print_json(&e.to_json())?;
            std::process::exit(1);
        }
    }
}

/// Returns whether the playbook ran to completion.
async fn cmd_run(
    config: &Config,
    file: &Path,
    playbooks: Option<PathBuf>,
    vars: &[(String, String)],
    debug_agents: &[String],
) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let mut playbook = parse_playbook_file(file)?;
    for (name, value) in vars {
        playbook
            .playbook_variables
            .insert_or_replace(Variable::new(name, value));
    }

    let repository = MemoryRepository::new();
    if let Some(dir) = playbooks.or_else(|| config.playbooks.directory.clone()) {
        repository.load_dir(&dir).await?;
    }

    let mut capabilities = CapabilityRegistry::new().with(Arc::new(DebugCapability::new()));
    for agent in debug_agents {
        capabilities.register(Arc::new(DebugCapability::named(agent)));
    }

    let engine = Engine::from_config(config, capabilities, Arc::new(repository))?;
    match engine.run(&playbook).await {
        Ok(details) => {
            let report = engine.cache().get_execution_report(details.execution_id).ok();
            print_json(&json!({
                "success": true,
                "execution": details,
                "report": report,
            }))?;
            Ok(true)
        }
        Err(e) => {
            let report = e
                .execution_details()
                .and_then(|details| engine.cache().get_execution_report(details.execution_id).ok());
            let mut output = e.to_json();
            output["report"] = serde_json::to_value(&report)?;
            print_json(&output)?;
            Ok(false)
        }
    }
}
