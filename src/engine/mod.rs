//! Playbook execution engine.

mod decomposer;
mod runtime;

pub use decomposer::{Decomposer, ExecutionDetails};
pub use runtime::{Clock, IdGenerator, SystemClock, UuidGenerator};

use std::sync::Arc;

use tracing::{info, instrument};

use crate::comparison::{ComparisonEvaluator, ConditionEvaluator};
use crate::config::Config;
use crate::error::Result;
use crate::executors::{
    ActionExecutor, CapabilityRegistry, ConditionExecutor, DecomposerFactory,
    PlaybookActionExecutor,
};
use crate::playbook::{validate_playbook, Playbook};
use crate::reporter::{DownstreamReporter, ExecutionCache, Reporter};
use crate::storage::PlaybookRepository;

/// Shared collaborators for running playbooks.
///
/// Cloning is cheap; every clone feeds the same reporter and cache.
#[derive(Clone)]
pub struct Engine {
    capabilities: Arc<CapabilityRegistry>,
    evaluator: Arc<dyn ConditionEvaluator>,
    repository: Arc<dyn PlaybookRepository>,
    reporter: Arc<Reporter>,
    cache: Arc<ExecutionCache>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Engine {
    /// Create an engine with default limits and a cache-backed reporter.
    pub fn new(
        capabilities: CapabilityRegistry,
        repository: Arc<dyn PlaybookRepository>,
    ) -> Self {
        let cache = Arc::new(ExecutionCache::default());
        Self {
            capabilities: Arc::new(capabilities),
            evaluator: Arc::new(ComparisonEvaluator::new()),
            repository,
            reporter: Arc::new(Reporter::with_cache(cache.clone())),
            cache,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Create an engine sized from configuration.
    pub fn from_config(
        config: &Config,
        capabilities: CapabilityRegistry,
        repository: Arc<dyn PlaybookRepository>,
    ) -> Result<Self> {
        let cache = Arc::new(ExecutionCache::new(config.cache.max_executions));
        let reporter = Reporter::new(config.reporter.max_reporters);
        let downstream: Arc<dyn DownstreamReporter> = cache.clone();
        reporter.register(vec![downstream])?;

        Ok(Self {
            capabilities: Arc::new(capabilities),
            evaluator: Arc::new(ComparisonEvaluator::new()),
            repository,
            reporter: Arc::new(reporter),
            cache,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        })
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Execution history fed by every run of this engine.
    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    /// Register extra downstream reporters here.
    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    pub fn repository(&self) -> &Arc<dyn PlaybookRepository> {
        &self.repository
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Build a decomposer wired to this engine's executors.
    pub fn decomposer(&self) -> Decomposer {
        let actions = ActionExecutor::new(self.capabilities.clone(), self.reporter.clone())
            .with_clock(self.clock.clone());
        let conditions = ConditionExecutor::new(self.evaluator.clone(), self.reporter.clone())
            .with_clock(self.clock.clone());
        let playbooks = PlaybookActionExecutor::new(
            self.repository.clone(),
            Arc::new(self.clone()),
            self.reporter.clone(),
        )
        .with_clock(self.clock.clone());

        Decomposer::new(
            Arc::new(actions),
            Arc::new(conditions),
            Arc::new(playbooks),
            self.reporter.clone(),
        )
        .with_clock(self.clock.clone())
        .with_id_generator(self.ids.clone())
    }

    /// Validate a playbook, then run it to completion.
    ///
    /// A failed run returns [`crate::Error::ExecutionFailed`] with the
    /// execution id; a playbook rejected by validation never gets one.
    #[instrument(name = "engine.run", skip_all, fields(playbook_id = %playbook.id))]
    pub async fn run(&self, playbook: &Playbook) -> Result<ExecutionDetails> {
        validate_playbook(playbook)?;
        info!("Playbook validated");
        self.decomposer().execute(playbook).await
    }

    /// Load a stored playbook by id and run it.
    pub async fn run_stored(&self, playbook_id: &str) -> Result<ExecutionDetails> {
        let playbook = self.repository.read(playbook_id).await?;
        self.run(&playbook).await
    }
}

impl DecomposerFactory for Engine {
    fn new_decomposer(&self) -> Decomposer {
        self.decomposer()
    }
}
