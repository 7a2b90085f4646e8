use serde::{Deserialize, Serialize};

use crate::runtime::{DEFAULT_MAX_CALL_DEPTH, Locality};

/// Engine settings, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for [`crate::Engine::run_blocking`]
    pub worker_threads: usize,
    /// Function frames allowed before `StackOverflow`
    pub max_call_depth: usize,
    /// Spawn sibling operands onto the tokio pool
    pub parallel_operands: bool,
    pub locality: Option<Locality>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            parallel_operands: true,
            locality: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    pub fn with_parallel_operands(mut self, parallel: bool) -> Self {
        self.parallel_operands = parallel;
        self
    }

    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = Some(locality);
        self
    }
}
