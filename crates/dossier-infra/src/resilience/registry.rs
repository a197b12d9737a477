use std::fmt;
use std::sync::Arc;

use dossier_core::BreakerPolicy;
use serde::Serialize;

use super::breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};

/// Guarded operation categories. Each one owns a single breaker for the life
/// of the process so that failure statistics accumulate across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCategory {
    Bootstrap,
    Upload,
    Status,
}

impl OperationCategory {
    pub const ALL: [OperationCategory; 3] = [
        OperationCategory::Bootstrap,
        OperationCategory::Upload,
        OperationCategory::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationCategory::Bootstrap => "bootstrap",
            OperationCategory::Upload => "upload",
            OperationCategory::Status => "status",
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One breaker per [`OperationCategory`].
#[derive(Debug, Clone)]
pub struct CircuitBreakers {
    bootstrap: Arc<CircuitBreaker>,
    upload: Arc<CircuitBreaker>,
    status: Arc<CircuitBreaker>,
}

impl CircuitBreakers {
    pub fn new(policy: BreakerPolicy) -> Self {
        let make = |category: OperationCategory| {
            Arc::new(CircuitBreaker::new(category.as_str(), policy))
        };
        Self {
            bootstrap: make(OperationCategory::Bootstrap),
            upload: make(OperationCategory::Upload),
            status: make(OperationCategory::Status),
        }
    }

    pub fn get(&self, category: OperationCategory) -> &Arc<CircuitBreaker> {
        match category {
            OperationCategory::Bootstrap => &self.bootstrap,
            OperationCategory::Upload => &self.upload,
            OperationCategory::Status => &self.status,
        }
    }

    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        OperationCategory::ALL
            .iter()
            .map(|category| self.get(*category).snapshot())
            .collect()
    }

    /// True when any request-serving circuit (upload or status) is open.
    pub fn any_serving_open(&self) -> bool {
        [OperationCategory::Upload, OperationCategory::Status]
            .iter()
            .any(|category| self.get(*category).state() == CircuitState::Open)
    }
}
