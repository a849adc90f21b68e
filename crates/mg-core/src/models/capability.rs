use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tool advertised by a server's `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    pub name: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Outcome of the best-effort capability discovery that follows a warmup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    NotAttempted,
    Failed(String),
    Populated(usize),
}
