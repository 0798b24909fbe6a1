use serde::{Deserialize, Serialize};

/// Body of a `POST /chat` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The query, already composed with any claim context.
    pub query: String,

    /// Correlation token grouping every turn of one conversation on the backend.
    pub thread_id: String,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            thread_id: thread_id.into(),
        }
    }
}
