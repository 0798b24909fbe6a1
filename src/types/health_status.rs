use serde::{Deserialize, Serialize};

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// `"healthy"` or `"unhealthy"`.
    pub status: String,

    /// `"connected"` or `"disconnected"`.
    pub db_status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    pub fn is_db_connected(&self) -> bool {
        self.db_status == "connected"
    }
}
