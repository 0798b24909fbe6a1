use serde::{Deserialize, Serialize};

/// Response of `GET /claims`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimList {
    /// Claim identifiers the backend can serve, sorted.
    #[serde(default)]
    pub available_claims: Vec<String>,

    /// Number of claims.
    #[serde(default)]
    pub total: usize,
}

impl ClaimList {
    /// Returns true if `claim_id` is among the available claims.
    pub fn contains(&self, claim_id: &str) -> bool {
        self.available_claims.iter().any(|id| id == claim_id)
    }
}
