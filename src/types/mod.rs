// Public modules
pub mod chat_message;
pub mod chat_request;
pub mod claim_list;
pub mod claim_summary;
pub mod health_status;

// Re-exports
pub use chat_message::{ChatMessage, ChatRole, MessageStatus};
pub use chat_request::ChatRequest;
pub use claim_list::ClaimList;
pub use claim_summary::{Adjustment, ClaimSummary, Diagnosis, LineItem, ServicePeriod};
pub use health_status::HealthStatus;
