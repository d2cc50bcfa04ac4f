//! Collaborator contracts the dispatch engine is written against.

pub mod gateway;
pub mod row_store;
pub mod store;

pub use gateway::MessageGateway;
pub use row_store::RowStore;
pub use store::{AuditSink, MessageLog, TenantDirectory};
