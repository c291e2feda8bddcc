pub mod audit;

pub use audit::{AuditAction, AuditEntryBuilder, AuditService};
