//! DriveMirror Audit - audit trail service
//!
//! Provides:
//! - `AuditLogger`: High-level service for recording and querying audit entries
//! - `ReasonCode`: Stable reason codes for failed operations
//! - Integration with `IStateStore` for persistent audit storage

pub mod logger;
pub mod reason;

pub use logger::AuditLogger;
pub use reason::ReasonCode;
