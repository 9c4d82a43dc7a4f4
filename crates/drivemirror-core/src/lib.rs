//! DriveMirror Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Connection`, `SyncSettings`, `SyncState`, `MirrorItem`, `AuditEntry`
//! - **Use cases** - `TokenManager`, `FolderRegistrar`, `SyncStarter`, `FolderIndexer`,
//!   `SyncRunner`, `ChangesPuller`, `SyncOrchestrator`, `Diagnostics`
//! - **Port definitions** - Traits for adapters: `IDriveProvider`, `IStateStore`,
//!   `ICredentialVault`
//! - **Crawl state machine** - the durable, budget-bounded breadth-first crawl queue
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
