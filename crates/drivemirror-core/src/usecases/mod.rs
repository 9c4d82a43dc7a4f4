//! Use cases (application layer)
//!
//! Each use case coordinates the domain entities with the ports. This is
//! where the sync engine's behavior lives:
//! - `TokenManagerUseCase` — OAuth lifecycle and audited credential access
//! - `SetFolderUseCase` — configuring the mirror root
//! - `StartSyncUseCase` — reconciling crawl state against the settings
//! - `IndexFolderUseCase` — seeding the queue from the root's children
//! - `RunSyncUseCase` — budgeted breadth-first crawl batches
//! - `PullChangesUseCase` — cursor-based incremental updates
//! - `OrchestrateSyncUseCase` — the start/index/run/pull loop with retry policy
//! - `DiagnosticsUseCase` — read-only state snapshot

pub mod diagnostics;
pub mod index_folder;
pub mod orchestrate;
pub mod pull_changes;
pub mod run_sync;
pub mod set_folder;
pub mod start_sync;
pub mod token_manager;

pub use diagnostics::{DiagnosticsSnapshot, DiagnosticsUseCase};
pub use index_folder::{IndexFolderUseCase, IndexOutcome};
pub use orchestrate::{OrchestrateSyncUseCase, OrchestratorPolicy, SyncReport};
pub use pull_changes::{PullChangesUseCase, PullReport};
pub use run_sync::{RunOutcome, RunSyncUseCase};
pub use set_folder::SetFolderUseCase;
pub use start_sync::StartSyncUseCase;
pub use token_manager::TokenManagerUseCase;
