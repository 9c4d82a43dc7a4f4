//! End-to-end engine behavior against in-memory port fakes
//!
//! Exercises the full crawl and changes pipeline without a database or
//! network: a scripted drive provider, a hash-map state store and a
//! hash-map vault.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use drivemirror_core::domain::{
    AuditAction, AuditEntry, AuthReason, Connection, FolderId, ItemKey, MirrorItem, PageToken,
    SyncError, SyncSettings, SyncState, SyncStatus, UserId,
};
use drivemirror_core::ports::{
    ChangeBatch, ChangeRecord, ICredentialVault, IDriveProvider, IStateStore, ProviderError,
    RemoteItem, Tokens,
};
use drivemirror_core::usecases::{
    DiagnosticsUseCase, IndexFolderUseCase, OrchestrateSyncUseCase, OrchestratorPolicy,
    PullChangesUseCase, RunSyncUseCase, SetFolderUseCase, StartSyncUseCase, TokenManagerUseCase,
};

// ============================================================================
// Fakes
// ============================================================================

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

fn remote_file(id: &str, name: &str, parent: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
        parent_id: Some(parent.to_string()),
        is_folder: false,
        thumbnail_link: Some(format!("https://lh3.example.com/t/{id}")),
        web_view_link: Some(format!("https://drive.example.com/view/{id}")),
        trashed: false,
        video: None,
        modified: None,
    }
}

fn remote_folder(id: &str, name: &str, parent: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: FOLDER_MIME.to_string(),
        parent_id: Some(parent.to_string()),
        is_folder: true,
        thumbnail_link: None,
        web_view_link: None,
        trashed: false,
        video: None,
        modified: None,
    }
}

/// Scripted drive provider: children per folder id plus a sequential
/// changes feed
#[derive(Default)]
struct FakeDrive {
    children: Mutex<HashMap<String, Vec<RemoteItem>>>,
    changes: Mutex<Vec<(u64, ChangeRecord)>>,
    seq: Mutex<u64>,
    refresh_unauthorized: AtomicBool,
}

impl FakeDrive {
    fn set_children(&self, folder_id: &str, items: Vec<RemoteItem>) {
        self.children
            .lock()
            .unwrap()
            .insert(folder_id.to_string(), items);
    }

    fn push_change(&self, record: ChangeRecord) {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        self.changes.lock().unwrap().push((*seq, record));
    }

    fn reject_refresh(&self) {
        self.refresh_unauthorized.store(true, Ordering::SeqCst);
    }

    fn tokens(expires_at: DateTime<Utc>) -> Tokens {
        Tokens {
            access_token: "access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_at,
            scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
        }
    }
}

#[async_trait::async_trait]
impl IDriveProvider for FakeDrive {
    fn consent_url(&self, force_consent: bool) -> String {
        format!("https://accounts.example.com/consent?force={force_consent}")
    }

    async fn exchange_code(&self, _code: &str) -> Result<Tokens, ProviderError> {
        Ok(Self::tokens(Utc::now() + chrono::Duration::hours(1)))
    }

    async fn refresh_tokens(&self, _refresh_token: &str) -> Result<Tokens, ProviderError> {
        if self.refresh_unauthorized.load(Ordering::SeqCst) {
            return Err(ProviderError::Unauthorized("invalid_grant".to_string()));
        }
        Ok(Self::tokens(Utc::now() + chrono::Duration::hours(1)))
    }

    async fn revoke_token(&self, _token: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn list_children(
        &self,
        _access_token: &str,
        folder_id: &FolderId,
    ) -> Result<Vec<RemoteItem>, ProviderError> {
        Ok(self
            .children
            .lock()
            .unwrap()
            .get(folder_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_change_cursor(
        &self,
        _access_token: &str,
    ) -> Result<PageToken, ProviderError> {
        let seq = *self.seq.lock().unwrap();
        PageToken::new(seq.to_string())
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn list_changes(
        &self,
        _access_token: &str,
        cursor: &PageToken,
    ) -> Result<ChangeBatch, ProviderError> {
        let since: u64 = cursor
            .as_str()
            .parse()
            .map_err(|_| ProviderError::Decode(format!("bad cursor {cursor}")))?;
        let head = *self.seq.lock().unwrap();
        let changes = self
            .changes
            .lock()
            .unwrap()
            .iter()
            .filter(|(seq, _)| *seq > since)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(ChangeBatch {
            changes,
            new_cursor: PageToken::new(head.max(since).to_string())
                .map_err(|e| ProviderError::Decode(e.to_string()))?,
        })
    }

    async fn count_changes(
        &self,
        _access_token: &str,
        cursor: &PageToken,
    ) -> Result<u64, ProviderError> {
        let since: u64 = cursor
            .as_str()
            .parse()
            .map_err(|_| ProviderError::Decode(format!("bad cursor {cursor}")))?;
        Ok(self
            .changes
            .lock()
            .unwrap()
            .iter()
            .filter(|(seq, _)| *seq > since)
            .count() as u64)
    }
}

#[derive(Default)]
struct MemStoreInner {
    connections: HashMap<UserId, Connection>,
    settings: HashMap<UserId, SyncSettings>,
    states: HashMap<UserId, SyncState>,
    items: HashMap<(UserId, String), MirrorItem>,
    audits: Vec<AuditEntry>,
}

#[derive(Default)]
struct MemStore {
    inner: Mutex<MemStoreInner>,
}

impl MemStore {
    fn audit_actions(&self) -> Vec<AuditAction> {
        self.inner
            .lock()
            .unwrap()
            .audits
            .iter()
            .map(|e| e.action().clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl IStateStore for MemStore {
    async fn save_connection(&self, connection: &Connection) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .connections
            .insert(*connection.user_id(), connection.clone());
        Ok(())
    }

    async fn get_connection(&self, user_id: &UserId) -> anyhow::Result<Option<Connection>> {
        Ok(self.inner.lock().unwrap().connections.get(user_id).cloned())
    }

    async fn delete_connection(&self, user_id: &UserId) -> anyhow::Result<()> {
        self.inner.lock().unwrap().connections.remove(user_id);
        Ok(())
    }

    async fn save_settings(&self, settings: &SyncSettings) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert(*settings.user_id(), settings.clone());
        Ok(())
    }

    async fn get_settings(&self, user_id: &UserId) -> anyhow::Result<Option<SyncSettings>> {
        Ok(self.inner.lock().unwrap().settings.get(user_id).cloned())
    }

    async fn save_sync_state(&self, state: &SyncState) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(*state.user_id(), state.clone());
        Ok(())
    }

    async fn get_sync_state(&self, user_id: &UserId) -> anyhow::Result<Option<SyncState>> {
        Ok(self.inner.lock().unwrap().states.get(user_id).cloned())
    }

    async fn upsert_item(&self, item: &MirrorItem) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .items
            .insert((*item.user_id(), item.item_key().to_string()), item.clone());
        Ok(())
    }

    async fn get_item(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<Option<MirrorItem>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .get(&(*user_id, item_key.to_string()))
            .cloned())
    }

    async fn mark_item_trashed(
        &self,
        user_id: &UserId,
        item_key: &ItemKey,
    ) -> anyhow::Result<()> {
        if let Some(item) = self
            .inner
            .lock()
            .unwrap()
            .items
            .get_mut(&(*user_id, item_key.to_string()))
        {
            item.mark_trashed();
        }
        Ok(())
    }

    async fn count_items(&self, user_id: &UserId) -> anyhow::Result<u64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| i.user_id() == user_id && !i.is_trashed())
            .count() as u64)
    }

    async fn count_trashed_items(&self, user_id: &UserId) -> anyhow::Result<u64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| i.user_id() == user_id && i.is_trashed())
            .count() as u64)
    }

    async fn list_items_in_folder(
        &self,
        user_id: &UserId,
        parent: &FolderId,
    ) -> anyhow::Result<Vec<MirrorItem>> {
        let mut items: Vec<MirrorItem> = self
            .inner
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| {
                i.user_id() == user_id && i.parent_folder_id() == parent && !i.is_trashed()
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(items)
    }

    async fn is_known_parent(
        &self,
        user_id: &UserId,
        folder_id: &FolderId,
    ) -> anyhow::Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .values()
            .any(|i| i.user_id() == user_id && i.parent_folder_id() == folder_id))
    }

    async fn save_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        self.inner.lock().unwrap().audits.push(entry.clone());
        Ok(())
    }

    async fn get_audit_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .inner
            .lock()
            .unwrap()
            .audits
            .iter()
            .filter(|e| e.timestamp() >= since)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[derive(Default)]
struct MemVault {
    secrets: Mutex<HashMap<String, String>>,
}

impl ICredentialVault for MemVault {
    fn store(&self, reference: &str, secret: &str) -> anyhow::Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(reference.to_string(), secret.to_string());
        Ok(())
    }

    fn load(&self, reference: &str) -> anyhow::Result<Option<String>> {
        Ok(self.secrets.lock().unwrap().get(reference).cloned())
    }

    fn clear(&self, reference: &str) -> anyhow::Result<()> {
        self.secrets.lock().unwrap().remove(reference);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    user: UserId,
    drive: Arc<FakeDrive>,
    store: Arc<MemStore>,
    tokens: Arc<TokenManagerUseCase>,
    set_folder: Arc<SetFolderUseCase>,
    start: Arc<StartSyncUseCase>,
    index: Arc<IndexFolderUseCase>,
    run: Arc<RunSyncUseCase>,
    pull: Arc<PullChangesUseCase>,
    orchestrate: Arc<OrchestrateSyncUseCase>,
    diagnostics: Arc<DiagnosticsUseCase>,
}

impl Harness {
    fn new(budget_folders: u32) -> Self {
        Self::with_delay(budget_folders, 0)
    }

    fn with_delay(budget_folders: u32, run_delay_ms: u64) -> Self {
        let drive = Arc::new(FakeDrive::default());
        let store = Arc::new(MemStore::default());
        let vault = Arc::new(MemVault::default());

        let provider: Arc<dyn IDriveProvider> = drive.clone();
        let state_store: Arc<dyn IStateStore> = store.clone();
        let tokens = Arc::new(TokenManagerUseCase::new(
            provider.clone(),
            state_store.clone(),
            vault,
            vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
        ));
        let set_folder = Arc::new(SetFolderUseCase::new(state_store.clone()));
        let start = Arc::new(StartSyncUseCase::new(state_store.clone()));
        let index = Arc::new(IndexFolderUseCase::new(
            provider.clone(),
            state_store.clone(),
            tokens.clone(),
        ));
        let run = Arc::new(RunSyncUseCase::new(
            provider.clone(),
            state_store.clone(),
            tokens.clone(),
        ));
        let pull = Arc::new(PullChangesUseCase::new(
            provider.clone(),
            state_store.clone(),
            tokens.clone(),
        ));
        let orchestrate = Arc::new(OrchestrateSyncUseCase::new(
            start.clone(),
            index.clone(),
            run.clone(),
            pull.clone(),
            state_store.clone(),
            OrchestratorPolicy {
                budget_folders,
                max_iterations: 50,
                run_delay: Duration::from_millis(run_delay_ms),
            },
        ));
        let diagnostics = Arc::new(DiagnosticsUseCase::new(
            state_store,
            tokens.clone(),
            pull.clone(),
        ));

        Self {
            user: UserId::new(),
            drive,
            store,
            tokens,
            set_folder,
            start,
            index,
            run,
            pull,
            orchestrate,
            diagnostics,
        }
    }

    async fn connect(&self) {
        self.tokens
            .complete_authorization(self.user, "auth-code")
            .await
            .expect("authorization");
    }

    async fn configure_root(&self, folder_id: &str, path: &str) {
        self.set_folder
            .execute(
                self.user,
                FolderId::new(folder_id.to_string()).unwrap(),
                "Photos",
                path,
            )
            .await
            .expect("set folder");
    }

    /// Canonical tree: root holds 2 files plus folders A, B, C holding
    /// 2, 1 and 2 files — 7 files total
    fn seed_canonical_tree(&self) {
        self.drive.set_children(
            "root01",
            vec![
                remote_file("f1", "one.jpg", "root01"),
                remote_file("f2", "two.jpg", "root01"),
                remote_folder("fa", "A", "root01"),
                remote_folder("fb", "B", "root01"),
                remote_folder("fc", "C", "root01"),
            ],
        );
        self.drive.set_children(
            "fa",
            vec![
                remote_file("f3", "three.jpg", "fa"),
                remote_file("f4", "four.jpg", "fa"),
            ],
        );
        self.drive
            .set_children("fb", vec![remote_file("f5", "five.jpg", "fb")]);
        self.drive.set_children(
            "fc",
            vec![
                remote_file("f6", "six.jpg", "fc"),
                remote_file("f7", "seven.jpg", "fc"),
            ],
        );
    }

    async fn state(&self) -> SyncState {
        self.store
            .get_sync_state(&self.user)
            .await
            .unwrap()
            .expect("sync state")
    }

    async fn item_count(&self) -> u64 {
        self.store.count_items(&self.user).await.unwrap()
    }
}

// ============================================================================
// Crawl properties
// ============================================================================

#[tokio::test]
async fn full_crawl_discovers_every_file_exactly_once() {
    let h = Harness::new(2);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    let report = h.orchestrate.execute(&h.user).await.expect("sync");

    assert!(report.completed);
    assert_eq!(h.item_count().await, 7);
    assert_eq!(report.files_discovered, 7);
    // root listed by the indexer, A/B/C by the runner
    assert_eq!(report.folders_processed, 4);
    // Nothing changed remotely between cursor capture and the pull
    assert_eq!(report.changes_pulled, 0);

    let state = h.state().await;
    assert_eq!(state.status(), SyncStatus::Idle);
    assert!(state.is_drained());
    assert!(state.start_page_token().is_some());
    assert!(state.last_full_scan_at().is_some());
    // The orchestration ends with a pull, so the mirror is marked fresh
    assert!(state.last_changes_at().is_some());
}

#[tokio::test]
async fn second_orchestration_is_idempotent() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    h.orchestrate.execute(&h.user).await.expect("first sync");
    let cursor_after_first = h.state().await.start_page_token().cloned();

    let second = h.orchestrate.execute(&h.user).await.expect("second sync");

    // With nothing changed remotely, the second sync does no run work:
    // no re-arm, no re-crawl, just a single no-op pull
    assert!(second.completed);
    assert_eq!(second.iterations, 1);
    assert_eq!(second.folders_processed, 0);
    assert_eq!(second.files_discovered, 0);
    assert_eq!(second.changes_pulled, 0);
    assert_eq!(h.item_count().await, 7);
    assert_eq!(h.state().await.start_page_token().cloned(), cursor_after_first);
}

#[tokio::test]
async fn catalog_is_independent_of_batch_size() {
    for budget in [1, 2, 100] {
        let h = Harness::new(budget);
        h.connect().await;
        h.configure_root("root01", "/My Drive/Photos").await;
        h.seed_canonical_tree();

        let report = h.orchestrate.execute(&h.user).await.expect("sync");
        assert!(report.completed, "budget {budget} did not complete");
        assert_eq!(h.item_count().await, 7, "budget {budget} wrong count");
    }
}

#[tokio::test]
async fn start_with_aligned_state_is_noop() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");
    let state_after_sync = h.state().await;

    // Repeating start with unchanged settings must not touch anything:
    // no queue reset, no cursor reset
    h.start.execute(&h.user, false).await.expect("first start");
    h.start.execute(&h.user, false).await.expect("second start");

    let state = h.state().await;
    assert_eq!(state.status(), SyncStatus::Idle);
    assert!(state.is_drained());
    assert!(state.start_page_token().is_some());
    assert_eq!(state, state_after_sync);
}

#[tokio::test]
async fn forced_start_resets_queue_and_cursor() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    h.start.execute(&h.user, true).await.expect("forced re-arm");

    let state = h.state().await;
    assert_eq!(state.status(), SyncStatus::Indexing);
    assert_eq!(state.queued(), 1);
    assert_eq!(state.peek_front().unwrap().folder_id.as_str(), "root01");
    assert!(state.start_page_token().is_none());
}

#[tokio::test]
async fn unforced_start_rearms_after_folder_change() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    h.configure_root("root02", "/My Drive/Else").await;
    h.start.execute(&h.user, false).await.expect("re-arm");

    let state = h.state().await;
    assert_eq!(state.status(), SyncStatus::Indexing);
    assert_eq!(state.peek_front().unwrap().folder_id.as_str(), "root02");
    assert!(state.start_page_token().is_none());
}

#[tokio::test]
async fn run_on_completed_state_reports_done() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");
    let cursor = h.state().await.start_page_token().cloned();

    let outcome = h.run.execute(&h.user, 5).await.expect("run on idle state");

    assert!(outcome.drained);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(outcome.processed_folders, 0);

    // The cursor captured by the crawl is left alone
    let state = h.state().await;
    assert_eq!(state.status(), SyncStatus::Idle);
    assert_eq!(state.start_page_token().cloned(), cursor);
}

#[tokio::test]
async fn orchestration_pull_applies_changes_landed_since_last_sync() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("first sync");

    h.drive.push_change(ChangeRecord {
        item_id: "f1".to_string(),
        removed: false,
        item: Some(remote_file("f1", "renamed.jpg", "root01")),
    });

    let report = h.orchestrate.execute(&h.user).await.expect("second sync");
    assert_eq!(report.folders_processed, 0);
    assert_eq!(report.changes_pulled, 1);

    let renamed = h
        .store
        .get_item(&h.user, &ItemKey::new("f1".to_string()).unwrap())
        .await
        .unwrap()
        .expect("row f1");
    assert_eq!(renamed.name(), "renamed.jpg");
    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 0);
}

#[tokio::test]
async fn run_without_arming_fails() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;

    let err = h.run.execute(&h.user, 5).await.unwrap_err();
    assert!(matches!(err, SyncError::NotArmed));
}

#[tokio::test]
async fn start_without_folder_fails() {
    let h = Harness::new(5);
    h.connect().await;

    let err = h.start.execute(&h.user, false).await.unwrap_err();
    assert!(matches!(err, SyncError::NoFolderConfigured));
}

// ============================================================================
// Fencing
// ============================================================================

#[tokio::test]
async fn fencing_rejects_run_after_folder_change_without_mutation() {
    let h = Harness::new(1);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    // Index, then one batch so some items exist
    h.start.execute(&h.user, false).await.unwrap();
    h.index.execute(&h.user).await.unwrap();
    h.run.execute(&h.user, 1).await.unwrap();
    let before = h.item_count().await;
    let state_before = h.state().await;

    // The user switches the mirror root mid-crawl
    h.configure_root("other-root", "/My Drive/Other").await;
    h.drive.set_children("other-root", vec![]);

    let err = h.run.execute(&h.user, 5).await.unwrap_err();
    assert!(matches!(err, SyncError::RootMismatch { .. }));
    assert_eq!(err.http_code(), 409);

    // Nothing was mutated on the mismatch path
    assert_eq!(h.item_count().await, before);
    assert_eq!(h.state().await, state_before);
}

#[tokio::test]
async fn orchestrator_rearms_after_folder_change_race() {
    let h = Arc::new(Harness::with_delay(1, 50));
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.drive
        .set_children("root02", vec![remote_file("g1", "solo.jpg", "root02")]);

    // Switch the mirror root while the crawl is underway: the budget of
    // one folder per batch leaves the queue non-empty across iterations
    let sync = {
        let h = h.clone();
        tokio::spawn(async move { h.orchestrate.execute(&h.user).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.configure_root("root02", "/My Drive/Else").await;

    let report = sync.await.expect("join").expect("sync");
    assert!(report.completed);
    assert!(report.rearms >= 1);

    let state = h.state().await;
    assert_eq!(state.root_folder_id().as_str(), "root02");
    assert!(state.is_drained());
}

// ============================================================================
// Changes pipeline
// ============================================================================

#[tokio::test]
async fn peek_counts_without_consuming() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");
    let cursor_before = h.state().await.start_page_token().cloned();

    h.drive.push_change(ChangeRecord {
        item_id: "f1".to_string(),
        removed: false,
        item: Some(remote_file("f1", "renamed.jpg", "root01")),
    });
    h.drive.push_change(ChangeRecord {
        item_id: "f2".to_string(),
        removed: true,
        item: None,
    });

    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 2);
    // Peeking twice returns the same count and leaves the cursor alone
    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 2);
    assert_eq!(h.state().await.start_page_token().cloned(), cursor_before);

    // The pull after a peek still sees both records
    let report = h.pull.pull(&h.user).await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.trashed, 1);
    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 0);
}

#[tokio::test]
async fn pull_applies_rename_and_trash() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    h.drive.push_change(ChangeRecord {
        item_id: "f1".to_string(),
        removed: false,
        item: Some(remote_file("f1", "renamed.jpg", "root01")),
    });
    h.drive.push_change(ChangeRecord {
        item_id: "f5".to_string(),
        removed: true,
        item: None,
    });

    h.pull.pull(&h.user).await.unwrap();

    let renamed = h
        .store
        .get_item(&h.user, &ItemKey::new("f1".to_string()).unwrap())
        .await
        .unwrap()
        .expect("row f1");
    assert_eq!(renamed.name(), "renamed.jpg");

    // Removal is a soft delete into the virtual trash
    let trashed = h
        .store
        .get_item(&h.user, &ItemKey::new("f5".to_string()).unwrap())
        .await
        .unwrap()
        .expect("row f5");
    assert!(trashed.is_trashed());
    assert_eq!(h.item_count().await, 6);
    assert_eq!(h.store.count_trashed_items(&h.user).await.unwrap(), 1);
}

#[tokio::test]
async fn pull_ignores_out_of_scope_and_unknown_records() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    // A file elsewhere in the account and a removal for an unknown id
    h.drive.push_change(ChangeRecord {
        item_id: "x1".to_string(),
        removed: false,
        item: Some(remote_file("x1", "elsewhere.jpg", "unrelated-folder")),
    });
    h.drive.push_change(ChangeRecord {
        item_id: "ghost".to_string(),
        removed: true,
        item: None,
    });

    let report = h.pull.pull(&h.user).await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.item_count().await, 7);
}

#[tokio::test]
async fn pull_enqueues_new_in_scope_folder_for_later_crawl() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    h.drive.push_change(ChangeRecord {
        item_id: "fd".to_string(),
        removed: false,
        item: Some(remote_folder("fd", "D", "root01")),
    });
    h.drive
        .set_children("fd", vec![remote_file("f8", "eight.jpg", "fd")]);

    let report = h.pull.pull(&h.user).await.unwrap();
    assert_eq!(report.enqueued_folders, 1);
    assert_eq!(h.state().await.queued(), 1);

    // The runner drains the enqueued folder on the next batch
    h.run.execute(&h.user, 5).await.unwrap();
    assert_eq!(h.item_count().await, 8);
}

#[tokio::test]
async fn pull_before_cursor_init_fails() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.start.execute(&h.user, false).await.unwrap();

    let err = h.pull.pull(&h.user).await.unwrap_err();
    assert!(matches!(err, SyncError::CursorMissing));
    assert_eq!(err.http_code(), 412);
}

#[tokio::test]
async fn first_pull_only_sees_changes_after_cursor_capture() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    // A change recorded before the crawl drains is behind the captured
    // cursor only if it happened before cursor capture; this one happens
    // before, so it must NOT be replayed
    h.drive.push_change(ChangeRecord {
        item_id: "f1".to_string(),
        removed: false,
        item: Some(remote_file("f1", "pre-crawl.jpg", "root01")),
    });

    h.orchestrate.execute(&h.user).await.expect("sync");
    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 0);

    h.drive.push_change(ChangeRecord {
        item_id: "f1".to_string(),
        removed: false,
        item: Some(remote_file("f1", "post-crawl.jpg", "root01")),
    });
    assert_eq!(h.pull.peek(&h.user).await.unwrap(), 1);
}

// ============================================================================
// Auth and audit
// ============================================================================

#[tokio::test]
async fn expired_token_with_rejected_refresh_stops_with_401() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    // Force the stored grant past expiry and make refresh fail
    {
        let conn = h.store.get_connection(&h.user).await.unwrap().unwrap();
        let expired = Connection::from_parts(
            *conn.user_id(),
            conn.access_token_ref().to_string(),
            conn.refresh_token_ref().to_string(),
            Utc::now() - chrono::Duration::minutes(1),
            conn.scopes().to_vec(),
            conn.access_attempts(),
            conn.connected_at(),
        );
        h.store.save_connection(&expired).await.unwrap();
    }
    h.drive.reject_refresh();

    let err = h.orchestrate.execute(&h.user).await.unwrap_err();
    assert!(matches!(err, SyncError::TokenExpired));
    assert_eq!(err.http_code(), 401);
    assert!(err.needs_user_action());
}

#[tokio::test]
async fn unconnected_user_is_reported_as_auth_required() {
    let h = Harness::new(5);
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    let err = h.orchestrate.execute(&h.user).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::AuthRequired(AuthReason::NoAccessToken)
    ));

    let status = h.tokens.status(&h.user).await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.reason, Some(AuthReason::NoAccessToken));
}

#[tokio::test]
async fn status_reports_grant_missing_a_required_scope() {
    let h = Harness::new(5);
    h.connect().await;

    // Narrow the stored grant below what the engine requires
    let conn = h.store.get_connection(&h.user).await.unwrap().unwrap();
    let narrowed = Connection::from_parts(
        *conn.user_id(),
        conn.access_token_ref().to_string(),
        conn.refresh_token_ref().to_string(),
        conn.expires_at(),
        vec!["https://www.googleapis.com/auth/drive.file".to_string()],
        conn.access_attempts(),
        conn.connected_at(),
    );
    h.store.save_connection(&narrowed).await.unwrap();

    let status = h.tokens.status(&h.user).await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.reason, Some(AuthReason::ScopeMissing));
}

#[tokio::test]
async fn credential_accesses_are_audited() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();
    h.orchestrate.execute(&h.user).await.expect("sync");

    let actions = h.store.audit_actions();
    assert!(actions.contains(&AuditAction::AuthConnect));
    assert!(actions.contains(&AuditAction::SyncArmed));
    assert!(actions.contains(&AuditAction::IndexComplete));
    assert!(actions.contains(&AuditAction::RunBatch));
    let accesses = actions
        .iter()
        .filter(|a| **a == AuditAction::CredentialAccess)
        .count();
    assert!(accesses >= 2, "every token hand-out must be audited");

    let conn = h.store.get_connection(&h.user).await.unwrap().unwrap();
    assert_eq!(conn.access_attempts() as usize, accesses);
}

// ============================================================================
// Diagnostics
// ============================================================================

#[tokio::test]
async fn diagnostics_snapshot_reflects_engine_state() {
    let h = Harness::new(5);
    h.connect().await;
    h.configure_root("root01", "/My Drive/Photos").await;
    h.seed_canonical_tree();

    let before = h.diagnostics.snapshot(&h.user).await.unwrap();
    assert!(before.connection.connected);
    assert!(before.sync_status.is_none());
    assert_eq!(before.item_count, 0);
    assert!(before.pending_changes.is_none());

    h.orchestrate.execute(&h.user).await.expect("sync");

    let after = h.diagnostics.snapshot(&h.user).await.unwrap();
    assert_eq!(after.sync_status, Some(SyncStatus::Idle));
    assert_eq!(after.root_folder_id.as_ref().unwrap().as_str(), "root01");
    assert_eq!(after.queued_folders, 0);
    assert!(after.cursor_initialized);
    assert_eq!(after.item_count, 7);
    assert_eq!(after.trashed_count, 0);
    assert_eq!(after.pending_changes, Some(0));
}
