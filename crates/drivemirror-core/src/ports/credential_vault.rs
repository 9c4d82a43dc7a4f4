//! Credential vault port (driven/secondary port)
//!
//! Interface for secret storage. Token values never touch the database;
//! the state store only carries opaque vault references, and this port
//! resolves them. The primary implementation wraps the OS keyring.

/// Port trait for secret storage
///
/// Methods are synchronous: keyring backends block briefly and are only
/// touched from the token manager, never from a hot path.
pub trait ICredentialVault: Send + Sync {
    /// Stores a secret under the given reference (insert or replace)
    fn store(&self, reference: &str, secret: &str) -> anyhow::Result<()>;

    /// Loads the secret stored under the given reference
    fn load(&self, reference: &str) -> anyhow::Result<Option<String>>;

    /// Deletes the secret stored under the given reference, if any
    fn clear(&self, reference: &str) -> anyhow::Result<()>;
}
