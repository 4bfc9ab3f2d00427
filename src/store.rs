//! Credential resolution contracts and built-in secret stores.
//!
//! Interceptors only ever see [`CredentialStore`]: resolve the credentials for a site and
//! refresh its access token. [`SecretStore`] is the lower persistence layer that
//! [`CredentialManager`](crate::credential::CredentialManager) builds the former on top of.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, CredentialId, Site, TokenSecret},
};

/// Boxed future returned by [`SecretStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Boxed future returned by [`CredentialStore`] operations.
pub type CredentialFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Source of truth for site credentials as seen by interceptors.
///
/// Implementations backing more than one interceptor for the same site must serialize
/// concurrent [`refresh_access_token`](CredentialStore::refresh_access_token) calls
/// themselves; each interceptor only coalesces the requests it owns.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Resolves the credentials stored for `site`, if any.
	fn auth_info<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, Option<AuthInfo>>;

	/// Exchanges the stored refresh token for a new access token and returns it.
	fn refresh_access_token<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, TokenSecret>;
}
impl<S> CredentialStore for Arc<S>
where
	S: ?Sized + CredentialStore,
{
	fn auth_info<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, Option<AuthInfo>> {
		(**self).auth_info(site)
	}

	fn refresh_access_token<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, TokenSecret> {
		(**self).refresh_access_token(site)
	}
}

/// Key-value persistence for credentials.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Fetches the credentials stored under `id`, if present.
	fn get<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>>;

	/// Persists or replaces the credentials stored under `id`.
	fn set(&self, id: CredentialId, info: AuthInfo) -> StoreFuture<'_, ()>;

	/// Removes and returns the credentials stored under `id`.
	fn remove<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>>;
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
