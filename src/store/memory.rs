//! Thread-safe in-memory [`SecretStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, CredentialId},
	store::{SecretStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<CredentialId, AuthInfo>>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of stored credentials.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl SecretStore for MemoryStore {
	fn get<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(id).cloned()) })
	}

	fn set(&self, id: CredentialId, info: AuthInfo) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(id, info);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(id)) })
	}
}
