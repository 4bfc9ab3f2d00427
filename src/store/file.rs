//! JSON-file-backed [`SecretStore`] for single-user installs.
//!
//! The file holds a versioned document:
//!
//! ```json
//! { "version": 1, "credentials": { "acme-login": { "kind": "oauth", "access": "..." } } }
//! ```
//!
//! Every mutation rewrites the whole document through a sibling `.tmp` file that is renamed
//! over the original once synced. The in-memory view only changes after that write succeeds.

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::{self, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, CredentialId},
	store::{SecretStore, StoreError, StoreFuture},
};

const SNAPSHOT_VERSION: u32 = 1;

type Credentials = BTreeMap<CredentialId, AuthInfo>;

#[derive(Deserialize)]
struct Snapshot {
	version: u32,
	#[serde(default)]
	credentials: Credentials,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	version: u32,
	credentials: &'a Credentials,
}

/// Persists credentials to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	credentials: Arc<RwLock<Credentials>>,
}
impl FileStore {
	/// Opens the store at `path`, loading whatever the file already holds.
	///
	/// A missing or empty file yields an empty store; parent directories are created on demand.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		create_parent(&path)?;

		let credentials = read_snapshot(&path)?;

		Ok(Self { path, credentials: Arc::new(RwLock::new(credentials)) })
	}

	/// Returns the snapshot location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn write_snapshot(&self, credentials: &Credentials) -> Result<(), StoreError> {
		let document = SnapshotRef { version: SNAPSHOT_VERSION, credentials };
		let bytes = serde_json::to_vec_pretty(&document).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode {}: {e}", self.path.display()),
		})?;
		let staging = staging_path(&self.path);

		create_parent(&self.path)?;

		let mut file = File::create(&staging).map_err(backend("create", &staging))?;

		file.write_all(&bytes).map_err(backend("write", &staging))?;
		file.sync_all().map_err(backend("sync", &staging))?;
		drop(file);

		fs::rename(&staging, &self.path).map_err(backend("replace", &self.path))
	}
}
impl SecretStore for FileStore {
	fn get<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>> {
		Box::pin(async move { Ok(self.credentials.read().get(id).cloned()) })
	}

	fn set(&self, id: CredentialId, info: AuthInfo) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut credentials = self.credentials.write();
			let mut next = credentials.clone();

			next.insert(id, info);
			self.write_snapshot(&next)?;
			*credentials = next;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, id: &'a CredentialId) -> StoreFuture<'a, Option<AuthInfo>> {
		Box::pin(async move {
			let mut credentials = self.credentials.write();

			if !credentials.contains_key(id) {
				return Ok(None);
			}

			let mut next = credentials.clone();
			let removed = next.remove(id);

			self.write_snapshot(&next)?;
			*credentials = next;

			Ok(removed)
		})
	}
}

fn read_snapshot(path: &Path) -> Result<Credentials, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Credentials::new()),
		Err(e) => return Err(backend("read", path)(e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Credentials::new());
	}

	let snapshot = serde_json::from_slice::<Snapshot>(&bytes).map_err(|e| {
		StoreError::Serialization { message: format!("Failed to parse {}: {e}", path.display()) }
	})?;

	if snapshot.version != SNAPSHOT_VERSION {
		return Err(StoreError::Serialization {
			message: format!(
				"{} has snapshot version {}, expected {SNAPSHOT_VERSION}",
				path.display(),
				snapshot.version
			),
		});
	}

	Ok(snapshot.credentials)
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() =>
			fs::create_dir_all(parent).map_err(backend("create directory", parent)),
		_ => Ok(()),
	}
}

fn staging_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

	name.push(".tmp");

	path.with_file_name(name)
}

fn backend<'a>(action: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> StoreError + 'a {
	move |e| StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::auth::{BasicAuthInfo, OAuthInfo};

	fn scratch(label: &str) -> PathBuf {
		env::temp_dir().join(format!(
			"atlclient-auth-{label}-{}-{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	fn credential(id: &str) -> CredentialId {
		CredentialId::new(id).expect("Credential fixture should be valid.")
	}

	#[tokio::test]
	async fn credentials_survive_reopening() {
		let path = scratch("reopen");
		let store = FileStore::open(&path).expect("Store should open on a fresh path.");
		let oauth = AuthInfo::from(OAuthInfo::new("access-token").with_refresh("refresh-token"));

		store.set(credential("cloud"), oauth.clone()).await.expect("OAuth credentials should save.");
		store
			.set(credential("server"), BasicAuthInfo::new("admin", "hunter2").into())
			.await
			.expect("Basic credentials should save.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Store should reopen.");

		assert_eq!(
			reopened.get(&credential("cloud")).await.expect("Lookup should succeed."),
			Some(oauth)
		);

		let removed =
			reopened.remove(&credential("server")).await.expect("Removal should succeed.");

		assert!(matches!(removed, Some(AuthInfo::Basic(_))));
		assert_eq!(
			reopened.remove(&credential("server")).await.expect("Second removal should succeed."),
			None
		);

		let reopened = FileStore::open(&path).expect("Store should reopen after removal.");

		assert!(reopened.get(&credential("server")).await.expect("Lookup should succeed.").is_none());
		assert!(!staging_path(&path).exists());

		fs::remove_file(&path).expect("Scratch snapshot should be removable.");
	}

	#[test]
	fn blank_files_open_empty() {
		let path = scratch("blank");

		fs::write(&path, b"\n").expect("Scratch snapshot should be writable.");

		let store = FileStore::open(&path).expect("Blank snapshots should open.");

		assert!(store.credentials.read().is_empty());

		fs::remove_file(&path).expect("Scratch snapshot should be removable.");
	}

	#[test]
	fn corrupt_or_foreign_snapshots_are_rejected() {
		let path = scratch("corrupt");

		fs::write(&path, b"{ not json").expect("Scratch snapshot should be writable.");

		assert!(matches!(FileStore::open(&path), Err(StoreError::Serialization { .. })));

		fs::write(&path, br#"{"version":7,"credentials":{}}"#)
			.expect("Scratch snapshot should be writable.");

		let err = FileStore::open(&path).expect_err("Unknown versions should be rejected.");

		assert!(err.to_string().contains("expected 1"));

		fs::remove_file(&path).expect("Scratch snapshot should be removable.");
	}

	#[tokio::test]
	async fn failed_writes_leave_memory_matching_disk() {
		let path = scratch("blocked");
		let store = FileStore::open(&path).expect("Store should open on a fresh path.");
		let kept = AuthInfo::from(OAuthInfo::new("revoked").with_refresh("refresh"));

		store.set(credential("kept"), kept.clone()).await.expect("First write should succeed.");
		fs::create_dir(staging_path(&path)).expect("Staging path should be blockable.");

		let err = store
			.set(credential("added"), BasicAuthInfo::new("admin", "hunter2").into())
			.await
			.expect_err("Blocked staging file should fail the write.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert!(store.get(&credential("added")).await.expect("Lookup should succeed.").is_none());
		assert!(store.remove(&credential("kept")).await.is_err());
		assert_eq!(store.get(&credential("kept")).await.expect("Lookup should succeed."), Some(kept));

		fs::remove_dir(staging_path(&path)).expect("Staging directory should be removable.");

		let reopened = FileStore::open(&path).expect("Store should reopen.");

		assert_eq!(*reopened.credentials.read(), *store.credentials.read());

		fs::remove_file(&path).expect("Scratch snapshot should be removable.");
	}
}
