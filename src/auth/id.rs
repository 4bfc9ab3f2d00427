//! Strongly typed identifiers for sites and their stored credentials.

// std
use std::{borrow::Borrow, hash::Hasher, marker::PhantomData, ops::Deref};
// crates.io
use serde::{Deserializer, Serializer, de::Error as _};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Tag naming what an [`Id`] identifies.
pub trait IdKind
where
	Self: 'static + Send + Sync,
{
	/// Label used in errors and `Debug` output.
	const LABEL: &'static str;
}

/// Tag for [`SiteId`].
#[derive(Debug)]
pub enum SiteKind {}
impl IdKind for SiteKind {
	const LABEL: &'static str = "Site";
}

/// Tag for [`CredentialId`].
#[derive(Debug)]
pub enum CredentialKind {}
impl IdKind for CredentialKind {
	const LABEL: &'static str = "Credential";
}

/// Unique identifier for a configured Jira or Bitbucket site.
pub type SiteId = Id<SiteKind>;
/// Key under which a site's credentials are persisted.
pub type CredentialId = Id<CredentialKind>;

/// Non-empty identifier without whitespace, tagged with its kind.
pub struct Id<K>
where
	K: IdKind,
{
	value: String,
	_kind: PhantomData<fn() -> K>,
}
impl<K> Id<K>
where
	K: IdKind,
{
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Self::try_from(value.as_ref().to_owned())
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.value
	}
}
impl<K> Clone for Id<K>
where
	K: IdKind,
{
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), _kind: PhantomData }
	}
}
impl<K> PartialEq for Id<K>
where
	K: IdKind,
{
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl<K> Eq for Id<K> where K: IdKind {}
impl<K> PartialOrd for Id<K>
where
	K: IdKind,
{
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}
impl<K> Ord for Id<K>
where
	K: IdKind,
{
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.value.cmp(&other.value)
	}
}
impl<K> Hash for Id<K>
where
	K: IdKind,
{
	// Must hash like `str` so `Borrow<str>` lookups work.
	fn hash<H>(&self, state: &mut H)
	where
		H: Hasher,
	{
		self.value.as_str().hash(state);
	}
}
impl<K> Deref for Id<K>
where
	K: IdKind,
{
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}
impl<K> AsRef<str> for Id<K>
where
	K: IdKind,
{
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl<K> Borrow<str> for Id<K>
where
	K: IdKind,
{
	fn borrow(&self) -> &str {
		&self.value
	}
}
impl<K> TryFrom<String> for Id<K>
where
	K: IdKind,
{
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		let kind = K::LABEL;

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if value.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind });
		}
		if value.len() > IDENTIFIER_MAX_LEN {
			return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
		}

		Ok(Self { value, _kind: PhantomData })
	}
}
impl<K> From<Id<K>> for String
where
	K: IdKind,
{
	fn from(id: Id<K>) -> Self {
		id.value
	}
}
impl<K> FromStr for Id<K>
where
	K: IdKind,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<K> Debug for Id<K>
where
	K: IdKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", K::LABEL, self.value)
	}
}
impl<K> Display for Id<K>
where
	K: IdKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}
impl<K> Serialize for Id<K>
where
	K: IdKind,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.value)
	}
}
impl<'de, K> Deserialize<'de> for Id<K>
where
	K: IdKind,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Self::try_from(String::deserialize(deserializer)?).map_err(D::Error::custom)
	}
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier.
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}
