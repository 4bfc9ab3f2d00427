// self
use crate::_prelude::*;

/// Password or token whose formatters never print the value.
///
/// Serialization writes the plain string so stores can persist it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenSecret(Box<str>);
impl TokenSecret {
	/// Wraps `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into().into_boxed_str())
	}

	/// Plain value, for building headers and grant requests only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<TokenSecret> for String {
	fn from(secret: TokenSecret) -> Self {
		secret.0.into_string()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<{} bytes>)", self.0.len())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
