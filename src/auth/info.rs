//! Credential shapes resolved for a site.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials stored for a site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuthInfo {
	/// Username/password pair.
	Basic(BasicAuthInfo),
	/// OAuth token set.
	OAuth(OAuthInfo),
}
impl AuthInfo {
	/// Returns the Basic credentials, if that is what the site stores.
	pub fn as_basic(&self) -> Option<&BasicAuthInfo> {
		match self {
			Self::Basic(info) => Some(info),
			Self::OAuth(_) => None,
		}
	}

	/// Returns the OAuth credentials, if that is what the site stores.
	pub fn as_oauth(&self) -> Option<&OAuthInfo> {
		match self {
			Self::OAuth(info) => Some(info),
			Self::Basic(_) => None,
		}
	}
}
impl From<BasicAuthInfo> for AuthInfo {
	fn from(value: BasicAuthInfo) -> Self {
		Self::Basic(value)
	}
}
impl From<OAuthInfo> for AuthInfo {
	fn from(value: OAuthInfo) -> Self {
		Self::OAuth(value)
	}
}

/// Static username/password credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthInfo {
	/// Account name.
	pub username: String,
	/// Account password or API token.
	pub password: TokenSecret,
}
impl BasicAuthInfo {
	/// Creates a credential pair.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: TokenSecret::new(password) }
	}

	/// Encodes `username:password` as standard base64, the value carried after `Basic `.
	pub fn header_token(&self) -> TokenSecret {
		TokenSecret::new(STANDARD.encode(format!("{}:{}", self.username, self.password.expose())))
	}
}

/// OAuth token set issued by an Atlassian authorization server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthInfo {
	/// Bearer access token.
	pub access: TokenSecret,
	/// Refresh token, if the grant issued one.
	pub refresh: Option<TokenSecret>,
	/// Expiry instant of the access token, when known.
	pub expires_at: Option<OffsetDateTime>,
	/// Account the token was issued to.
	pub user: Option<UserInfo>,
}
impl OAuthInfo {
	/// Creates a token set with no refresh token, expiry, or user.
	pub fn new(access: impl Into<String>) -> Self {
		Self { access: TokenSecret::new(access), refresh: None, expires_at: None, user: None }
	}

	/// Sets the refresh token.
	pub fn with_refresh(mut self, refresh: impl Into<String>) -> Self {
		self.refresh = Some(TokenSecret::new(refresh));

		self
	}

	/// Sets the access-token expiry.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the account the token belongs to.
	pub fn with_user(mut self, user: UserInfo) -> Self {
		self.user = Some(user);

		self
	}

	/// Returns `true` if the access token is known to be expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| instant >= expiry)
	}
}

/// Account details returned alongside a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
	/// Account identifier.
	pub id: String,
	/// Human-readable name.
	pub display_name: String,
	/// Primary e-mail, when the provider shares it.
	#[serde(default)]
	pub email: Option<String>,
	/// Avatar image URL.
	#[serde(default)]
	pub avatar_url: Option<String>,
}
