//! Token payload published by the dancer service once the user approves access.

// self
use crate::{
	_prelude::*,
	auth::{OAuthInfo, TokenSecret, UserInfo},
};

/// Tokens and account details returned by the poll endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
	/// Bearer access token.
	pub access: TokenSecret,
	/// Refresh token, when the provider issued one.
	#[serde(default)]
	pub refresh: Option<TokenSecret>,
	/// Access-token expiry.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expiration_date: Option<OffsetDateTime>,
	/// Account the tokens belong to.
	#[serde(default)]
	pub user: Option<UserInfo>,
	/// Cloud sites the token grants access to.
	#[serde(default)]
	pub accessible_resources: Vec<AccessibleResource>,
}
impl TokenPayload {
	/// Converts the payload into storable OAuth credentials.
	pub fn into_auth_info(self) -> OAuthInfo {
		OAuthInfo {
			access: self.access,
			refresh: self.refresh,
			expires_at: self.expiration_date,
			user: self.user,
		}
	}
}

/// Cloud site reachable with an authorized token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleResource {
	/// Cloud id of the site.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Scopes granted on the site.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Avatar image URL.
	#[serde(default)]
	pub avatar_url: Option<String>,
	/// Site base URL.
	#[serde(default)]
	pub url: Option<String>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn camel_case_payload_decodes() {
		let payload: TokenPayload = serde_json::from_value(serde_json::json!({
			"access": "a-1",
			"refresh": "r-1",
			"expirationDate": "2026-01-02T03:04:05Z",
			"user": { "id": "u1", "displayName": "Ada" },
			"accessibleResources": [
				{
					"id": "c1",
					"name": "acme",
					"scopes": ["read:jira-work"],
					"url": "https://acme.atlassian.net"
				}
			]
		}))
		.expect("Payload fixture should decode.");

		assert_eq!(payload.accessible_resources.len(), 1);
		assert_eq!(payload.accessible_resources[0].scopes, ["read:jira-work"]);

		let info = payload.into_auth_info();

		assert_eq!(info.access.expose(), "a-1");
		assert_eq!(info.refresh.as_ref().map(TokenSecret::expose), Some("r-1"));
		assert_eq!(info.expires_at, Some(macros::datetime!(2026-01-02 03:04:05 UTC)));
		assert_eq!(info.user.map(|user| user.display_name).as_deref(), Some("Ada"));
	}

	#[test]
	fn optional_fields_default() {
		let payload: TokenPayload =
			serde_json::from_str(r#"{"access":"only"}"#).expect("Minimal payload should decode.");

		assert!(payload.refresh.is_none());
		assert!(payload.expiration_date.is_none());
		assert!(payload.accessible_resources.is_empty());
	}
}
