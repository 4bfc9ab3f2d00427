//! Validated token-endpoint configuration for an [`OAuthProvider`].

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::TokenSecret, provider::OAuthProvider};

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Immutable provider descriptor consumed by the credential manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider the descriptor configures.
	pub provider: OAuthProvider,
	/// Authorization endpoint, informational for the browser dance.
	pub authorization_endpoint: Url,
	/// Token endpoint used for refresh grants.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret for confidential clients.
	pub client_secret: Option<TokenSecret>,
	/// How the client authenticates against the token endpoint.
	pub client_auth: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a builder seeded with the provider's default Atlassian endpoints.
	pub fn builder(provider: OAuthProvider) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(provider)
	}
}
