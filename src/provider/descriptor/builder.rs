// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	provider::{ClientAuthMethod, OAuthProvider, ProviderDescriptor},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for refreshes.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// The OAuth client id is mandatory.
	#[error("Missing client id.")]
	MissingClientId,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Provider the descriptor configures.
	pub provider: OAuthProvider,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for refreshes.
	pub token_endpoint: Option<Url>,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<TokenSecret>,
	/// Client authentication method for the token endpoint.
	pub client_auth: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Creates a builder seeded with the provider's default endpoints.
	pub fn new(provider: OAuthProvider) -> Self {
		let (authorization, token, client_auth) = default_endpoints(provider);

		Self {
			provider,
			authorization_endpoint: Url::parse(authorization).ok(),
			token_endpoint: Url::parse(token).ok(),
			client_id: None,
			client_secret: None,
			client_auth,
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the OAuth client id.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization_endpoint = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token_endpoint =
			self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(ProviderDescriptorError::MissingClientId)?;
		let descriptor = ProviderDescriptor {
			provider: self.provider,
			authorization_endpoint,
			token_endpoint,
			client_id,
			client_secret: self.client_secret,
			client_auth: self.client_auth,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.authorization_endpoint)?;
		validate_endpoint("token", &self.token_endpoint)?;

		Ok(())
	}
}

fn default_endpoints(provider: OAuthProvider) -> (&'static str, &'static str, ClientAuthMethod) {
	match provider {
		OAuthProvider::JiraCloud => (
			"https://auth.atlassian.com/authorize",
			"https://auth.atlassian.com/oauth/token",
			ClientAuthMethod::ClientSecretPost,
		),
		OAuthProvider::JiraCloudStaging => (
			"https://auth.stg.atlassian.com/authorize",
			"https://auth.stg.atlassian.com/oauth/token",
			ClientAuthMethod::ClientSecretPost,
		),
		OAuthProvider::BitbucketCloud => (
			"https://bitbucket.org/site/oauth2/authorize",
			"https://bitbucket.org/site/oauth2/access_token",
			ClientAuthMethod::ClientSecretBasic,
		),
		OAuthProvider::BitbucketCloudStaging => (
			"https://staging.bb-inf.net/site/oauth2/authorize",
			"https://staging.bb-inf.net/site/oauth2/access_token",
			ClientAuthMethod::ClientSecretBasic,
		),
	}
}

// Loopback hosts may use plain HTTP so local token servers can stand in for Atlassian.
fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	match url.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}
