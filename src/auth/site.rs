//! Remote Jira/Bitbucket site descriptions used as credential lookup keys.

// self
use crate::{
	_prelude::*,
	auth::{CredentialId, SiteId},
};

/// Atlassian product served by a site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
	/// Jira Software / Jira Service Management.
	Jira,
	/// Bitbucket Cloud or Bitbucket Server.
	Bitbucket,
}
impl Product {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Product::Jira => "jira",
			Product::Bitbucket => "bitbucket",
		}
	}
}
impl Display for Product {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential scheme a site authenticates requests with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
	/// Static username/password (server and data-center deployments).
	Basic,
	/// OAuth 2.0 bearer tokens that expire and must be refreshed.
	#[default]
	OAuth,
}

/// Immutable description of a configured remote instance.
///
/// The site doubles as the lookup key for credentials: stores resolve secrets through
/// [`Site::credential_id`], so two sites sharing a login may point at the same entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
	/// Site identifier.
	pub id: SiteId,
	/// Product served by the site.
	pub product: Product,
	/// Base URL that REST paths are resolved against.
	pub base_api_url: Url,
	/// Base URL for links shown to users; defaults to the API URL.
	pub base_link_url: Url,
	/// Whether the site is an Atlassian cloud tenant.
	pub is_cloud: bool,
	/// Key of the stored credentials.
	pub credential_id: CredentialId,
	/// Scheme used to authorize requests.
	pub auth_scheme: AuthScheme,
}
impl Site {
	/// Creates a cloud OAuth site whose credentials are stored under `credential_id`.
	pub fn new(
		id: SiteId,
		product: Product,
		base_api_url: Url,
		credential_id: CredentialId,
	) -> Self {
		Self {
			id,
			product,
			base_link_url: base_api_url.clone(),
			base_api_url,
			is_cloud: true,
			credential_id,
			auth_scheme: AuthScheme::OAuth,
		}
	}

	/// Overrides the link base URL.
	pub fn with_base_link_url(mut self, url: Url) -> Self {
		self.base_link_url = url;

		self
	}

	/// Marks the site as a server/data-center deployment authenticated with Basic credentials.
	pub fn server(mut self) -> Self {
		self.is_cloud = false;
		self.auth_scheme = AuthScheme::Basic;

		self
	}

	/// Overrides the authorization scheme.
	pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
		self.auth_scheme = scheme;

		self
	}

	/// Returns the API host, if the base URL has one.
	pub fn host(&self) -> Option<&str> {
		self.base_api_url.host_str()
	}
}
