//! Atlassian OAuth providers and the descriptors that configure their token endpoints.
//!
//! [`OAuthProvider`] names the authorization servers a cloud site can be served by; its
//! stable id is the path segment the browser dance opens. [`ProviderDescriptor`] carries the
//! validated endpoint and client settings the credential manager needs for refresh grants.

pub mod descriptor;

pub use descriptor::*;

// self
use crate::{
	_prelude::*,
	auth::{Product, Site},
};

const JIRA_STAGING_DOMAIN: &str = "jira-dev.com";
const BITBUCKET_STAGING_DOMAIN: &str = "bb-inf.net";

/// Authorization server a cloud site authenticates against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthProvider {
	/// Production Jira Cloud.
	#[serde(rename = "jiracloud")]
	JiraCloud,
	/// Staging Jira Cloud.
	#[serde(rename = "jiracloudstaging")]
	JiraCloudStaging,
	/// Production Bitbucket Cloud.
	#[serde(rename = "bbcloud")]
	BitbucketCloud,
	/// Staging Bitbucket Cloud.
	#[serde(rename = "bbcloudstaging")]
	BitbucketCloudStaging,
}
impl OAuthProvider {
	/// Every known provider.
	pub const ALL: [Self; 4] =
		[Self::JiraCloud, Self::JiraCloudStaging, Self::BitbucketCloud, Self::BitbucketCloudStaging];

	/// Returns the stable id used in dance URLs and persisted settings.
	pub const fn as_str(self) -> &'static str {
		match self {
			OAuthProvider::JiraCloud => "jiracloud",
			OAuthProvider::JiraCloudStaging => "jiracloudstaging",
			OAuthProvider::BitbucketCloud => "bbcloud",
			OAuthProvider::BitbucketCloudStaging => "bbcloudstaging",
		}
	}

	/// Returns the product the provider issues tokens for.
	pub const fn product(self) -> Product {
		match self {
			OAuthProvider::JiraCloud | OAuthProvider::JiraCloudStaging => Product::Jira,
			OAuthProvider::BitbucketCloud | OAuthProvider::BitbucketCloudStaging =>
				Product::Bitbucket,
		}
	}

	/// Returns `true` for staging authorization servers.
	pub const fn is_staging(self) -> bool {
		matches!(self, OAuthProvider::JiraCloudStaging | OAuthProvider::BitbucketCloudStaging)
	}

	/// Resolves the provider serving `site`.
	///
	/// Server and data-center sites authenticate with static credentials and have no provider.
	pub fn for_site(site: &Site) -> Option<Self> {
		if !site.is_cloud {
			return None;
		}

		let host = site.host().unwrap_or_default();

		match site.product {
			Product::Jira if is_within(host, JIRA_STAGING_DOMAIN) => Some(Self::JiraCloudStaging),
			Product::Jira => Some(Self::JiraCloud),
			Product::Bitbucket if is_within(host, BITBUCKET_STAGING_DOMAIN) =>
				Some(Self::BitbucketCloudStaging),
			Product::Bitbucket => Some(Self::BitbucketCloud),
		}
	}
}
impl Display for OAuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for OAuthProvider {
	type Err = UnknownProviderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|provider| provider.as_str() == s)
			.ok_or_else(|| UnknownProviderError { id: s.to_owned() })
	}
}

/// Error returned when parsing an unrecognized provider id.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown OAuth provider `{id}`.")]
pub struct UnknownProviderError {
	/// The rejected id.
	pub id: String,
}

fn is_within(host: &str, domain: &str) -> bool {
	host == domain || host.strip_suffix(domain).is_some_and(|rest| rest.ends_with('.'))
}
