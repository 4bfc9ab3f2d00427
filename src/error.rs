//! Crate-level error types shared across interceptors, stores, and the authorization dance.

// self
use crate::{_prelude::*, auth::SiteId, provider::OAuthProvider};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Interactive browser authorization did not complete.
	#[error(transparent)]
	Authorization(#[from] AuthorizationError),

	/// A replayed request was rejected again after its credentials were refreshed.
	#[error("Site `{site}` rejected the request after a credential refresh; re-authentication is required.")]
	Unauthorized {
		/// Site that rejected the request.
		site: SiteId,
	},
	/// The access token refresh backing a replay failed.
	#[error("Access token refresh failed for site `{site}`.")]
	RefreshFailed {
		/// Site whose credentials could not be refreshed.
		site: SiteId,
		/// Failure reported by the credential store, shared by every request that waited on it.
		#[source]
		source: Arc<Error>,
	},
	/// Provider rejected the grant (e.g., revoked or rotated refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The remote API answered with a non-success status unrelated to authorization.
	#[error("API request failed with status {status}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Response body, lossily decoded as UTF-8.
		body: String,
	},
}
impl Error {
	/// Returns `true` when the caller should prompt the user to log in again instead of
	/// reporting a generic failure.
	pub fn requires_reauthentication(&self) -> bool {
		match self {
			Self::Unauthorized { .. } | Self::InvalidGrant { .. } | Self::InvalidClient { .. } =>
				true,
			Self::Config(ConfigError::MissingCredentials { .. })
			| Self::Config(ConfigError::MissingRefreshToken) => true,
			Self::RefreshFailed { source, .. } => source.requires_reauthentication(),
			_ => false,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value contains characters HTTP does not allow.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// A URL could not be built from the configured base.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL or path.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor contains an invalid endpoint.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),

	/// The site is not served by any known OAuth provider.
	#[error("Site `{site}` is not served by an OAuth provider.")]
	NoOAuthProvider {
		/// Site lacking a provider.
		site: SiteId,
	},
	/// No descriptor was registered for the provider.
	#[error("No descriptor is registered for provider `{provider}`.")]
	UnknownProvider {
		/// Provider lacking a descriptor.
		provider: OAuthProvider,
	},
	/// No OAuth credentials are stored for the site.
	#[error("No OAuth credentials are stored for site `{site}`.")]
	MissingCredentials {
		/// Site lacking credentials.
		site: SiteId,
	},
	/// Stored credentials are missing a refresh secret.
	#[error("Stored credentials are missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// A response body could not be parsed as the expected JSON document.
	#[error("Response body is malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The credential store did not finish refreshing within the configured window.
	#[error("Access token refresh did not complete within {timeout:?}.")]
	RefreshTimedOut {
		/// Configured refresh timeout.
		timeout: StdDuration,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Reasons an interactive browser authorization ended without a token.
#[derive(Debug, ThisError)]
pub enum AuthorizationError {
	/// The browser timeout elapsed before the poll endpoint produced a token.
	#[error("Authorization for `{provider}` timed out after {timeout:?}.")]
	TimedOut {
		/// Provider being authorized.
		provider: OAuthProvider,
		/// Configured browser timeout.
		timeout: StdDuration,
	},
	/// A newer authorization for the same provider replaced this one.
	#[error("Authorization for `{provider}` was superseded by a newer request.")]
	Superseded {
		/// Provider being authorized.
		provider: OAuthProvider,
	},
	/// The dancer was shut down while the authorization was pending.
	#[error("Authorization for `{provider}` was cancelled.")]
	Cancelled {
		/// Provider being authorized.
		provider: OAuthProvider,
	},
	/// The external browser could not be opened.
	#[error("Failed to open the browser for `{provider}`.")]
	BrowserLaunch {
		/// Provider being authorized.
		provider: OAuthProvider,
		/// Launcher failure.
		#[source]
		source: std::io::Error,
	},
}
