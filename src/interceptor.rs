//! Authorization interceptors that inject and repair credentials around each request.
//!
//! An interceptor is a hook pair. [`AuthorizationInterceptor::before_request`] attaches the
//! site's current `Authorization` header, and [`AuthorizationInterceptor::after_response`]
//! inspects the outcome and may ask the client to replay the request once. The request-scoped
//! retry marker is an explicit [`Attempt`] value threaded through both hooks, so the client
//! never mutates a shared request to remember that it already retried.
//!
//! Two variants exist, selected per site at client construction time through
//! [`SiteInterceptor::for_site`]:
//!
//! - [`BasicInterceptor`] derives a static `Basic` header once and never retries.
//! - [`OAuthInterceptor`] caches a bearer token, coordinates a single in-flight refresh when
//!   concurrent requests hit `401 Unauthorized`, and replays each of them with the new token.

pub mod basic;
mod metrics;
pub mod oauth;

pub use basic::BasicInterceptor;
pub use metrics::RefreshMetrics;
pub use oauth::{InterceptorState, OAuthInterceptor};

// self
use crate::{
	_prelude::*,
	auth::{AuthScheme, Site},
	client::AuthorizedClient,
	http::{ApiRequest, ApiResponse, RequestTransport},
	store::CredentialStore,
};

/// Boxed future returned by interceptor hooks.
pub type InterceptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Request-scoped marker carried through one send of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attempt {
	/// `true` once the request has been replayed after a credential repair.
	pub is_retry: bool,
	/// Token generation the interceptor attached before the request went out.
	pub token_generation: u64,
}
impl Attempt {
	/// First attempt of a request.
	pub const fn initial() -> Self {
		Self { is_retry: false, token_generation: 0 }
	}

	/// Replay of a request whose first attempt was rejected.
	pub const fn replay() -> Self {
		Self { is_retry: true, token_generation: 0 }
	}
}

/// Decision returned by [`AuthorizationInterceptor::after_response`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
	/// Hand the response to the caller unchanged.
	Deliver,
	/// Credentials were repaired; send the original request again.
	Replay,
}

/// Capability shared by every credential scheme.
pub trait AuthorizationInterceptor
where
	Self: Send + Sync,
{
	/// Attaches the current credentials to `request` and records what was attached in
	/// `attempt`.
	fn before_request<'a>(
		&'a self,
		request: &'a mut ApiRequest,
		attempt: &'a mut Attempt,
	) -> InterceptFuture<'a, ()>;

	/// Inspects a response and decides whether the request should be replayed.
	///
	/// Errors returned here replace the response as the outcome of the send.
	fn after_response<'a>(
		&'a self,
		response: &'a ApiResponse,
		attempt: &'a Attempt,
	) -> InterceptFuture<'a, Recovery> {
		let _ = (response, attempt);

		Box::pin(async { Ok(Recovery::Deliver) })
	}

	/// Wraps `transport` so every request sent through the returned client runs these hooks.
	fn attach<T>(self, transport: Arc<T>) -> AuthorizedClient<T>
	where
		Self: 'static + Sized,
		T: RequestTransport,
	{
		AuthorizedClient::new(transport, self)
	}
}
impl<I> AuthorizationInterceptor for Arc<I>
where
	I: ?Sized + AuthorizationInterceptor,
{
	fn before_request<'a>(
		&'a self,
		request: &'a mut ApiRequest,
		attempt: &'a mut Attempt,
	) -> InterceptFuture<'a, ()> {
		(**self).before_request(request, attempt)
	}

	fn after_response<'a>(
		&'a self,
		response: &'a ApiResponse,
		attempt: &'a Attempt,
	) -> InterceptFuture<'a, Recovery> {
		(**self).after_response(response, attempt)
	}
}

/// Interceptor variant chosen from a site's [`AuthScheme`].
#[derive(Debug)]
pub enum SiteInterceptor {
	/// Static Basic credentials.
	Basic(BasicInterceptor),
	/// Refreshable OAuth bearer tokens.
	OAuth(OAuthInterceptor),
}
impl SiteInterceptor {
	/// Builds the interceptor matching `site.auth_scheme`.
	pub fn for_site(site: Site, store: Arc<dyn CredentialStore>) -> Self {
		match site.auth_scheme {
			AuthScheme::Basic => Self::Basic(BasicInterceptor::new(site, store)),
			AuthScheme::OAuth => Self::OAuth(OAuthInterceptor::new(site, store)),
		}
	}

	/// Returns the site the interceptor authorizes.
	pub fn site(&self) -> &Site {
		match self {
			Self::Basic(inner) => inner.site(),
			Self::OAuth(inner) => inner.site(),
		}
	}
}
impl AuthorizationInterceptor for SiteInterceptor {
	fn before_request<'a>(
		&'a self,
		request: &'a mut ApiRequest,
		attempt: &'a mut Attempt,
	) -> InterceptFuture<'a, ()> {
		match self {
			Self::Basic(inner) => inner.before_request(request, attempt),
			Self::OAuth(inner) => inner.before_request(request, attempt),
		}
	}

	fn after_response<'a>(
		&'a self,
		response: &'a ApiResponse,
		attempt: &'a Attempt,
	) -> InterceptFuture<'a, Recovery> {
		match self {
			Self::Basic(inner) => inner.after_response(response, attempt),
			Self::OAuth(inner) => inner.after_response(response, attempt),
		}
	}
}
impl From<BasicInterceptor> for SiteInterceptor {
	fn from(value: BasicInterceptor) -> Self {
		Self::Basic(value)
	}
}
impl From<OAuthInterceptor> for SiteInterceptor {
	fn from(value: OAuthInterceptor) -> Self {
		Self::OAuth(value)
	}
}
