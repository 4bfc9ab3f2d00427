//! Authorized request pipeline and the site-scoped JSON helper built on top of it.

// crates.io
use oauth2::http::{
	HeaderName, HeaderValue,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::Site,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, RequestTransport},
	interceptor::{Attempt, AuthorizationInterceptor, Recovery, SiteInterceptor},
	obs::{self, FlowKind, FlowOutcome, flow_debug},
	store::CredentialStore,
};

const ATLASSIAN_TOKEN: HeaderName = HeaderName::from_static("x-atlassian-token");

/// Transport wrapped with an interceptor's hooks.
///
/// [`send`](Self::send) runs the before-hook, the transport, and the after-hook, replaying the
/// request at most once when the interceptor repaired its credentials.
pub struct AuthorizedClient<T>
where
	T: RequestTransport,
{
	transport: Arc<T>,
	interceptor: Arc<dyn AuthorizationInterceptor>,
}
impl<T> AuthorizedClient<T>
where
	T: RequestTransport,
{
	/// Wraps `transport` with `interceptor`.
	pub fn new(transport: Arc<T>, interceptor: impl 'static + AuthorizationInterceptor) -> Self {
		Self { transport, interceptor: Arc::new(interceptor) }
	}

	/// Returns the wrapped transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Sends `request` with current credentials.
	///
	/// Non-success statuses are returned as responses. Errors come from the transport or from
	/// the interceptor (for example a failed refresh or a `401` on the replay).
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut attempt = Attempt::initial();

		loop {
			let mut outgoing = request.clone();

			self.interceptor.before_request(&mut outgoing, &mut attempt).await?;

			let response = self.transport.execute(outgoing).await?;
			let recovery = self.interceptor.after_response(&response, &attempt).await;

			if attempt.is_retry {
				obs::record_flow_outcome(FlowKind::Replay, FlowOutcome::of(&recovery));
			}

			match recovery? {
				Recovery::Replay if !attempt.is_retry => {
					flow_debug!(url = %request.url, "Replaying request with repaired credentials.");
					obs::record_flow_outcome(FlowKind::Replay, FlowOutcome::Attempt);

					attempt = Attempt::replay();
				},
				_ => return Ok(response),
			}
		}
	}
}
impl<T> Clone for AuthorizedClient<T>
where
	T: RequestTransport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), interceptor: self.interceptor.clone() }
	}
}
impl<T> Debug for AuthorizedClient<T>
where
	T: RequestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AuthorizedClient(..)")
	}
}

/// JSON client for one Jira or Bitbucket site.
///
/// Paths are appended to the site's API base URL. Any non-success response that reaches the
/// caller becomes [`Error::Api`], keeping it distinct from authorization failures.
#[derive(Clone, Debug)]
pub struct SiteClient<T>
where
	T: RequestTransport,
{
	site: Site,
	client: AuthorizedClient<T>,
}
impl<T> SiteClient<T>
where
	T: RequestTransport,
{
	/// Builds a client whose interceptor matches the site's auth scheme.
	pub fn for_site(site: Site, store: Arc<dyn CredentialStore>, transport: Arc<T>) -> Self {
		let client = SiteInterceptor::for_site(site.clone(), store).attach(transport);

		Self { site, client }
	}

	/// Wraps an existing authorized client.
	pub fn with_client(site: Site, client: AuthorizedClient<T>) -> Self {
		Self { site, client }
	}

	/// Returns the site.
	pub fn site(&self) -> &Site {
		&self.site
	}

	/// Returns the underlying authorized client.
	pub fn client(&self) -> &AuthorizedClient<T> {
		&self.client
	}

	/// Resolves `path` against the API base URL and appends `query`.
	pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
		let raw = format!(
			"{}/{}",
			self.site.base_api_url.as_str().trim_end_matches('/'),
			path.trim_start_matches('/')
		);
		let mut url = Url::parse(&raw)
			.map_err(|source| ConfigError::InvalidUrl { url: raw.clone(), source })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}

	/// `GET`s `path` and decodes the JSON body.
	pub async fn get_json<R>(&self, path: &str, query: &[(&str, &str)]) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.get_url_json(self.url(path, query)?).await
	}

	/// `GET`s an absolute URL (typically a pagination link) and decodes the JSON body.
	pub async fn get_url_json<R>(&self, url: Url) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.execute(ApiRequest::get(url)).await
	}

	/// `POST`s `body` as JSON to `path` and decodes the response.
	pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: for<'de> Deserialize<'de>,
	{
		self.execute(ApiRequest::post(self.url(path, &[])?).with_json(body)?).await
	}

	/// `PUT`s `body` as JSON to `path` and decodes the response.
	pub async fn put_json<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: for<'de> Deserialize<'de>,
	{
		self.execute(ApiRequest::put(self.url(path, &[])?).with_json(body)?).await
	}

	/// `DELETE`s `path`.
	pub async fn delete(&self, path: &str) -> Result<()> {
		let request = ApiRequest::delete(self.url(path, &[])?);

		self.dispatch(request).await.map(|_| ())
	}

	async fn execute<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		let mut response = self.dispatch(request).await?;

		// Empty bodies (204) decode as JSON `null`.
		if response.body.iter().all(u8::is_ascii_whitespace) {
			response.body = b"null".to_vec();
		}

		response.json()
	}

	async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		let request = request
			.with_header(ACCEPT, HeaderValue::from_static("application/json"))
			.with_header(ATLASSIAN_TOKEN, HeaderValue::from_static("no-check"));
		let request = if request.headers.contains_key(CONTENT_TYPE) {
			request
		} else {
			request.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
		};
		let response = self.client.send(request).await?;

		if response.is_success() {
			Ok(response)
		} else {
			Err(Error::Api { status: response.status.as_u16(), body: response.text() })
		}
	}
}
