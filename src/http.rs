//! Transport primitives shared by API calls, token refreshes, and dance polling.
//!
//! [`RequestTransport`] is the crate's only dependency on an HTTP stack. Interceptors never
//! talk to the network themselves: [`AuthorizedClient`](crate::client::AuthorizedClient)
//! runs their hooks around [`RequestTransport::execute`], and the credential manager feeds
//! the same trait into the `oauth2` crate for refresh grants. Requests are plain values so a
//! failed call can be replayed verbatim after its authorization header is repaired.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
};

/// Boxed future returned by [`RequestTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute [`ApiRequest`] values.
///
/// Implementations resolve to `Ok` for every HTTP response, including 4xx/5xx statuses;
/// only failures that prevent a response (DNS, TCP, TLS, IO) are reported as
/// [`TransportError`]. Implementations must be `Send + Sync + 'static` so a single
/// transport can back many clients and the credential manager at once.
pub trait RequestTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves once the full response body is available.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}
impl<T> RequestTransport for Arc<T>
where
	T: ?Sized + RequestTransport,
{
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Outgoing HTTP request that can be cloned and replayed.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request with no headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Creates a `PUT` request.
	pub fn put(url: Url) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Creates a `DELETE` request.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn with_json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ConfigError::from)?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Replaces the `Authorization` header, marking the value as sensitive.
	pub fn set_authorization(&mut self, value: &str) -> Result<()> {
		let mut header = HeaderValue::from_str(value).map_err(ConfigError::from)?;

		header.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, header);

		Ok(())
	}

	/// Returns the `Authorization` header, if set and valid UTF-8.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}
}

/// Fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with the given status and body and no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for `401 Unauthorized`, the only status interceptors react to.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(self.status.as_u16()) }.into()
		})
	}

	/// Returns the body lossily decoded as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Parses the `Retry-After` header as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints return results directly, so clients passed to
/// [`ReqwestTransport::with_client`] that back a credential manager should disable
/// redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
		let ApiRequest { method, url, headers, body } = request;
		let mut builder = self.0.request(method, url).headers(headers);

		if let Some(body) = body {
			builder = builder.body(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RequestTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(self.send(request))
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
