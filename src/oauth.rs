//! Refresh-token grants executed through the `oauth2` crate over a [`RequestTransport`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError, TransportError},
	http::{ApiRequest, RequestTransport, ResponseMetadata, ResponseMetadataSlot},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type HandleFuture<'c> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<TransportError>>> + 'c + Send>>;

/// Tokens minted by a successful refresh grant.
#[derive(Clone, Debug)]
pub struct RefreshedTokens {
	/// New access token.
	pub access: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh: Option<TokenSecret>,
	/// Expiry derived from `expires_in`, when the provider sent it.
	pub expires_at: Option<OffsetDateTime>,
}

/// [`AsyncHttpClient`] adapter that routes `oauth2` requests through a [`RequestTransport`]
/// and records the response status for error mapping.
pub(crate) struct TransportHandle<T>
where
	T: ?Sized + RequestTransport,
{
	transport: Arc<T>,
	slot: ResponseMetadataSlot,
}
impl<T> TransportHandle<T>
where
	T: ?Sized + RequestTransport,
{
	pub(crate) fn new(transport: Arc<T>, slot: ResponseMetadataSlot) -> Self {
		Self { transport, slot }
	}
}
impl<'c, T> AsyncHttpClient<'c> for TransportHandle<T>
where
	T: ?Sized + RequestTransport,
{
	type Error = HttpClientError<TransportError>;
	type Future = HandleFuture<'c>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let (parts, body) = request.into_parts();
			let url = Url::parse(&parts.uri.to_string()).map_err(|e| {
				HttpClientError::Other(format!("Token request URI `{}` is invalid: {e}", parts.uri))
			})?;
			let request = ApiRequest {
				method: parts.method,
				url,
				headers: parts.headers,
				body: (!body.is_empty()).then_some(body),
			};
			let response = self.transport.execute(request).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata {
				status: Some(response.status.as_u16()),
				retry_after: response.retry_after(),
			});

			let mut http_response = HttpResponse::new(response.body);

			*http_response.status_mut() = response.status;
			*http_response.headers_mut() = response.headers;

			Ok(http_response)
		})
	}
}

/// Configured `oauth2` client for one provider descriptor.
pub(crate) struct RefreshFacade {
	oauth_client: ConfiguredBasicClient,
}
impl RefreshFacade {
	pub(crate) fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.authorization_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(descriptor.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = &descriptor.client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if matches!(descriptor.client_auth, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client })
	}

	/// Exchanges `refresh_token` for a new access token.
	pub(crate) async fn refresh<T>(
		&self,
		transport: Arc<T>,
		refresh_token: &TokenSecret,
	) -> Result<RefreshedTokens>
	where
		T: ?Sized + RequestTransport,
	{
		let meta = ResponseMetadataSlot::default();
		let handle = TransportHandle::new(transport, meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;

		map_refresh_response(response)
	}
}

fn map_refresh_response(response: BasicTokenResponse) -> Result<RefreshedTokens> {
	let expires_at = match response.expires_in() {
		Some(expires_in) => {
			let secs = i64::try_from(expires_in.as_secs())
				.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			OffsetDateTime::now_utc().checked_add(Duration::seconds(secs))
		},
		None => None,
	};

	Ok(RefreshedTokens {
		access: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		expires_at,
	})
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::ResponseParse { source, status: meta_status(meta) }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.to_owned(),
	};

	match classify_oauth_error(code).unwrap_or_else(|| classify_status(meta_status(meta))) {
		TokenErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		TokenErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		TokenErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<TransportError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => Error::Transport(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenErrorKind {
	InvalidGrant,
	InvalidClient,
	Transient,
}

fn classify_oauth_error(code: &str) -> Option<TokenErrorKind> {
	if code.eq_ignore_ascii_case("invalid_grant") || code.eq_ignore_ascii_case("access_denied") {
		Some(TokenErrorKind::InvalidGrant)
	} else if code.eq_ignore_ascii_case("invalid_client")
		|| code.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if code.eq_ignore_ascii_case("temporarily_unavailable")
		|| code.eq_ignore_ascii_case("server_error")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		_ => TokenErrorKind::Transient,
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
