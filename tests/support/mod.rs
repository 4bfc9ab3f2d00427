#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use oauth2::http::StatusCode;
use parking_lot::Mutex;
use url::Url;
// self
use atlclient_auth::{
	auth::{AuthInfo, CredentialId, OAuthInfo, Product, Site, SiteId, TokenSecret},
	error::{Error, TransportError},
	http::{ApiRequest, ApiResponse, RequestTransport, TransportFuture},
	store::{CredentialFuture, CredentialStore},
};

/// API double that accepts exactly one bearer token and answers `401` otherwise.
pub struct TokenApi {
	accepted: Mutex<String>,
	delay: Duration,
	seen: Mutex<Vec<Option<String>>>,
}
impl TokenApi {
	pub fn accepting(token: &str) -> Arc<Self> {
		Self::with_delay(token, Duration::ZERO)
	}

	pub fn with_delay(token: &str, delay: Duration) -> Arc<Self> {
		Arc::new(Self { accepted: Mutex::new(token.into()), delay, seen: Mutex::new(Vec::new()) })
	}

	pub fn accept(&self, token: &str) {
		*self.accepted.lock() = token.into();
	}

	/// Authorization headers in the order the requests arrived.
	pub fn seen(&self) -> Vec<Option<String>> {
		self.seen.lock().clone()
	}
}
impl RequestTransport for TokenApi {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let header = request.authorization().map(str::to_owned);

		self.seen.lock().push(header.clone());

		Box::pin(async move {
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}

			let expected = format!("Bearer {}", self.accepted.lock());

			Ok(if header.as_deref() == Some(expected.as_str()) {
				let body = serde_json::json!({ "token": expected, "url": request.url.as_str() });

				ApiResponse::new(StatusCode::OK, body.to_string())
			} else {
				ApiResponse::new(StatusCode::UNAUTHORIZED, "expired")
			})
		})
	}
}

/// Credential store that mints `fresh-N` tokens, with optional latency and failures.
pub struct CountingStore {
	access: Mutex<Option<String>>,
	lookups: AtomicUsize,
	refreshes: AtomicUsize,
	failures_left: AtomicUsize,
	refresh_delay: Duration,
}
impl CountingStore {
	pub fn holding(access: &str) -> Self {
		Self {
			access: Mutex::new(Some(access.into())),
			lookups: AtomicUsize::new(0),
			refreshes: AtomicUsize::new(0),
			failures_left: AtomicUsize::new(0),
			refresh_delay: Duration::ZERO,
		}
	}

	pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
		self.refresh_delay = delay;

		self
	}

	/// Makes the next `count` refreshes fail with a network error.
	pub fn failing(self, count: usize) -> Self {
		self.failures_left.store(count, Ordering::SeqCst);

		self
	}

	pub fn lookups(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}

	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}
}
impl CredentialStore for CountingStore {
	fn auth_info<'a>(&'a self, _site: &'a Site) -> CredentialFuture<'a, Option<AuthInfo>> {
		self.lookups.fetch_add(1, Ordering::SeqCst);

		let info: Option<AuthInfo> =
			self.access.lock().clone().map(|access| OAuthInfo::new(access).into());

		Box::pin(async move { Ok(info) })
	}

	fn refresh_access_token<'a>(&'a self, _site: &'a Site) -> CredentialFuture<'a, TokenSecret> {
		let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			if !self.refresh_delay.is_zero() {
				tokio::time::sleep(self.refresh_delay).await;
			}

			let fail = self
				.failures_left
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
				.is_ok();

			if fail {
				return Err(Error::Transport(TransportError::Io(std::io::Error::other(
					"connection reset",
				))));
			}

			let token = format!("fresh-{n}");

			*self.access.lock() = Some(token.clone());

			Ok(TokenSecret::new(token))
		})
	}
}

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("Test URL should parse.")
}

pub fn jira_cloud_site(base: &str) -> Site {
	Site::new(
		SiteId::new("acme").expect("Site id should be valid."),
		Product::Jira,
		url(base),
		CredentialId::new("acme-login").expect("Credential id should be valid."),
	)
}

pub fn bitbucket_server_site(base: &str) -> Site {
	Site::new(
		SiteId::new("corp").expect("Site id should be valid."),
		Product::Bitbucket,
		url(base),
		CredentialId::new("corp-login").expect("Credential id should be valid."),
	)
	.server()
}

pub fn get(url_str: &str) -> ApiRequest {
	ApiRequest::get(url(url_str))
}
