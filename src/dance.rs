//! Browser-driven authorization against the hosted OAuth dancer service.
//!
//! The dancer brokers the authorization-code grant on the user's behalf: the client opens
//! `{base}/auth/{provider}?state=..&protocol=..` in a browser and polls `{base}/poll?state=..`
//! until the service publishes the issued tokens. At most one authorization is pending per
//! provider. Starting a new one cancels the previous dance, the browser timeout ends the
//! polling loop, and [`AuthorizationDancer::shutdown`] cancels every pending dance.

pub mod payload;

pub use payload::{AccessibleResource, TokenPayload};

// crates.io
use rand::{Rng, distr::Alphanumeric};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::{AuthorizationError, ConfigError},
	http::{ApiRequest, RequestTransport},
	obs::{FlowKind, FlowSpan, flow_debug},
	provider::OAuthProvider,
};

const STATE_LEN: usize = 32;

/// Dancer endpoint and polling configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DancerConfig {
	/// Base URL of the dancer service.
	pub base_url: Url,
	/// Protocol the dancer redirects back to once the user approves.
	pub protocol: String,
	/// Delay between poll requests.
	pub poll_interval: StdDuration,
	/// Time the user has to finish the browser flow.
	pub browser_timeout: StdDuration,
}
impl DancerConfig {
	/// Default redirect protocol.
	pub const DEFAULT_PROTOCOL: &'static str = "vscode";
	/// Default delay between polls.
	pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);
	/// Default browser timeout.
	pub const DEFAULT_BROWSER_TIMEOUT: StdDuration = StdDuration::from_secs(5 * 60);

	/// Creates a configuration targeting `base_url` with default timings.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			protocol: Self::DEFAULT_PROTOCOL.into(),
			poll_interval: Self::DEFAULT_POLL_INTERVAL,
			browser_timeout: Self::DEFAULT_BROWSER_TIMEOUT,
		}
	}

	/// Overrides the redirect protocol (e.g., `vscode-insiders`).
	pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
		self.protocol = protocol.into();

		self
	}

	/// Overrides the poll interval.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the browser timeout.
	pub fn with_browser_timeout(mut self, timeout: StdDuration) -> Self {
		self.browser_timeout = timeout;

		self
	}

	/// Builds the URL the user visits to authorize `provider`.
	pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> Result<Url> {
		let mut url = self.endpoint(&format!("auth/{provider}"))?;

		url.query_pairs_mut().append_pair("state", state).append_pair("protocol", &self.protocol);

		Ok(url)
	}

	/// Builds the URL polled for the tokens issued under `state`.
	pub fn poll_url(&self, state: &str) -> Result<Url> {
		let mut url = self.endpoint("poll")?;

		url.query_pairs_mut().append_pair("state", state);

		Ok(url)
	}

	fn endpoint(&self, path: &str) -> Result<Url> {
		let raw = format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'));

		let url =
			Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { url: raw.clone(), source })?;

		Ok(url)
	}
}

/// Opens authorization URLs for the user.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Opens `url` in the user's browser.
	fn open(&self, url: &Url) -> std::io::Result<()>;
}
impl<F> BrowserLauncher for F
where
	F: Send + Sync + Fn(&Url) -> std::io::Result<()>,
{
	fn open(&self, url: &Url) -> std::io::Result<()> {
		self(url)
	}
}

/// Launcher backed by the system's default browser.
#[cfg(feature = "browser")]
#[derive(Clone, Copy, Debug, Default)]
pub struct WebBrowserLauncher;
#[cfg(feature = "browser")]
impl BrowserLauncher for WebBrowserLauncher {
	fn open(&self, url: &Url) -> std::io::Result<()> {
		webbrowser::open(url.as_str())
	}
}

struct PendingAuthorization {
	state: String,
	cancel: CancellationToken,
}

/// Coordinates browser authorizations, one pending dance per provider.
pub struct AuthorizationDancer<T, B>
where
	T: RequestTransport,
	B: BrowserLauncher,
{
	config: DancerConfig,
	transport: Arc<T>,
	launcher: B,
	pending: Mutex<HashMap<OAuthProvider, PendingAuthorization>>,
	shutdown: CancellationToken,
}
impl<T, B> AuthorizationDancer<T, B>
where
	T: RequestTransport,
	B: BrowserLauncher,
{
	/// Creates a dancer polling over `transport` and opening URLs with `launcher`.
	pub fn new(config: DancerConfig, transport: Arc<T>, launcher: B) -> Self {
		Self {
			config,
			transport,
			launcher,
			pending: Mutex::new(HashMap::new()),
			shutdown: CancellationToken::new(),
		}
	}

	/// Returns the configuration.
	pub fn config(&self) -> &DancerConfig {
		&self.config
	}

	/// Returns the state token of the dance pending for `provider`, if any.
	pub fn pending_state(&self, provider: OAuthProvider) -> Option<String> {
		self.pending.lock().get(&provider).map(|entry| entry.state.clone())
	}

	/// Opens the browser for `provider` and polls until the dancer publishes tokens.
	///
	/// Any dance already pending for the same provider is cancelled and resolves with
	/// [`AuthorizationError::Superseded`].
	pub async fn start_authorization(&self, provider: OAuthProvider) -> Result<TokenPayload> {
		FlowSpan::new(FlowKind::Dance, "start_authorization", provider.as_str())
			.observe(self.dance(provider))
			.await
	}

	/// Cancels every pending dance; later dances resolve with
	/// [`AuthorizationError::Cancelled`] immediately.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
		self.pending.lock().clear();
	}

	async fn dance(&self, provider: OAuthProvider) -> Result<TokenPayload> {
		if self.shutdown.is_cancelled() {
			return Err(AuthorizationError::Cancelled { provider }.into());
		}

		let state = random_state();
		let cancel = self.register(provider, &state);
		let _release = PendingRelease { pending: &self.pending, provider, state: &state };
		let authorize_url = self.config.authorize_url(provider, &state)?;
		let poll_url = self.config.poll_url(&state)?;

		self.launcher
			.open(&authorize_url)
			.map_err(|source| AuthorizationError::BrowserLaunch { provider, source })?;

		let deadline = Instant::now() + self.config.browser_timeout;

		loop {
			self.bounded(provider, &cancel, deadline, tokio::time::sleep(self.config.poll_interval))
				.await?;

			if let Some(payload) =
				self.bounded(provider, &cancel, deadline, self.poll(&poll_url)).await?
			{
				return Ok(payload);
			}
		}
	}

	fn register(&self, provider: OAuthProvider, state: &str) -> CancellationToken {
		let cancel = self.shutdown.child_token();
		let previous = self
			.pending
			.lock()
			.insert(provider, PendingAuthorization { state: state.into(), cancel: cancel.clone() });

		if let Some(previous) = previous {
			flow_debug!(%provider, "Superseding pending authorization.");

			previous.cancel.cancel();
		}

		cancel
	}

	async fn bounded<F>(
		&self,
		provider: OAuthProvider,
		cancel: &CancellationToken,
		deadline: Instant,
		fut: F,
	) -> Result<F::Output>
	where
		F: Future,
	{
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(self.cancellation(provider).into()),
			_ = tokio::time::sleep_until(deadline) => Err(AuthorizationError::TimedOut {
				provider,
				timeout: self.config.browser_timeout,
			}
			.into()),
			output = fut => Ok(output),
		}
	}

	fn cancellation(&self, provider: OAuthProvider) -> AuthorizationError {
		if self.shutdown.is_cancelled() {
			AuthorizationError::Cancelled { provider }
		} else {
			AuthorizationError::Superseded { provider }
		}
	}

	async fn poll(&self, url: &Url) -> Option<TokenPayload> {
		let response = match self.transport.execute(ApiRequest::get(url.clone())).await {
			Ok(response) => response,
			Err(e) => {
				flow_debug!(error = %e, "Dance poll failed.");

				return None;
			},
		};

		if !response.is_success() {
			flow_debug!(status = response.status.as_u16(), "Dance poll not ready.");

			return None;
		}

		match response.json() {
			Ok(payload) => Some(payload),
			Err(e) => {
				flow_debug!(error = %e, "Dance poll returned an unreadable payload.");

				None
			},
		}
	}
}
impl<T, B> Debug for AuthorizationDancer<T, B>
where
	T: RequestTransport,
	B: BrowserLauncher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationDancer")
			.field("config", &self.config)
			.field("pending", &self.pending.lock().keys().collect::<Vec<_>>())
			.finish()
	}
}

// Removes the pending entry on exit unless a newer dance already replaced it.
struct PendingRelease<'a> {
	pending: &'a Mutex<HashMap<OAuthProvider, PendingAuthorization>>,
	provider: OAuthProvider,
	state: &'a str,
}
impl Drop for PendingRelease<'_> {
	fn drop(&mut self) {
		let mut pending = self.pending.lock();

		if pending.get(&self.provider).is_some_and(|entry| entry.state == self.state) {
			pending.remove(&self.provider);
		}
	}
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}
