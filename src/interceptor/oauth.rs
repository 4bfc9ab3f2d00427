//! Bearer-token interceptor with single-flight refresh and request replay.
//!
//! Every bearer token the interceptor caches belongs to a *generation*. Outgoing requests
//! record the generation they were authorized with in their [`Attempt`]. When a request
//! comes back `401`, its owner takes the refresh guard:
//!
//! - If the generation already moved on, another request refreshed while this one was in
//!   flight or waiting, so it replays with the newer token (or shares that refresh's error).
//! - Otherwise it is the first to notice the stale token and performs the refresh itself,
//!   while every later `401` queues on the guard instead of starting a second refresh.
//!
//! Waiters are woken by the guard itself, so there is no polling interval between a refresh
//! completing and the queued requests replaying.

// std
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, Site, TokenSecret},
	error::{ConfigError, TransientError},
	http::{ApiRequest, ApiResponse},
	interceptor::{
		Attempt, AuthorizationInterceptor, InterceptFuture, Recovery, RefreshMetrics,
		metrics::RefreshEvent,
	},
	obs::{FlowKind, FlowSpan, flow_debug},
	provider::OAuthProvider,
	store::CredentialStore,
};

/// Observable refresh state of an [`OAuthInterceptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterceptorState {
	/// No refresh is running.
	Idle,
	/// A refresh owns the right to call the credential store.
	Refreshing,
}

#[derive(Debug, Default)]
struct BearerCache {
	token: Option<TokenSecret>,
	generation: u64,
	last_failure: Option<Arc<Error>>,
}

/// Attaches `Authorization: Bearer <token>` and repairs expired tokens on `401`.
///
/// One instance serves one site over one transport. At most one refresh is in flight per
/// instance; concurrent `401`s wait for it and replay with its result. A `401` on a replayed
/// request is terminal and surfaces as [`Error::Unauthorized`].
pub struct OAuthInterceptor {
	site: Site,
	provider: Option<OAuthProvider>,
	store: Arc<dyn CredentialStore>,
	cache: Mutex<BearerCache>,
	refresh_guard: AsyncMutex<()>,
	refreshing: AtomicBool,
	waiting: AtomicUsize,
	refresh_timeout: Option<StdDuration>,
	metrics: RefreshMetrics,
}
impl OAuthInterceptor {
	/// Creates an interceptor resolving and refreshing tokens for `site` through `store`.
	pub fn new(site: Site, store: Arc<dyn CredentialStore>) -> Self {
		Self {
			provider: OAuthProvider::for_site(&site),
			site,
			store,
			cache: Mutex::new(BearerCache::default()),
			refresh_guard: AsyncMutex::new(()),
			refreshing: AtomicBool::new(false),
			waiting: AtomicUsize::new(0),
			refresh_timeout: None,
			metrics: RefreshMetrics::default(),
		}
	}

	/// Fails refreshes that take longer than `timeout` with
	/// [`TransientError::RefreshTimedOut`].
	pub fn with_refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.refresh_timeout = Some(timeout);

		self
	}

	/// Returns the site the interceptor authorizes.
	pub fn site(&self) -> &Site {
		&self.site
	}

	/// Returns the provider that refreshes this site's tokens, if any.
	pub fn provider(&self) -> Option<OAuthProvider> {
		self.provider
	}

	/// Returns the current refresh state.
	pub fn state(&self) -> InterceptorState {
		if self.is_refreshing() { InterceptorState::Refreshing } else { InterceptorState::Idle }
	}

	/// Returns `true` while a refresh is running.
	pub fn is_refreshing(&self) -> bool {
		self.refreshing.load(Ordering::SeqCst)
	}

	/// Returns how many `401`-triggered recoveries are queued behind the refresh guard.
	pub fn waiting_requests(&self) -> usize {
		self.waiting.load(Ordering::SeqCst)
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns the cached bearer token, if one has been resolved.
	pub fn cached_token(&self) -> Option<TokenSecret> {
		self.cache.lock().token.clone()
	}

	/// Refreshes the token now, sharing the outcome with any concurrent `401` recovery.
	pub async fn force_refresh(&self) -> Result<()> {
		if self.provider.is_none() {
			return Err(ConfigError::NoOAuthProvider { site: self.site.id.clone() }.into());
		}

		let observed = self.cache.lock().generation;

		self.recover(observed).await
	}

	async fn current_token(&self) -> Result<(Option<TokenSecret>, u64)> {
		let observed = {
			let cache = self.cache.lock();

			if cache.token.is_some() {
				return Ok((cache.token.clone(), cache.generation));
			}

			cache.generation
		};
		let fetched = match self.store.auth_info(&self.site).await? {
			Some(AuthInfo::OAuth(info)) => Some(info.access),
			_ => None,
		};
		let mut cache = self.cache.lock();

		// A refresh that finished during the lookup wins over the stored value.
		if cache.generation == observed && cache.token.is_none() {
			cache.token = fetched;
		}

		Ok((cache.token.clone(), cache.generation))
	}

	async fn recover(&self, observed: u64) -> Result<()> {
		let queued = CounterGuard::enter(&self.waiting);

		flow_debug!(site = %self.site.id, "Waiting on refresh guard.");

		let _guard = self.refresh_guard.lock().await;

		drop(queued);

		if let Some(outcome) = self.joined_outcome(observed) {
			self.metrics.record(RefreshEvent::Coalesced);

			flow_debug!(site = %self.site.id, "Joined a completed refresh.");

			return outcome;
		}

		let _refreshing = RefreshingFlag::raise(&self.refreshing);

		self.metrics.record(RefreshEvent::Attempt);

		let result = FlowSpan::new(FlowKind::Refresh, "oauth_interceptor", &self.site.id)
			.observe(self.refresh_token())
			.await;
		let mut cache = self.cache.lock();

		cache.generation += 1;

		match result {
			Ok(token) => {
				cache.token = Some(token);
				cache.last_failure = None;
				self.metrics.record(RefreshEvent::Success);

				Ok(())
			},
			Err(e) => {
				let source = Arc::new(e);

				cache.last_failure = Some(source.clone());
				self.metrics.record(RefreshEvent::Failure);

				Err(Error::RefreshFailed { site: self.site.id.clone(), source })
			},
		}
	}

	fn joined_outcome(&self, observed: u64) -> Option<Result<()>> {
		let cache = self.cache.lock();

		if cache.generation == observed {
			return None;
		}

		Some(match &cache.last_failure {
			Some(source) =>
				Err(Error::RefreshFailed { site: self.site.id.clone(), source: source.clone() }),
			None => Ok(()),
		})
	}

	async fn refresh_token(&self) -> Result<TokenSecret> {
		let refresh = self.store.refresh_access_token(&self.site);
		let Some(timeout) = self.refresh_timeout else {
			return refresh.await;
		};

		match tokio::time::timeout(timeout, refresh).await {
			Ok(result) => result,
			Err(_) => Err(TransientError::RefreshTimedOut { timeout }.into()),
		}
	}
}
impl Debug for OAuthInterceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthInterceptor")
			.field("site", &self.site.id)
			.field("provider", &self.provider)
			.field("state", &self.state())
			.field("waiting", &self.waiting_requests())
			.finish()
	}
}
impl AuthorizationInterceptor for OAuthInterceptor {
	fn before_request<'a>(
		&'a self,
		request: &'a mut ApiRequest,
		attempt: &'a mut Attempt,
	) -> InterceptFuture<'a, ()> {
		Box::pin(async move {
			let (token, generation) = self.current_token().await?;

			attempt.token_generation = generation;

			if let Some(token) = token {
				request.set_authorization(&format!("Bearer {}", token.expose()))?;
			}

			Ok(())
		})
	}

	fn after_response<'a>(
		&'a self,
		response: &'a ApiResponse,
		attempt: &'a Attempt,
	) -> InterceptFuture<'a, Recovery> {
		Box::pin(async move {
			if !response.is_unauthorized() {
				return Ok(Recovery::Deliver);
			}

			flow_debug!(site = %self.site.id, retry = attempt.is_retry, "Received 401.");

			if attempt.is_retry || self.provider.is_none() {
				return Err(Error::Unauthorized { site: self.site.id.clone() });
			}

			self.recover(attempt.token_generation).await?;

			Ok(Recovery::Replay)
		})
	}
}

struct CounterGuard<'a>(&'a AtomicUsize);
impl<'a> CounterGuard<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);

		Self(counter)
	}
}
impl Drop for CounterGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

// Cleared on drop so a cancelled refresh never leaves the interceptor stuck in `Refreshing`.
struct RefreshingFlag<'a>(&'a AtomicBool);
impl<'a> RefreshingFlag<'a> {
	fn raise(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::SeqCst);

		Self(flag)
	}
}
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}
