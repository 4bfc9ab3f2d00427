//! Credential manager backing interceptors with persisted secrets and refresh grants.
//!
//! [`CredentialManager`] implements [`CredentialStore`] on top of a [`SecretStore`]. Refreshes
//! are serialized per credential with a singleflight guard, so interceptors for different
//! transports that share a site never race each other at the token endpoint: whoever
//! queues behind a refresh that already rotated the stored token receives that token
//! without a second grant. `invalid_grant` responses remove the stored credentials so the
//! UI can prompt for a new login.

// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, CredentialId, OAuthInfo, Site, TokenSecret},
	error::ConfigError,
	http::RequestTransport,
	oauth::RefreshFacade,
	obs::{FlowKind, FlowSpan, flow_debug},
	provider::{OAuthProvider, ProviderDescriptor},
	store::{CredentialFuture, CredentialStore, SecretStore},
};

/// [`CredentialStore`] that persists credentials and refreshes OAuth tokens.
pub struct CredentialManager<T>
where
	T: RequestTransport,
{
	secrets: Arc<dyn SecretStore>,
	transport: Arc<T>,
	descriptors: HashMap<OAuthProvider, ProviderDescriptor>,
	flow_guards: Mutex<HashMap<CredentialId, Arc<AsyncMutex<()>>>>,
}
impl<T> CredentialManager<T>
where
	T: RequestTransport,
{
	/// Creates a manager persisting to `secrets` and calling token endpoints over `transport`.
	pub fn new(secrets: Arc<dyn SecretStore>, transport: Arc<T>) -> Self {
		Self {
			secrets,
			transport,
			descriptors: HashMap::new(),
			flow_guards: Mutex::new(HashMap::new()),
		}
	}

	/// Registers the descriptor used to refresh tokens issued by `descriptor.provider`.
	pub fn with_descriptor(mut self, descriptor: ProviderDescriptor) -> Self {
		self.descriptors.insert(descriptor.provider, descriptor);

		self
	}

	/// Returns the descriptor registered for `provider`.
	pub fn descriptor(&self, provider: OAuthProvider) -> Option<&ProviderDescriptor> {
		self.descriptors.get(&provider)
	}

	/// Persists credentials for `site`, typically after a login or authorization dance.
	pub async fn save(&self, site: &Site, info: impl Into<AuthInfo>) -> Result<()> {
		self.secrets.set(site.credential_id.clone(), info.into()).await?;

		Ok(())
	}

	/// Removes and returns the credentials stored for `site`.
	pub async fn remove(&self, site: &Site) -> Result<Option<AuthInfo>> {
		Ok(self.secrets.remove(&site.credential_id).await?)
	}

	/// Exchanges the stored refresh token for a new access token and persists the result.
	pub async fn refresh(&self, site: &Site) -> Result<TokenSecret> {
		FlowSpan::new(FlowKind::Grant, "credential_manager", &site.id)
			.observe(self.refresh_inner(site))
			.await
	}

	async fn refresh_inner(&self, site: &Site) -> Result<TokenSecret> {
		let provider = OAuthProvider::for_site(site)
			.ok_or_else(|| ConfigError::NoOAuthProvider { site: site.id.clone() })?;
		let descriptor =
			self.descriptors.get(&provider).ok_or(ConfigError::UnknownProvider { provider })?;
		let observed = self.stored_oauth(site).await?.map(|info| info.access);
		let guard = self.flow_guard(&site.credential_id);
		let _singleflight = guard.lock().await;
		let current = self
			.stored_oauth(site)
			.await?
			.ok_or_else(|| ConfigError::MissingCredentials { site: site.id.clone() })?;

		if observed.as_ref().is_some_and(|access| *access != current.access) {
			flow_debug!(site = %site.id, "Stored token rotated while waiting; reusing it.");

			return Ok(current.access);
		}

		let refresh = current.refresh.clone().ok_or(ConfigError::MissingRefreshToken)?;
		let facade = RefreshFacade::from_descriptor(descriptor)?;
		let tokens = match facade.refresh(self.transport.clone(), &refresh).await {
			Ok(tokens) => tokens,
			Err(e) => {
				if matches!(e, Error::InvalidGrant { .. }) {
					flow_debug!(site = %site.id, "Refresh grant rejected; removing credentials.");

					if let Err(cleanup) = self.secrets.remove(&site.credential_id).await {
						flow_debug!(
							site = %site.id,
							error = %cleanup,
							"Failed to remove credentials after a rejected grant."
						);
					}
				}

				return Err(e);
			},
		};
		let updated = OAuthInfo {
			access: tokens.access.clone(),
			refresh: tokens.refresh.or(Some(refresh)),
			expires_at: tokens.expires_at,
			user: current.user,
		};

		self.secrets.set(site.credential_id.clone(), updated.into()).await?;

		Ok(tokens.access)
	}

	async fn stored_oauth(&self, site: &Site) -> Result<Option<OAuthInfo>> {
		Ok(match self.secrets.get(&site.credential_id).await? {
			Some(AuthInfo::OAuth(info)) => Some(info),
			_ => None,
		})
	}

	fn flow_guard(&self, id: &CredentialId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl<T> CredentialStore for CredentialManager<T>
where
	T: RequestTransport,
{
	fn auth_info<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, Option<AuthInfo>> {
		Box::pin(async move { Ok(self.secrets.get(&site.credential_id).await?) })
	}

	fn refresh_access_token<'a>(&'a self, site: &'a Site) -> CredentialFuture<'a, TokenSecret> {
		Box::pin(self.refresh(site))
	}
}
impl<T> Debug for CredentialManager<T>
where
	T: RequestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("providers", &self.descriptors.keys().collect::<Vec<_>>())
			.finish()
	}
}
