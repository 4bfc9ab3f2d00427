//! Static `Basic` credentials for server and data-center sites.

// self
use crate::{
	_prelude::*,
	auth::{AuthInfo, Site, TokenSecret},
	http::ApiRequest,
	interceptor::{Attempt, AuthorizationInterceptor, InterceptFuture},
	store::CredentialStore,
};

/// Attaches `Authorization: Basic <base64(username:password)>` to every request.
///
/// The encoded token is derived from the first Basic credentials the store returns and is
/// reused for the lifetime of the interceptor. When no Basic credentials are stored the
/// header is omitted and the request proceeds unauthenticated. 401 responses are delivered
/// to the caller untouched.
pub struct BasicInterceptor {
	site: Site,
	store: Arc<dyn CredentialStore>,
	token: Mutex<Option<TokenSecret>>,
}
impl BasicInterceptor {
	/// Creates an interceptor resolving credentials for `site` from `store`.
	pub fn new(site: Site, store: Arc<dyn CredentialStore>) -> Self {
		Self { site, store, token: Mutex::new(None) }
	}

	/// Returns the site the interceptor authorizes.
	pub fn site(&self) -> &Site {
		&self.site
	}

	async fn token(&self) -> Result<Option<TokenSecret>> {
		let cached = self.token.lock().clone();

		if cached.is_some() {
			return Ok(cached);
		}

		let Some(AuthInfo::Basic(info)) = self.store.auth_info(&self.site).await? else {
			return Ok(None);
		};
		let token = info.header_token();

		Ok(Some(self.token.lock().get_or_insert(token).clone()))
	}
}
impl Debug for BasicInterceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicInterceptor")
			.field("site", &self.site.id)
			.field("cached", &self.token.lock().is_some())
			.finish()
	}
}
impl AuthorizationInterceptor for BasicInterceptor {
	fn before_request<'a>(
		&'a self,
		request: &'a mut ApiRequest,
		_attempt: &'a mut Attempt,
	) -> InterceptFuture<'a, ()> {
		Box::pin(async move {
			if let Some(token) = self.token().await? {
				request.set_authorization(&format!("Basic {}", token.expose()))?;
			}

			Ok(())
		})
	}
}
