mod support;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use oauth2::http::StatusCode;
// self
use atlclient_auth::{
	auth::BasicAuthInfo,
	client::AuthorizedClient,
	credential::CredentialManager,
	error::{Error, TransportError},
	http::{ApiResponse, RequestTransport},
	interceptor::{
		AuthorizationInterceptor, InterceptorState, OAuthInterceptor, RefreshMetrics, SiteInterceptor,
	},
	store::{CredentialStore, MemoryStore},
};
use support::*;

const ENDPOINT: &str = "https://acme.atlassian.net/rest/api/2/myself";

fn oauth_client<T>(
	store: &Arc<CountingStore>,
	api: &Arc<T>,
) -> (Arc<OAuthInterceptor>, AuthorizedClient<T>)
where
	T: RequestTransport,
{
	let interceptor = Arc::new(OAuthInterceptor::new(
		jira_cloud_site("https://acme.atlassian.net/"),
		store.clone() as Arc<dyn CredentialStore>,
	));
	let client = AuthorizedClient::new(api.clone(), interceptor.clone());

	(interceptor, client)
}

fn token_of(response: &ApiResponse) -> String {
	let body: serde_json::Value = response.json().expect("API double returns JSON.");

	body["token"].as_str().expect("API double echoes the token.").to_owned()
}

#[tokio::test]
async fn expired_token_is_refreshed_and_the_request_replayed_transparently() {
	let store = Arc::new(CountingStore::holding("stale"));
	let api = TokenApi::accepting("fresh-1");
	let (interceptor, client) = oauth_client(&store, &api);
	let response = client.send(get(ENDPOINT)).await.expect("Replay should succeed.");

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(token_of(&response), "Bearer fresh-1");
	assert_eq!(
		api.seen(),
		[Some("Bearer stale".to_owned()), Some("Bearer fresh-1".to_owned())]
	);
	assert_eq!(store.refreshes(), 1);

	let metrics: &RefreshMetrics = interceptor.metrics();

	assert_eq!((metrics.attempts(), metrics.successes()), (1, 1));
	assert_eq!(interceptor.state(), InterceptorState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	const REQUESTS: usize = 8;

	let store =
		Arc::new(CountingStore::holding("stale").with_refresh_delay(Duration::from_millis(50)));
	let api = TokenApi::with_delay("fresh-1", Duration::from_millis(20));
	let (interceptor, client) = oauth_client(&store, &api);
	let handles = (0..REQUESTS)
		.map(|_| {
			let client = client.clone();

			tokio::spawn(async move { client.send(get(ENDPOINT)).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let response = handle
			.await
			.expect("Request task should not panic.")
			.expect("Every request should succeed after the shared refresh.");

		assert_eq!(token_of(&response), "Bearer fresh-1");
	}

	assert_eq!(store.refreshes(), 1);
	assert_eq!(interceptor.metrics().attempts(), 1);
	assert_eq!(interceptor.metrics().coalesced(), REQUESTS as u64 - 1);
	assert_eq!(interceptor.waiting_requests(), 0);
	assert!(!interceptor.is_refreshing());
}

#[tokio::test]
async fn late_unauthorized_request_waits_for_the_running_refresh() {
	let store =
		Arc::new(CountingStore::holding("stale").with_refresh_delay(Duration::from_millis(100)));
	let api = TokenApi::accepting("fresh-1");
	let (interceptor, client) = oauth_client(&store, &api);
	let (first, second) = tokio::join!(client.send(get(ENDPOINT)), async {
		tokio::time::sleep(Duration::from_millis(10)).await;

		assert!(interceptor.is_refreshing(), "First request should be refreshing by now.");

		let response = client.send(get(ENDPOINT)).await;

		assert!(!interceptor.is_refreshing());

		response
	});

	assert_eq!(token_of(&first.expect("First request should replay.")), "Bearer fresh-1");
	assert_eq!(token_of(&second.expect("Second request should replay.")), "Bearer fresh-1");
	assert_eq!(store.refreshes(), 1);
	assert_eq!(interceptor.metrics().coalesced(), 1);
}

#[tokio::test]
async fn unauthorized_replay_fails_without_a_second_refresh() {
	let store = Arc::new(CountingStore::holding("stale"));
	let api = TokenApi::accepting("never-issued");
	let (_, client) = oauth_client(&store, &api);
	let err = client.send(get(ENDPOINT)).await.expect_err("Replay is rejected again.");

	assert!(matches!(err, Error::Unauthorized { .. }));
	assert!(err.requires_reauthentication());
	assert_eq!(store.refreshes(), 1);
	assert_eq!(api.seen().len(), 2);
}

#[tokio::test]
async fn cached_bearer_is_reused_until_a_forced_refresh() {
	let store = Arc::new(CountingStore::holding("initial"));
	let api = TokenApi::accepting("initial");
	let (interceptor, client) = oauth_client(&store, &api);

	for _ in 0..3 {
		client.send(get(ENDPOINT)).await.expect("Cached token should be accepted.");
	}

	assert_eq!(store.lookups(), 1);
	assert_eq!(store.refreshes(), 0);

	interceptor.force_refresh().await.expect("Forced refresh should succeed.");
	api.accept("fresh-1");

	let response = client.send(get(ENDPOINT)).await.expect("Refreshed token should be accepted.");

	assert_eq!(token_of(&response), "Bearer fresh-1");
	assert_eq!(
		interceptor.cached_token().map(|token| token.expose().to_owned()).as_deref(),
		Some("fresh-1")
	);
	assert_eq!(store.lookups(), 1);
	assert_eq!(store.refreshes(), 1);
}

#[tokio::test]
async fn refresh_network_failure_rejects_the_request_and_resets_state() {
	let store = Arc::new(CountingStore::holding("stale").failing(1));
	let api = TokenApi::accepting("fresh-2");
	let (interceptor, client) = oauth_client(&store, &api);
	let err = client.send(get(ENDPOINT)).await.expect_err("Refresh failure should surface.");

	match &err {
		Error::RefreshFailed { source, .. } =>
			assert!(matches!(**source, Error::Transport(TransportError::Io(_)))),
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(!err.requires_reauthentication());
	assert_eq!(interceptor.state(), InterceptorState::Idle);
	assert_eq!(interceptor.metrics().failures(), 1);

	let response = client.send(get(ENDPOINT)).await.expect("Next refresh should succeed.");

	assert_eq!(token_of(&response), "Bearer fresh-2");
	assert_eq!(store.refreshes(), 2);
}

#[tokio::test]
async fn basic_sites_send_a_fixed_header_and_deliver_unauthorized() {
	let site = bitbucket_server_site("https://git.corp.example/");
	let api = TokenApi::accepting("unused");
	let manager = CredentialManager::new(Arc::new(MemoryStore::default()), api.clone());

	manager
		.save(&site, BasicAuthInfo::new("u", "p"))
		.await
		.expect("Seeding Basic credentials should succeed.");

	let client = SiteInterceptor::for_site(site, Arc::new(manager)).attach(api.clone());

	for _ in 0..2 {
		let response = client
			.send(get("https://git.corp.example/rest/api/1.0/users"))
			.await
			.expect("Basic requests never error on 401.");

		assert_eq!(response.status, StatusCode::UNAUTHORIZED);
	}

	assert_eq!(api.seen(), [Some("Basic dTpw".to_owned()), Some("Basic dTpw".to_owned())]);
}
