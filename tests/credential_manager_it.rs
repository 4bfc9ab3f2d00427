#![cfg(feature = "reqwest")]

mod support;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use atlclient_auth::{
	auth::{AuthInfo, OAuthInfo, Site, UserInfo},
	credential::CredentialManager,
	error::{Error, TransientError},
	http::ReqwestTransport,
	provider::{OAuthProvider, ProviderDescriptor},
	store::{CredentialStore, MemoryStore},
};
use support::*;

const JSON: &str = "application/json";

fn manager(server: &MockServer) -> (CredentialManager<ReqwestTransport>, Arc<MemoryStore>) {
	let secrets = Arc::new(MemoryStore::default());
	let descriptor = ProviderDescriptor::builder(OAuthProvider::JiraCloud)
		.token_endpoint(url(&server.url("/oauth/token")))
		.client_id("client-jira")
		.client_secret("secret-jira")
		.build()
		.expect("Loopback token endpoint should be accepted.");
	let manager = CredentialManager::new(secrets.clone(), Arc::new(ReqwestTransport::default()))
		.with_descriptor(descriptor);

	(manager, secrets)
}

async fn seed(manager: &CredentialManager<ReqwestTransport>, site: &Site) {
	let user = UserInfo {
		id: "557058:ada".into(),
		display_name: "Ada".into(),
		email: Some("ada@example.com".into()),
		avatar_url: None,
	};

	manager
		.save(site, OAuthInfo::new("access-old").with_refresh("refresh-old").with_user(user))
		.await
		.expect("Seeding OAuth credentials should succeed.");
}

async fn stored(manager: &CredentialManager<ReqwestTransport>, site: &Site) -> Option<OAuthInfo> {
	match manager.auth_info(site).await.expect("Lookup should succeed.") {
		Some(AuthInfo::OAuth(info)) => Some(info),
		_ => None,
	}
}

#[tokio::test]
async fn refresh_rotates_and_persists_tokens() {
	let server = MockServer::start_async().await;
	let (manager, _) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", JSON).body(
				r#"{"access_token":"access-new","refresh_token":"refresh-new","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;
	let token = manager.refresh(&site).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(token.expose(), "access-new");

	let info = stored(&manager, &site).await.expect("Rotated credentials should be stored.");

	assert_eq!(info.access.expose(), "access-new");
	assert_eq!(info.refresh.as_ref().map(|secret| secret.expose()), Some("refresh-new"));
	assert!(info.expires_at.is_some());
	assert_eq!(info.user.map(|user| user.display_name).as_deref(), Some("Ada"));
}

#[tokio::test]
async fn refresh_keeps_the_old_refresh_token_when_not_rotated() {
	let server = MockServer::start_async().await;
	let (manager, _) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", JSON)
				.body(r#"{"access_token":"access-new","token_type":"bearer"}"#);
		})
		.await;
	manager.refresh(&site).await.expect("Refresh should succeed.");

	let info = stored(&manager, &site).await.expect("Credentials should be stored.");

	assert_eq!(info.refresh.as_ref().map(|secret| secret.expose()), Some("refresh-old"));
	assert!(info.expires_at.is_none());
}

#[tokio::test]
async fn invalid_grant_removes_stored_credentials() {
	let server = MockServer::start_async().await;
	let (manager, secrets) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", JSON)
				.body(r#"{"error":"invalid_grant","error_description":"Unknown or invalid refresh token."}"#);
		})
		.await;
	let err = manager.refresh(&site).await.expect_err("Revoked refresh token should fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
	assert!(err.requires_reauthentication());
	assert!(secrets.is_empty());
}

#[tokio::test]
async fn invalid_client_keeps_stored_credentials() {
	let server = MockServer::start_async().await;
	let (manager, secrets) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401).header("content-type", JSON).body(r#"{"error":"invalid_client"}"#);
		})
		.await;

	let err = manager.refresh(&site).await.expect_err("Bad client credentials should fail.");

	assert!(matches!(err, Error::InvalidClient { .. }));
	assert_eq!(secrets.len(), 1);
}

#[tokio::test]
async fn unavailable_token_endpoint_is_transient_with_retry_hint() {
	let server = MockServer::start_async().await;
	let (manager, secrets) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503)
				.header("content-type", JSON)
				.header("retry-after", "30")
				.body(r#"{"error":"temporarily_unavailable"}"#);
		})
		.await;

	let err = manager.refresh(&site).await.expect_err("Outage should fail the refresh.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(30)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(!secrets.is_empty());
}

#[tokio::test]
async fn concurrent_refreshes_share_one_grant() {
	let server = MockServer::start_async().await;
	let (manager, _) = manager(&server);
	let site = jira_cloud_site("https://acme.atlassian.net/");

	seed(&manager, &site).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", JSON)
				.delay(std::time::Duration::from_millis(50))
				.body(r#"{"access_token":"access-shared","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let (first, second) = tokio::join!(manager.refresh(&site), manager.refresh(&site));

	assert_eq!(first.expect("First refresh should succeed.").expose(), "access-shared");
	assert_eq!(second.expect("Second refresh should reuse the grant.").expose(), "access-shared");

	mock.assert_calls_async(1).await;
}
