//! Calls a Jira Cloud site whose stored access token has expired: the interceptor refreshes it
//! against the token endpoint once and replays the request, so the caller only sees the
//! final response. A local mock server stands in for Jira and the Atlassian token endpoint.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use url::Url;
// self
use atlclient_auth::{
	auth::{AuthInfo, CredentialId, OAuthInfo, Product, Site, SiteId},
	client::SiteClient,
	credential::CredentialManager,
	http::ReqwestTransport,
	provider::{OAuthProvider, ProviderDescriptor},
	store::{CredentialStore, MemoryStore},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Myself {
	account_id: String,
	display_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/rest/api/2/myself").header("authorization", "Bearer expired");
			then.status(401).body("token expired");
		})
		.await;
	let myself = server
		.mock_async(|when, then| {
			when.method(GET).path("/rest/api/2/myself").header("authorization", "Bearer renewed");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accountId":"557058:demo","displayName":"Demo User"}"#);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"renewed","refresh_token":"rotated","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;
	let transport = Arc::new(ReqwestTransport::default());
	let descriptor = ProviderDescriptor::builder(OAuthProvider::JiraCloud)
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.client_id("demo-client")
		.client_secret("demo-secret")
		.build()?;
	let manager = Arc::new(
		CredentialManager::new(Arc::new(MemoryStore::default()), transport.clone())
			.with_descriptor(descriptor),
	);
	let site = Site::new(
		SiteId::new("demo")?,
		Product::Jira,
		Url::parse(&server.url("/"))?,
		CredentialId::new("demo-login")?,
	);

	manager.save(&site, OAuthInfo::new("expired").with_refresh("original")).await?;

	let client = SiteClient::for_site(site.clone(), manager.clone(), transport);
	let me: Myself = client.get_json("rest/api/2/myself", &[]).await?;

	println!("Signed in as {} ({}).", me.display_name, me.account_id);

	if let Some(AuthInfo::OAuth(info)) = manager.auth_info(&site).await? {
		println!(
			"Stored refresh token after rotation: {}.",
			info.refresh.as_ref().map(|secret| secret.expose()).unwrap_or("<none>")
		);
	}

	expired.assert_async().await;
	myself.assert_async().await;
	token.assert_async().await;

	Ok(())
}
