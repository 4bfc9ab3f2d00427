//! Runs the browser authorization dance against a stand-in dancer service and persists the
//! issued tokens to a JSON credential file.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use atlclient_auth::{
	auth::{CredentialId, Product, Site, SiteId},
	credential::CredentialManager,
	dance::{AuthorizationDancer, DancerConfig, WebBrowserLauncher},
	http::ReqwestTransport,
	provider::OAuthProvider,
	store::FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let poll = server
		.mock_async(|when, then| {
			when.method(GET).path("/poll");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access":"dance-access","refresh":"dance-refresh","user":{"id":"557058:demo","displayName":"Demo User"},"accessibleResources":[{"id":"cloud-1","name":"demo","url":"https://demo.atlassian.net"}]}"#,
			);
		})
		.await;
	let transport = Arc::new(ReqwestTransport::default());
	let config = DancerConfig::new(Url::parse(&server.url("/"))?)
		.with_poll_interval(Duration::from_millis(250))
		.with_browser_timeout(Duration::from_secs(30));
	let dancer = AuthorizationDancer::new(config, transport.clone(), WebBrowserLauncher);
	let payload = dancer.start_authorization(OAuthProvider::JiraCloud).await?;

	poll.assert_async().await;

	let store = Arc::new(FileStore::open(std::env::temp_dir().join("atlclient-auth-demo.json"))?);
	let manager = CredentialManager::new(store.clone(), transport);

	for resource in &payload.accessible_resources {
		let Some(base) = resource.url.as_deref() else {
			continue;
		};
		let site = Site::new(
			SiteId::new(&resource.id)?,
			Product::Jira,
			Url::parse(base)?,
			CredentialId::new("demo-login")?,
		);

		println!("Authorized {} at {}.", resource.name, site.base_api_url);

		manager.save(&site, payload.clone().into_auth_info()).await?;
	}

	println!("Credentials written to {}.", store.path().display());

	Ok(())
}
