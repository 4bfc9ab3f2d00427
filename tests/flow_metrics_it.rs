#![cfg(feature = "metrics")]

mod support;

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use metrics::{
	Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use oauth2::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use parking_lot::Mutex;
// self
use atlclient_auth::{
	auth::OAuthInfo,
	client::AuthorizedClient,
	credential::CredentialManager,
	http::{ApiRequest, ApiResponse, RequestTransport, TransportFuture},
	interceptor::OAuthInterceptor,
	provider::{OAuthProvider, ProviderDescriptor},
	store::{CredentialStore, MemoryStore},
};
use support::*;

type Tallies = Arc<Mutex<HashMap<String, u64>>>;

/// Recorder keeping `name{label=value,..}` totals for every counter it hands out.
#[derive(Default)]
struct CounterTally(Tallies);
impl CounterTally {
	fn get(&self, key: &str) -> u64 {
		self.0.lock().get(key).copied().unwrap_or_default()
	}
}
impl Recorder for CounterTally {
	fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

	fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

	fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

	fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
		let labels = key
			.labels()
			.map(|label| format!("{}={}", label.key(), label.value()))
			.collect::<Vec<_>>()
			.join(",");

		Counter::from_arc(Arc::new(Slot {
			name: format!("{}{{{labels}}}", key.name()),
			tallies: self.0.clone(),
		}))
	}

	fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
		Gauge::noop()
	}

	fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
		Histogram::noop()
	}
}

struct Slot {
	name: String,
	tallies: Tallies,
}
impl CounterFn for Slot {
	fn increment(&self, value: u64) {
		*self.tallies.lock().entry(self.name.clone()).or_default() += value;
	}

	fn absolute(&self, value: u64) {
		self.tallies.lock().insert(self.name.clone(), value);
	}
}

/// Serves the Atlassian token endpoint and a Jira API that only accepts `access-new`.
struct AtlassianDouble;
impl RequestTransport for AtlassianDouble {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let mut response = if request.url.path() == "/oauth/token" {
			ApiResponse::new(
				StatusCode::OK,
				r#"{"access_token":"access-new","token_type":"bearer","expires_in":3600}"#,
			)
		} else if request.authorization() == Some("Bearer access-new") {
			ApiResponse::new(StatusCode::OK, r#"{"accountId":"557058:ada"}"#)
		} else {
			ApiResponse::new(StatusCode::UNAUTHORIZED, "token expired")
		};

		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Box::pin(async move { Ok(response) })
	}
}

#[test]
fn one_refresh_is_counted_once_per_flow() {
	let tally = CounterTally::default();
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_time()
		.build()
		.expect("Test runtime should build.");

	metrics::with_local_recorder(&tally, || {
		runtime.block_on(async {
			let transport = Arc::new(AtlassianDouble);
			let descriptor = ProviderDescriptor::builder(OAuthProvider::JiraCloud)
				.client_id("client-jira")
				.build()
				.expect("Default Jira Cloud descriptor should build.");
			let manager = Arc::new(
				CredentialManager::new(Arc::new(MemoryStore::default()), transport.clone())
					.with_descriptor(descriptor),
			);
			let site = jira_cloud_site("https://acme.atlassian.net/");

			manager
				.save(&site, OAuthInfo::new("access-old").with_refresh("refresh-old"))
				.await
				.expect("Seeding OAuth credentials should succeed.");

			let interceptor =
				Arc::new(OAuthInterceptor::new(site, manager as Arc<dyn CredentialStore>));
			let client = AuthorizedClient::new(transport, interceptor);
			let response = client
				.send(get("https://acme.atlassian.net/rest/api/2/myself"))
				.await
				.expect("Replayed request should succeed.");

			assert!(response.is_success());
		})
	});

	for (key, expected) in [
		("atlclient_auth_flow_total{flow=refresh,outcome=attempt}", 1),
		("atlclient_auth_flow_total{flow=refresh,outcome=success}", 1),
		("atlclient_auth_flow_total{flow=grant,outcome=attempt}", 1),
		("atlclient_auth_flow_total{flow=grant,outcome=success}", 1),
		("atlclient_auth_flow_total{flow=replay,outcome=attempt}", 1),
	] {
		assert_eq!(tally.get(key), expected, "{key}");
	}
}
