// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Increments `atlclient_auth_flow_total{flow, outcome}` when the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"atlclient_auth_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long a flow ran in `atlclient_auth_flow_duration_seconds{flow}`.
pub fn record_flow_duration(kind: FlowKind, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("atlclient_auth_flow_duration_seconds", "flow" => kind.as_str())
		.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, elapsed);
}
