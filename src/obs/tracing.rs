// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Span around one refresh, replay, or dance, labeled with the site or provider it serves.
///
/// [`observe`](Self::observe) records the attempt, runs the flow inside the span, and then
/// reports the outcome to the span, the flow counter, and the duration histogram.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span for `kind` entered from `stage` on behalf of `subject`.
	pub fn new(kind: FlowKind, stage: &'static str, subject: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"atlclient_auth.flow",
				flow = kind.as_str(),
				stage,
				subject,
				outcome = tracing::field::Empty,
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, subject);

			Self { kind }
		}
	}

	/// Returns the flow kind.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Runs `flow` inside the span and records its outcome.
	pub async fn observe<F, T>(self, flow: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let started = Instant::now();

		obs::record_flow_outcome(self.kind, FlowOutcome::Attempt);

		#[cfg(feature = "tracing")]
		let result = {
			use tracing::Instrument;

			flow.instrument(self.span.clone()).await
		};
		#[cfg(not(feature = "tracing"))]
		let result = flow.await;
		let outcome = FlowOutcome::of(&result);

		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());

		obs::record_flow_outcome(self.kind, outcome);
		obs::record_flow_duration(self.kind, started.elapsed());

		result
	}
}
