//! Optional observability helpers for refresh, replay, and authorization flows.
//!
//! # Feature Flags
//!
//! - `tracing` wraps every flow in an `atlclient_auth.flow` span carrying `flow`, `stage`,
//!   `subject` (site or provider) and, once finished, `outcome`. The interceptor's refresh and
//!   the credential manager's token grant are separate flows. Debug events mark 401s, refresh
//!   waits, supersessions, and empty polls.
//! - `metrics` counts `atlclient_auth_flow_total{flow, outcome}` and records
//!   `atlclient_auth_flow_duration_seconds{flow}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// `tracing::debug!` behind the `tracing` feature.
macro_rules! flow_debug {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::debug!($($arg)*);
		}
	};
}
pub(crate) use flow_debug;

/// Which flow a span or metric sample belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Access token refresh after a 401, as seen by the interceptor.
	Refresh,
	/// `refresh_token` grant against the provider's token endpoint.
	Grant,
	/// Second send of a request whose credentials were repaired.
	Replay,
	/// Browser authorization dance.
	Dance,
}
impl FlowKind {
	/// Label used for the `flow` span field and metric label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Refresh => "refresh",
			Self::Grant => "grant",
			Self::Replay => "replay",
			Self::Dance => "dance",
		}
	}
}

/// Stage of a flow reported to the `outcome` label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow started.
	Attempt,
	/// The flow finished with a value.
	Success,
	/// The flow finished with an error.
	Failure,
}
impl FlowOutcome {
	/// Maps a finished flow's result to [`Success`](Self::Success) or
	/// [`Failure`](Self::Failure).
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}

	/// Label used for the `outcome` span field and metric label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}

impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
