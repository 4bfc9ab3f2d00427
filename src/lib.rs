//! Credential interceptors for Jira and Bitbucket API clients.
//!
//! Requests flow through an [`AuthorizedClient`](client::AuthorizedClient) whose interceptor
//! attaches Basic or OAuth bearer credentials. Expired bearer tokens are refreshed once per
//! burst of `401` responses and the affected requests are replayed transparently. The
//! [`dance`] module mints the first token through the hosted browser authorization flow.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod credential;
pub mod dance;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
