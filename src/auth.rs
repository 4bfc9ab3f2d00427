//! Site identities, credential shapes, and redacted secrets.

pub mod id;
pub mod info;
mod secret;
pub mod site;

pub use id::*;
pub use info::*;
pub use secret::*;
pub use site::*;
