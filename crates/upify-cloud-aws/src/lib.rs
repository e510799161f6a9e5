//! AWS Lambda platform for upify
//!
//! Uploads the archive inline, creates or updates the function, opens a
//! public Function URL and returns its address.

pub mod api;
mod error;
pub mod platform;
pub mod role;
pub mod sdk;

pub use api::{HANDLER, IamApi, LambdaApi, UpdateStatus};
pub use platform::{CODE_UPDATE_POLL, LambdaPlatform};
pub use role::{ROLE_SETTLE_DELAY, ensure_role};
