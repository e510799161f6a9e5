//! GCP Cloud Functions platform for upify
//!
//! Stages the archive in a temporary Cloud Storage bucket, creates or
//! updates a 2nd gen function and grants `allUsers` the Cloud Run invoker
//! role on its backing service.
//!
//! Authentication uses an OAuth access token from
//! `GOOGLE_OAUTH_ACCESS_TOKEN` or `gcloud auth print-access-token`.

pub mod api;
pub mod error;
pub mod platform;
pub mod rest;
pub mod token;

pub use api::{CloudFunction, FunctionsApi, IamPolicy, Operation, RunApi, StorageApi};
pub use error::GcpError;
pub use platform::{CloudFunctionsPlatform, OPERATION_POLL};
pub use rest::RestClient;
pub use token::resolve_access_token;
