//! upify cloud abstraction
//!
//! Platform-neutral pieces of a deployment: the [`FunctionPlatform`]
//! capability trait implemented by each provider crate, the [`Converger`]
//! that drives it probe-first, and bounded polling.
//!
//! # Providers
//!
//! - **AWS Lambda**: `upify-cloud-aws` (inline zip upload, Function URL)
//! - **GCP Cloud Functions**: `upify-cloud-gcp` (Cloud Storage staging, Cloud Run invoker)

pub mod converger;
pub mod error;
pub mod platform;
pub mod poll;

pub use converger::{ConnectorStage, Convergence, Converger, FunctionState, StageError};
pub use error::{CloudError, Result};
pub use platform::{CodeSource, Endpoint, FunctionPlatform, FunctionSpec, Identity, RemoteFunction};
pub use poll::{PollPolicy, PollStatus};
