//! upify deploy
//!
//! Runs one deployment end to end inside a scoped workspace:
//! validation, staging, entry adaptation, packaging and convergence
//! on the selected platform.

pub mod error;
pub mod orchestrator;
pub mod workspace;

pub use error::{DeployError, DeployStage, Result};
pub use orchestrator::{Deployment, Orchestrator};
pub use workspace::Workspace;
