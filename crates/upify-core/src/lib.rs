//! upify core
//!
//! Deployment configuration model, `.upify/config.yaml` loading and the
//! environment set handed to the remote function.

pub mod env;
pub mod error;
pub mod loader;
pub mod model;

pub use env::{DEPLOY_PLATFORM_VAR, EnvironmentSet};
pub use error::{ConfigError, Result};
pub use loader::{CONFIG_DIR, config_path, load_config};
pub use model::{
    AwsLambdaConfig, DeploymentConfig, GcpCloudRunConfig, Language, PackageManager, Platform,
};
