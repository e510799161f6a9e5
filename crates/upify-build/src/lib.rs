//! upify build pipeline
//!
//! This crate turns a project source tree into a deployable artifact:
//! filtered staging copy, dependency installation, platform entry
//! adaptation and zip packaging.

pub mod entrypoint;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod packager;
pub mod stager;

pub use entrypoint::{Adaptation, EntrypointAdapter, RenamePlan, rewrite_imports};
pub use error::{BuildError, Result};
pub use installer::{CommandInstaller, DependencyInstaller, Ecosystem};
pub use manifest::{PackageManifest, adapt_for_functions_framework};
pub use packager::{Artifact, ArtifactPackager, INLINE_UPLOAD_LIMIT};
pub use stager::{CopyStats, SourceStager};
