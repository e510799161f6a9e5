//! Probe-first convergence of a remote function
//!
//! ```text
//! stage_code → probe ─┬─ absent ─→ bootstrap_identity → create_function ─┐
//!                     └─ present → update_function ──────────────────────┤
//!                                                                         ▼
//!                          release_code → expose_publicly → ensure_endpoint
//! ```

use crate::error::CloudError;
use crate::platform::{CodeSource, Endpoint, FunctionPlatform, FunctionSpec};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Lifecycle state of the remote function during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionState {
    Absent,
    Creating,
    Active,
    Updating,
    Ready,
}

/// Connector step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStage {
    StageCode,
    Probe,
    BootstrapIdentity,
    CreateFunction,
    UpdateFunction,
    ReleaseCode,
    ExposePublicly,
    EnsureEndpoint,
}

impl ConnectorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorStage::StageCode => "stage code",
            ConnectorStage::Probe => "probe function",
            ConnectorStage::BootstrapIdentity => "bootstrap identity",
            ConnectorStage::CreateFunction => "create function",
            ConnectorStage::UpdateFunction => "update function",
            ConnectorStage::ReleaseCode => "release staged code",
            ConnectorStage::ExposePublicly => "expose publicly",
            ConnectorStage::EnsureEndpoint => "ensure endpoint",
        }
    }
}

impl fmt::Display for ConnectorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connector failure tagged with the step it happened in
#[derive(Debug, Error)]
#[error("Failed to {stage}: {source}")]
pub struct StageError {
    pub stage: ConnectorStage,
    #[source]
    pub source: CloudError,
}

trait StageContext<T> {
    fn at(self, stage: ConnectorStage) -> Result<T, StageError>;
}

impl<T> StageContext<T> for crate::error::Result<T> {
    fn at(self, stage: ConnectorStage) -> Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// Result of a successful convergence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub function_name: String,
    /// True when the function did not exist before this run
    pub created: bool,
    pub endpoint: Endpoint,
    pub state: FunctionState,
}

/// Drives a [`FunctionPlatform`] through the convergence protocol
pub struct Converger<'a> {
    platform: &'a dyn FunctionPlatform,
}

impl<'a> Converger<'a> {
    pub fn new(platform: &'a dyn FunctionPlatform) -> Self {
        Self { platform }
    }

    pub async fn converge(
        &self,
        spec: &FunctionSpec,
        artifact: &Path,
    ) -> Result<Convergence, StageError> {
        let platform = self.platform.platform();

        let code = self
            .platform
            .stage_code(spec, artifact)
            .await
            .at(ConnectorStage::StageCode)?;
        debug!(platform = %platform, source = source_label(&code), "Code staged");

        let existing = self
            .platform
            .probe(&spec.name)
            .await
            .at(ConnectorStage::Probe)?;

        let (created, mut state) = match existing {
            None => {
                let mut state = FunctionState::Absent;
                transition(&mut state, FunctionState::Creating, &spec.name);

                let identity = self
                    .platform
                    .bootstrap_identity()
                    .await
                    .at(ConnectorStage::BootstrapIdentity)?;
                if let Some(identity) = &identity {
                    debug!(identity = %identity.id, created = identity.created, "Identity ready");
                }

                info!(function = %spec.name, "Creating function");
                self.platform
                    .create_function(spec, &code, identity.as_ref())
                    .await
                    .at(ConnectorStage::CreateFunction)?;

                transition(&mut state, FunctionState::Active, &spec.name);
                (true, state)
            }
            Some(remote) => {
                let mut state = FunctionState::Updating;
                info!(function = %spec.name, id = %remote.id, "Updating existing function");
                self.platform
                    .update_function(spec, &code, &remote)
                    .await
                    .at(ConnectorStage::UpdateFunction)?;

                transition(&mut state, FunctionState::Ready, &spec.name);
                (false, state)
            }
        };

        self.platform
            .release_code(&code)
            .await
            .at(ConnectorStage::ReleaseCode)?;

        match self.platform.expose_publicly(&spec.name).await {
            Ok(()) => info!(function = %spec.name, "Public access granted"),
            Err(CloudError::PermissionConflict(detail)) => {
                debug!(function = %spec.name, detail = %detail, "Public access already granted");
            }
            Err(source) => {
                return Err(StageError {
                    stage: ConnectorStage::ExposePublicly,
                    source,
                });
            }
        }

        let endpoint = self
            .platform
            .ensure_endpoint(&spec.name)
            .await
            .at(ConnectorStage::EnsureEndpoint)?;

        if state == FunctionState::Active {
            transition(&mut state, FunctionState::Ready, &spec.name);
        }

        Ok(Convergence {
            function_name: spec.name.clone(),
            created,
            endpoint,
            state,
        })
    }
}

fn transition(state: &mut FunctionState, next: FunctionState, name: &str) {
    debug!(function = %name, from = ?*state, to = ?next, "State transition");
    *state = next;
}

fn source_label(code: &CodeSource) -> &'static str {
    match code {
        CodeSource::Inline(_) => "inline",
        CodeSource::Storage { .. } => "storage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::platform::{Identity, RemoteFunction};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use upify_core::Platform;

    #[derive(Default)]
    struct FakePlatform {
        exists: bool,
        permission_conflict: bool,
        fail_update: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakePlatform {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FunctionPlatform for FakePlatform {
        fn platform(&self) -> Platform {
            Platform::AwsLambda
        }

        async fn stage_code(&self, _spec: &FunctionSpec, _artifact: &Path) -> Result<CodeSource> {
            self.record("stage_code");
            Ok(CodeSource::Inline(vec![1, 2, 3]))
        }

        async fn probe(&self, name: &str) -> Result<Option<RemoteFunction>> {
            self.record("probe");
            Ok(self.exists.then(|| RemoteFunction {
                name: name.to_string(),
                id: format!("fake:{}", name),
            }))
        }

        async fn bootstrap_identity(&self) -> Result<Option<Identity>> {
            self.record("bootstrap_identity");
            Ok(Some(Identity {
                id: "role".to_string(),
                created: true,
            }))
        }

        async fn create_function(
            &self,
            spec: &FunctionSpec,
            _code: &CodeSource,
            identity: Option<&Identity>,
        ) -> Result<RemoteFunction> {
            assert!(identity.is_some());
            self.record("create_function");
            Ok(RemoteFunction {
                name: spec.name.clone(),
                id: "new".to_string(),
            })
        }

        async fn update_function(
            &self,
            _spec: &FunctionSpec,
            _code: &CodeSource,
            _existing: &RemoteFunction,
        ) -> Result<()> {
            self.record("update_function");
            if self.fail_update {
                return Err(CloudError::Timeout("code update".to_string()));
            }
            Ok(())
        }

        async fn release_code(&self, _code: &CodeSource) -> Result<()> {
            self.record("release_code");
            Ok(())
        }

        async fn expose_publicly(&self, name: &str) -> Result<()> {
            self.record("expose_publicly");
            if self.permission_conflict {
                return Err(CloudError::PermissionConflict(name.to_string()));
            }
            Ok(())
        }

        async fn ensure_endpoint(&self, name: &str) -> Result<Endpoint> {
            self.record("ensure_endpoint");
            Ok(Endpoint {
                url: format!("https://{}.example.test/", name),
                created: !self.exists,
            })
        }
    }

    fn spec() -> FunctionSpec {
        FunctionSpec::new("demo", "python3.12")
    }

    #[tokio::test]
    async fn test_absent_function_is_created() {
        let platform = FakePlatform::default();
        let result = Converger::new(&platform)
            .converge(&spec(), Path::new("source.zip"))
            .await
            .unwrap();

        assert!(result.created);
        assert_eq!(result.state, FunctionState::Ready);
        assert_eq!(result.endpoint.url, "https://demo.example.test/");
        assert_eq!(
            platform.calls(),
            vec![
                "stage_code",
                "probe",
                "bootstrap_identity",
                "create_function",
                "release_code",
                "expose_publicly",
                "ensure_endpoint",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_function_is_updated_without_identity() {
        let platform = FakePlatform {
            exists: true,
            permission_conflict: true,
            ..Default::default()
        };
        let result = Converger::new(&platform)
            .converge(&spec(), Path::new("source.zip"))
            .await
            .unwrap();

        assert!(!result.created);
        assert!(!platform.calls().contains(&"bootstrap_identity"));
        assert!(!platform.calls().contains(&"create_function"));
        assert!(platform.calls().contains(&"update_function"));
        assert!(platform.calls().contains(&"ensure_endpoint"));
    }

    #[tokio::test]
    async fn test_update_failure_names_stage() {
        let platform = FakePlatform {
            exists: true,
            fail_update: true,
            ..Default::default()
        };
        let err = Converger::new(&platform)
            .converge(&spec(), Path::new("source.zip"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, ConnectorStage::UpdateFunction);
        assert!(matches!(err.source, CloudError::Timeout(_)));
        assert!(err.to_string().starts_with("Failed to update function"));
        assert!(!platform.calls().contains(&"expose_publicly"));
    }
}
