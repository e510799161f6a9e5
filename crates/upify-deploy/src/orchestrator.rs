//! デプロイパイプライン
//!
//! 検証 → ハンドラ確認 → 環境変数 → ワークスペース → ステージング →
//! エントリ適合 → アーカイブ → プラットフォームへの収束 を順に実行する。
//! どこで失敗してもワークスペースは削除される。

use crate::error::{DeployError, DeployStage, Result};
use crate::workspace::Workspace;
use std::path::Path;
use tracing::{debug, info};
use upify_build::{
    ArtifactPackager, DependencyInstaller, Ecosystem, EntrypointAdapter, SourceStager,
    adapt_for_functions_framework,
};
use upify_cloud::{Converger, FunctionPlatform, FunctionSpec};
use upify_core::{ConfigError, DeploymentConfig, EnvironmentSet, Platform};

/// デプロイ結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub resource_name: String,
    pub platform: Platform,
    pub invocation_url: String,
    /// 今回の実行で関数を新規作成したか
    pub created: bool,
}

type ProgressFn<'a> = Box<dyn Fn(DeployStage) + Send + Sync + 'a>;

/// プラットフォーム設定のうち関数定義に使う値
struct RuntimeSettings {
    runtime: String,
    memory_mb: Option<u32>,
    timeout_secs: Option<u32>,
}

fn runtime_settings(config: &DeploymentConfig, platform: Platform) -> upify_core::Result<RuntimeSettings> {
    Ok(match platform {
        Platform::AwsLambda => {
            let cfg = config.aws_lambda()?;
            RuntimeSettings {
                runtime: cfg.runtime.clone(),
                memory_mb: cfg.memory,
                timeout_secs: cfg.timeout,
            }
        }
        Platform::GcpCloudRun => {
            let cfg = config.gcp_cloudrun()?;
            RuntimeSettings {
                runtime: cfg.runtime.clone(),
                memory_mb: cfg.memory,
                timeout_secs: cfg.timeout,
            }
        }
    })
}

pub struct Orchestrator<'a> {
    installer: &'a dyn DependencyInstaller,
    platform: &'a dyn FunctionPlatform,
    stager: SourceStager,
    packager: ArtifactPackager,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(installer: &'a dyn DependencyInstaller, platform: &'a dyn FunctionPlatform) -> Self {
        Self {
            installer,
            platform,
            stager: SourceStager::new(),
            packager: ArtifactPackager::new(),
            progress: None,
        }
    }

    /// 各段階の開始時に呼ばれるコールバックを設定
    pub fn with_progress(mut self, progress: impl Fn(DeployStage) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn enter(&self, stage: DeployStage) {
        debug!(stage = %stage, "Entering stage");
        if let Some(progress) = &self.progress {
            progress(stage);
        }
    }

    pub async fn deploy(&self, project_root: &Path, config: &DeploymentConfig) -> Result<Deployment> {
        let platform = self.platform.platform();
        let language = config.language;

        // 1. 設定の検証
        self.enter(DeployStage::Validate);
        config
            .validate_for(platform)
            .map_err(DeployError::config(DeployStage::Validate))?;
        let settings =
            runtime_settings(config, platform).map_err(DeployError::config(DeployStage::Validate))?;

        // 2. ハンドララッパーの確認
        self.enter(DeployStage::VerifyHandler);
        let handler = project_root.join(language.handler_file_name());
        if !handler.is_file() {
            return Err(DeployError::Config {
                stage: DeployStage::VerifyHandler,
                source: ConfigError::HandlerNotFound(handler),
            });
        }

        // 3. 環境変数
        self.enter(DeployStage::LoadEnvironment);
        let environment = EnvironmentSet::load(project_root)
            .map_err(DeployError::config(DeployStage::LoadEnvironment))?
            .with_platform(platform);
        debug!(variables = environment.len(), "Environment prepared");

        // 4. ワークスペース（drop で削除）
        self.enter(DeployStage::Workspace);
        let workspace = Workspace::new().map_err(DeployError::Workspace)?;
        let source_dir = workspace.source_dir();

        // 5. ステージング
        self.enter(DeployStage::Stage);
        let ecosystem = Ecosystem::new(language, config.package_manager)
            .with_adapters(platform.adapter_packages(language).iter().copied());
        let install = platform.installs_locally().then_some(&ecosystem);
        let stats = self
            .stager
            .stage(project_root, &source_dir, self.installer, install)
            .await
            .map_err(DeployError::build(DeployStage::Stage))?;
        info!(files = stats.files, dirs = stats.dirs, "Source staged");

        // 6. エントリポイントの適合
        self.enter(DeployStage::Adapt);
        let adaptation = EntrypointAdapter::for_platform(platform, language)
            .adapt(&source_dir)
            .map_err(DeployError::build(DeployStage::Adapt))?;
        debug!(adaptation = ?adaptation, "Entrypoint adapted");
        if platform == Platform::GcpCloudRun && language.is_node() {
            adapt_for_functions_framework(&source_dir, &ecosystem)
                .map_err(DeployError::build(DeployStage::Adapt))?;
        }

        // 7. アーカイブ
        self.enter(DeployStage::Package);
        let artifact = self
            .packager
            .package_async(&source_dir, &workspace.artifact_path())
            .await
            .map_err(DeployError::build(DeployStage::Package))?;
        info!(entries = artifact.entries, size = artifact.size, "Archive created");

        // 8. プラットフォームへの収束
        self.enter(DeployStage::Deploy);
        let spec = FunctionSpec::new(&config.name, settings.runtime)
            .with_environment(environment)
            .with_memory(settings.memory_mb)
            .with_timeout(settings.timeout_secs);

        let convergence = Converger::new(self.platform)
            .converge(&spec, &artifact.path)
            .await
            .map_err(|source| DeployError::Connector { platform, source })?;

        info!(
            function = %convergence.function_name,
            url = %convergence.endpoint.url,
            created = convergence.created,
            "Deployment completed"
        );

        Ok(Deployment {
            resource_name: convergence.function_name,
            platform,
            invocation_url: convergence.endpoint.url,
            created: convergence.created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use upify_build::BuildError;
    use upify_cloud::{
        CloudError, CodeSource, Endpoint, Identity, RemoteFunction, Result as CloudResult,
    };
    use upify_core::{AwsLambdaConfig, GcpCloudRunConfig, Language, PackageManager};

    #[derive(Default)]
    struct FakeInstaller {
        ecosystems: Mutex<Vec<Ecosystem>>,
        fail: bool,
    }

    #[async_trait]
    impl DependencyInstaller for FakeInstaller {
        async fn install_dependencies(
            &self,
            workspace: &Path,
            ecosystem: &Ecosystem,
        ) -> upify_build::Result<()> {
            self.ecosystems.lock().unwrap().push(ecosystem.clone());
            // 依存ライブラリがワークスペースに入ったことを模す
            for package in &ecosystem.adapter_packages {
                fs::create_dir_all(workspace.join(package)).unwrap();
            }
            Ok(())
        }

        async fn run_build_script(
            &self,
            _workspace: &Path,
            ecosystem: &Ecosystem,
        ) -> upify_build::Result<()> {
            if self.fail {
                return Err(BuildError::BuildScriptFailed {
                    command: ecosystem.build_command().to_string(),
                    stderr: "error TS2304".to_string(),
                });
            }
            Ok(())
        }
    }

    struct FakePlatform {
        platform: Platform,
        entries: Mutex<BTreeSet<String>>,
        manifest: Mutex<Option<serde_json::Value>>,
        spec: Mutex<Option<FunctionSpec>>,
        artifact: Mutex<Option<PathBuf>>,
    }

    impl FakePlatform {
        fn new(platform: Platform) -> Self {
            Self {
                platform,
                entries: Mutex::default(),
                manifest: Mutex::default(),
                spec: Mutex::default(),
                artifact: Mutex::default(),
            }
        }

        fn entries(&self) -> BTreeSet<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FunctionPlatform for FakePlatform {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn stage_code(&self, spec: &FunctionSpec, artifact: &Path) -> CloudResult<CodeSource> {
            let mut archive = zip::ZipArchive::new(fs::File::open(artifact)?)
                .map_err(|e| CloudError::api("ReadArchive", e))?;
            let mut entries = BTreeSet::new();
            for i in 0..archive.len() {
                let mut file = archive
                    .by_index(i)
                    .map_err(|e| CloudError::api("ReadArchive", e))?;
                if file.name() == "package.json" {
                    let value: serde_json::Value = serde_json::from_reader(&mut file)?;
                    *self.manifest.lock().unwrap() = Some(value);
                }
                entries.insert(file.name().to_string());
            }
            *self.entries.lock().unwrap() = entries;
            *self.spec.lock().unwrap() = Some(spec.clone());
            *self.artifact.lock().unwrap() = Some(artifact.to_path_buf());
            Ok(CodeSource::Inline(Vec::new()))
        }

        async fn probe(&self, _name: &str) -> CloudResult<Option<RemoteFunction>> {
            Ok(None)
        }

        async fn create_function(
            &self,
            spec: &FunctionSpec,
            _code: &CodeSource,
            _identity: Option<&Identity>,
        ) -> CloudResult<RemoteFunction> {
            Ok(RemoteFunction {
                name: spec.name.clone(),
                id: spec.name.clone(),
            })
        }

        async fn update_function(
            &self,
            _spec: &FunctionSpec,
            _code: &CodeSource,
            _existing: &RemoteFunction,
        ) -> CloudResult<()> {
            Ok(())
        }

        async fn expose_publicly(&self, _name: &str) -> CloudResult<()> {
            Ok(())
        }

        async fn ensure_endpoint(&self, name: &str) -> CloudResult<Endpoint> {
            Ok(Endpoint {
                url: format!("https://{}.example.test/", name),
                created: true,
            })
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(language: Language, package_manager: PackageManager) -> DeploymentConfig {
        DeploymentConfig {
            name: "demo".to_string(),
            framework: None,
            language,
            package_manager,
            entrypoint: None,
            app_var: None,
            aws_lambda: Some(AwsLambdaConfig {
                region: "us-east-1".to_string(),
                role_name: "demo-role".to_string(),
                runtime: "python3.12".to_string(),
                memory: Some(256),
                timeout: None,
            }),
            gcp_cloudrun: Some(GcpCloudRunConfig {
                region: "us-central1".to_string(),
                project_id: "demo-project".to_string(),
                runtime: "python312".to_string(),
                memory: None,
                timeout: None,
            }),
        }
    }

    fn python_project() -> tempfile::TempDir {
        let project = tempdir().unwrap();
        write(project.path(), "main.py", "app = object()\n");
        write(
            project.path(),
            "upify_handler.py",
            "from main import app\n\ndef handler(event, context):\n    return app\n",
        );
        write(project.path(), "requirements.txt", "requests\n");
        write(project.path(), ".git/HEAD", "ref: main\n");
        write(project.path(), ".upify/.env", "API_KEY=abc\n");
        project
    }

    #[tokio::test]
    async fn test_aws_python_deploy() {
        let project = python_project();
        let installer = FakeInstaller::default();
        let platform = FakePlatform::new(Platform::AwsLambda);
        let stages = Mutex::new(Vec::new());

        let deployment = Orchestrator::new(&installer, &platform)
            .with_progress(|stage| stages.lock().unwrap().push(stage))
            .deploy(project.path(), &config(Language::Python, PackageManager::Pip))
            .await
            .unwrap();

        assert_eq!(deployment.resource_name, "demo");
        assert_eq!(deployment.invocation_url, "https://demo.example.test/");
        assert!(deployment.created);

        let ecosystems = installer.ecosystems.lock().unwrap();
        assert_eq!(ecosystems[0].adapter_packages, vec!["flask", "apig-wsgi"]);

        let entries = platform.entries();
        assert!(entries.contains("upify_handler.py"));
        assert!(entries.contains("main.py"));
        assert!(entries.contains("flask/"));
        assert!(!entries.iter().any(|e| e.starts_with(".git") || e.starts_with(".upify")));

        let spec = platform.spec.lock().unwrap().clone().unwrap();
        assert_eq!(spec.runtime, "python3.12");
        assert_eq!(spec.memory_mb, Some(256));
        assert_eq!(spec.environment.get("API_KEY"), Some("abc"));
        assert_eq!(spec.environment.get("UPIFY_DEPLOY_PLATFORM"), Some("aws-lambda"));

        assert_eq!(stages.lock().unwrap().last(), Some(&DeployStage::Deploy));

        // ワークスペースは削除済み
        let artifact = platform.artifact.lock().unwrap().clone().unwrap();
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_gcp_python_adapts_entrypoint_without_install() {
        let project = python_project();
        let installer = FakeInstaller::default();
        let platform = FakePlatform::new(Platform::GcpCloudRun);

        Orchestrator::new(&installer, &platform)
            .deploy(project.path(), &config(Language::Python, PackageManager::Pip))
            .await
            .unwrap();

        assert!(installer.ecosystems.lock().unwrap().is_empty());

        let entries = platform.entries();
        assert!(entries.contains("main.py"));
        assert!(entries.contains("_main.py"));
        assert!(!entries.contains("upify_handler.py"));

        // 元のプロジェクトは変更されない
        assert!(project.path().join("upify_handler.py").exists());
        assert_eq!(
            fs::read_to_string(project.path().join("main.py")).unwrap(),
            "app = object()\n"
        );
    }

    #[tokio::test]
    async fn test_gcp_node_manifest_is_adapted() {
        let project = tempdir().unwrap();
        write(project.path(), "upify_handler.js", "exports.handler = () => {};\n");
        write(
            project.path(),
            "package.json",
            r#"{"name":"demo","scripts":{"build":"tsc"}}"#,
        );
        write(project.path(), "package-lock.json", "{}");
        let installer = FakeInstaller::default();
        let platform = FakePlatform::new(Platform::GcpCloudRun);

        Orchestrator::new(&installer, &platform)
            .deploy(project.path(), &config(Language::TypeScript, PackageManager::Npm))
            .await
            .unwrap();

        assert!(!platform.entries().contains("package-lock.json"));
        let manifest = platform.manifest.lock().unwrap().clone().unwrap();
        assert_eq!(manifest["main"], "upify_handler.js");
        assert_eq!(manifest["scripts"]["gcp-build"], "npm run build");
    }

    #[tokio::test]
    async fn test_missing_handler_stops_before_staging() {
        let project = tempdir().unwrap();
        write(project.path(), "main.py", "app = 1\n");
        let installer = FakeInstaller::default();
        let platform = FakePlatform::new(Platform::AwsLambda);

        let err = Orchestrator::new(&installer, &platform)
            .deploy(project.path(), &config(Language::Python, PackageManager::Pip))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), DeployStage::VerifyHandler);
        assert!(matches!(
            err,
            DeployError::Config {
                source: ConfigError::HandlerNotFound(_),
                ..
            }
        ));
        assert!(platform.spec.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_platform_section() {
        let project = python_project();
        let installer = FakeInstaller::default();
        let platform = FakePlatform::new(Platform::AwsLambda);
        let mut config = config(Language::Python, PackageManager::Pip);
        config.aws_lambda = None;

        let err = Orchestrator::new(&installer, &platform)
            .deploy(project.path(), &config)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), DeployStage::Validate);
    }

    #[tokio::test]
    async fn test_build_failure_aborts_deploy() {
        let project = tempdir().unwrap();
        write(project.path(), "upify_handler.js", "module.exports = {};\n");
        write(
            project.path(),
            "package.json",
            r#"{"name":"demo","scripts":{"build":"tsc"}}"#,
        );
        let installer = FakeInstaller {
            fail: true,
            ..Default::default()
        };
        let platform = FakePlatform::new(Platform::AwsLambda);

        let err = Orchestrator::new(&installer, &platform)
            .deploy(project.path(), &config(Language::TypeScript, PackageManager::Npm))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), DeployStage::Stage);
        assert!(err.user_message().contains("npm run build"));
        assert!(platform.spec.lock().unwrap().is_none());
    }
}
