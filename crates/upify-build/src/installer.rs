//! 依存関係のインストールとビルドスクリプトの実行
//!
//! パッケージマネージャ (pip / npm / yarn) は外部コマンドとして呼び出すだけで、
//! 中身には関与しない。テストでは [`DependencyInstaller`] を差し替える。

use crate::error::{BuildError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use upify_core::{Language, PackageManager};

/// インストール対象のエコシステム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ecosystem {
    pub language: Language,
    pub package_manager: PackageManager,
    /// ラッパーが必要とするランタイムアダプタ（flask, serverless-http など）
    pub adapter_packages: Vec<String>,
}

impl Ecosystem {
    pub fn new(language: Language, package_manager: PackageManager) -> Self {
        Self {
            language,
            package_manager,
            adapter_packages: Vec::new(),
        }
    }

    pub fn with_adapters<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapter_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    fn uses_yarn(&self) -> bool {
        self.package_manager == PackageManager::Yarn
    }

    /// package.json の build スクリプトを呼ぶコマンド
    pub fn build_command(&self) -> &'static str {
        if self.uses_yarn() {
            "yarn build"
        } else {
            "npm run build"
        }
    }
}

/// 依存関係インストーラのポート
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    /// プロジェクトの依存関係とアダプタパッケージをワークスペースにインストール
    async fn install_dependencies(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()>;

    /// 宣言済みのビルドスクリプトを実行（失敗は致命的）
    async fn run_build_script(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()>;
}

/// 実際のパッケージマネージャを子プロセスとして起動するインストーラ
#[derive(Debug, Default, Clone)]
pub struct CommandInstaller;

impl CommandInstaller {
    pub fn new() -> Self {
        Self
    }

    /// コマンドを実行し、失敗時は stderr を含めて返す
    async fn run_command(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<String> {
        let command_line = format!("{} {}", program, args.join(" "));
        tracing::debug!(cwd = %cwd.display(), "Running: {}", command_line);

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BuildError::CommandFailed {
                command: command_line.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::CommandFailed {
                command: command_line,
                stderr: stderr.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn install_python(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()> {
        let target = workspace.to_string_lossy().to_string();

        if workspace.join("requirements.txt").exists() {
            tracing::info!("Installing requirements.txt dependencies");
            self.run_command(
                workspace,
                "pip",
                &["install", "-r", "requirements.txt", "-t", &target],
            )
            .await?;
        } else {
            tracing::info!("No requirements.txt found; skipping installation");
        }

        for library in &ecosystem.adapter_packages {
            if python_library_installed(workspace, library) {
                tracing::info!(library = %library, "Library already installed, skipping");
                continue;
            }
            tracing::info!(library = %library, "Installing library");
            self.run_command(workspace, "pip", &["install", library.as_str(), "-t", &target])
                .await?;
        }

        Ok(())
    }

    async fn install_node(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()> {
        let program = if ecosystem.uses_yarn() { "yarn" } else { "npm" };

        tracing::info!("Installing package.json dependencies");
        self.run_command(workspace, program, &["install", "--production"])
            .await?;

        for package in &ecosystem.adapter_packages {
            if self.node_package_installed(workspace, ecosystem, package).await {
                continue;
            }
            tracing::info!(package = %package, "Installing package");
            let args: [&str; 3] = if ecosystem.uses_yarn() {
                ["add", package.as_str(), "--save"]
            } else {
                ["install", package.as_str(), "--save"]
            };
            self.run_command(workspace, program, &args).await?;
        }

        Ok(())
    }

    async fn node_package_installed(
        &self,
        workspace: &Path,
        ecosystem: &Ecosystem,
        package: &str,
    ) -> bool {
        let result = if ecosystem.uses_yarn() {
            self.run_command(workspace, "yarn", &["list", "--pattern", package])
                .await
        } else {
            self.run_command(workspace, "npm", &["list", package, "--depth=0"])
                .await
        };
        result.is_ok()
    }
}

#[async_trait]
impl DependencyInstaller for CommandInstaller {
    async fn install_dependencies(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()> {
        match ecosystem.language {
            Language::Python => self.install_python(workspace, ecosystem).await,
            Language::JavaScript | Language::TypeScript => {
                self.install_node(workspace, ecosystem).await
            }
        }
    }

    async fn run_build_script(&self, workspace: &Path, ecosystem: &Ecosystem) -> Result<()> {
        let command = ecosystem.build_command();
        tracing::info!("Building Node.js project: {}", command);

        let mut parts = command.split_whitespace();
        let program = parts.next().unwrap_or("npm");
        let args: Vec<&str> = parts.collect();

        self.run_command(workspace, program, &args)
            .await
            .map_err(|e| match e {
                BuildError::CommandFailed { command, stderr } => {
                    BuildError::BuildScriptFailed { command, stderr }
                }
                other => other,
            })?;

        tracing::info!("Successfully built Node.js project");
        Ok(())
    }
}

/// `<ws>/<lib>` または `<ws>/<lib>.egg-info` があればインストール済みとみなす
fn python_library_installed(workspace: &Path, library: &str) -> bool {
    let module = library.replace('-', "_");
    [
        workspace.join(library),
        workspace.join(&module),
        workspace.join(format!("{}.egg-info", library)),
        workspace.join(format!("{}.egg-info", module)),
    ]
    .iter()
    .any(|p| p.exists())
}
