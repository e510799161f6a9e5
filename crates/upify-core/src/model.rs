//! デプロイ設定のデータモデル

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ソース言語
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    /// プラットフォーム共通のハンドララッパーのファイル名
    pub fn handler_file_name(&self) -> &'static str {
        match self {
            Language::Python => "upify_handler.py",
            Language::JavaScript | Language::TypeScript => "upify_handler.js",
        }
    }

    /// ハンドラと並んで生成されるメインファイルのファイル名
    pub fn main_file_name(&self) -> &'static str {
        match self {
            Language::Python => "upify_main.py",
            Language::JavaScript | Language::TypeScript => "upify_main.js",
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::TypeScript => write!(f, "typescript"),
        }
    }
}

/// パッケージマネージャ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Pip,
    Npm,
    Yarn,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Pip => write!(f, "pip"),
            PackageManager::Npm => write!(f, "npm"),
            PackageManager::Yarn => write!(f, "yarn"),
        }
    }
}

/// デプロイ先プラットフォーム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// AWS Lambda（コードを直接アップロード）
    AwsLambda,
    /// GCP Cloud Functions / Cloud Run（Cloud Storage 経由でソースを渡す）
    GcpCloudRun,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::AwsLambda, Platform::GcpCloudRun];

    /// CLI で指定する短い名前
    pub fn cli_name(&self) -> &'static str {
        match self {
            Platform::AwsLambda => "aws",
            Platform::GcpCloudRun => "gcp",
        }
    }

    /// `UPIFY_DEPLOY_PLATFORM` に注入される識別子（設定ファイルのキーと同じ）
    pub fn deploy_id(&self) -> &'static str {
        match self {
            Platform::AwsLambda => "aws-lambda",
            Platform::GcpCloudRun => "gcp-cloudrun",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::AwsLambda => "AWS Lambda",
            Platform::GcpCloudRun => "GCP Cloud Run",
        }
    }

    /// 依存関係をローカルのワークスペースにインストールするか
    ///
    /// GCP はリモート (Cloud Build) で依存解決とビルドを行う。
    pub fn installs_locally(&self) -> bool {
        matches!(self, Platform::AwsLambda)
    }

    /// ラッパーが依存するランタイムアダプタのパッケージ
    pub fn adapter_packages(&self, language: Language) -> &'static [&'static str] {
        match (self, language) {
            (Platform::AwsLambda, Language::Python) => &["flask", "apig-wsgi"],
            (Platform::AwsLambda, _) => &["express", "serverless-http"],
            (Platform::GcpCloudRun, _) => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.deploy_id())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws" | "aws-lambda" => Ok(Platform::AwsLambda),
            "gcp" | "gcp-cloudrun" => Ok(Platform::GcpCloudRun),
            other => Err(ConfigError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// `.upify/config.yaml` の内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    pub language: Language,

    pub package_manager: PackageManager,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_var: Option<String>,

    #[serde(
        rename = "aws-lambda",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub aws_lambda: Option<AwsLambdaConfig>,

    #[serde(
        rename = "gcp-cloudrun",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gcp_cloudrun: Option<GcpCloudRunConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsLambdaConfig {
    pub region: String,
    pub role_name: String,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpCloudRunConfig {
    pub region: String,
    pub project_id: String,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl DeploymentConfig {
    /// アプリケーション変数名（未設定なら `app`）
    pub fn app_var(&self) -> &str {
        self.app_var.as_deref().unwrap_or("app")
    }

    /// 設定済みのプラットフォーム一覧
    pub fn configured_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| match p {
                Platform::AwsLambda => self.aws_lambda.is_some(),
                Platform::GcpCloudRun => self.gcp_cloudrun.is_some(),
            })
            .collect()
    }

    /// AWS Lambda の設定を検証して返す
    pub fn aws_lambda(&self) -> Result<&AwsLambdaConfig> {
        let platform = Platform::AwsLambda.deploy_id();
        let cfg = self
            .aws_lambda
            .as_ref()
            .ok_or_else(|| ConfigError::MissingPlatform {
                platform: platform.to_string(),
            })?;

        require(platform, "region", &cfg.region)?;
        require(platform, "role_name", &cfg.role_name)?;
        require(platform, "runtime", &cfg.runtime)?;
        Ok(cfg)
    }

    /// GCP Cloud Run の設定を検証して返す
    pub fn gcp_cloudrun(&self) -> Result<&GcpCloudRunConfig> {
        let platform = Platform::GcpCloudRun.deploy_id();
        let cfg = self
            .gcp_cloudrun
            .as_ref()
            .ok_or_else(|| ConfigError::MissingPlatform {
                platform: platform.to_string(),
            })?;

        require(platform, "project_id", &cfg.project_id)?;
        require(platform, "region", &cfg.region)?;
        require(platform, "runtime", &cfg.runtime)?;
        Ok(cfg)
    }

    /// 指定プラットフォームのサブ設定が揃っているか検証
    pub fn validate_for(&self, platform: Platform) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                platform: platform.deploy_id().to_string(),
                field: "name",
            });
        }
        match platform {
            Platform::AwsLambda => self.aws_lambda().map(|_| ()),
            Platform::GcpCloudRun => self.gcp_cloudrun().map(|_| ()),
        }
    }
}

fn require(platform: &str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            platform: platform.to_string(),
            field,
        });
    }
    Ok(())
}
