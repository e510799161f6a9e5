use std::fmt;
use thiserror::Error;
use upify_build::BuildError;
use upify_cloud::{CloudError, StageError};
use upify_core::{ConfigError, Platform};

/// パイプラインの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Validate,
    VerifyHandler,
    LoadEnvironment,
    Workspace,
    Stage,
    Adapt,
    Package,
    Deploy,
}

impl DeployStage {
    pub fn label(&self) -> &'static str {
        match self {
            DeployStage::Validate => "設定の検証",
            DeployStage::VerifyHandler => "ハンドラの確認",
            DeployStage::LoadEnvironment => "環境変数の読み込み",
            DeployStage::Workspace => "ワークスペースの作成",
            DeployStage::Stage => "ソースのステージング",
            DeployStage::Adapt => "エントリポイントの適合",
            DeployStage::Package => "アーカイブの作成",
            DeployStage::Deploy => "クラウドへのデプロイ",
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{stage}に失敗しました: {source}")]
    Config {
        stage: DeployStage,
        #[source]
        source: ConfigError,
    },

    #[error("ワークスペースの作成に失敗しました: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("{stage}に失敗しました: {source}")]
    Build {
        stage: DeployStage,
        #[source]
        source: BuildError,
    },

    #[error("{platform} へのデプロイに失敗しました: {source}")]
    Connector {
        platform: Platform,
        #[source]
        source: StageError,
    },
}

impl DeployError {
    pub(crate) fn config(stage: DeployStage) -> impl FnOnce(ConfigError) -> Self {
        move |source| DeployError::Config { stage, source }
    }

    pub(crate) fn build(stage: DeployStage) -> impl FnOnce(BuildError) -> Self {
        move |source| DeployError::Build { stage, source }
    }

    /// 失敗した段階
    pub fn stage(&self) -> DeployStage {
        match self {
            DeployError::Config { stage, .. } | DeployError::Build { stage, .. } => *stage,
            DeployError::Workspace(_) => DeployStage::Workspace,
            DeployError::Connector { .. } => DeployStage::Deploy,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            DeployError::Build { stage, source } => {
                format!("{}に失敗しました:\n{}", stage, source.user_message())
            }
            DeployError::Connector { platform, source } => {
                let hint = match &source.source {
                    CloudError::AuthenticationFailed(_) => match platform {
                        Platform::AwsLambda => {
                            "\n\nAWS の認証情報 (AWS_PROFILE など) を確認してください。"
                        }
                        Platform::GcpCloudRun => {
                            "\n\n`gcloud auth login` を実行するか GOOGLE_OAUTH_ACCESS_TOKEN を設定してください。"
                        }
                    },
                    CloudError::Timeout(_) => {
                        "\n\nしばらく待ってから再実行してください。同じ名前で再実行しても安全です。"
                    }
                    _ => "",
                };
                format!(
                    "{} へのデプロイに失敗しました ({}):\n{}{}",
                    platform.display_name(),
                    source.stage,
                    source.source,
                    hint
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
