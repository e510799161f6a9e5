use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("ソースディレクトリが見つかりません: {0}")]
    SourceNotFound(PathBuf),

    #[error("ファイル走査エラー: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("ZIP 作成エラー: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("コマンドの実行に失敗しました: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("ビルドスクリプトが失敗しました: {command}\n{stderr}")]
    BuildScriptFailed { command: String, stderr: String },

    #[error("ハンドララッパーが見つかりません: {0}")]
    WrapperNotFound(PathBuf),

    #[error("リネーム先が既に存在します: {0}")]
    RenameConflict(PathBuf),

    #[error("import 書き換えパターンが不正です: {0}")]
    Pattern(#[from] regex::Error),

    #[error("package.json の処理に失敗しました: {path}\n理由: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("IO エラー: {path}\n理由: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("アーカイブの出力先がソースディレクトリ内にあります: {0}")]
    ArtifactInsideSource(PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("バックグラウンドタスクが中断されました: {0}")]
    TaskAborted(String),
}

impl BuildError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::CommandFailed { command, stderr } => {
                format!(
                    "依存関係のインストールに失敗しました: {}\n\
                     {}\n\
                     \n\
                     パッケージマネージャがインストールされているか確認してください。",
                    command, stderr
                )
            }
            BuildError::BuildScriptFailed { command, stderr } => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     {}\n\
                     \n\
                     package.json の build スクリプトを確認してください。",
                    command, stderr
                )
            }
            BuildError::WrapperNotFound(path) => {
                format!(
                    "ハンドララッパーが見つかりません: {}\n\
                     \n\
                     ラッパーファイルがプロジェクトのルートにあるか確認してください。",
                    path.display()
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
