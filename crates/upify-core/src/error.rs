use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません: {0}\nヒント: プロジェクトのルートに `.upify/config.yaml` を作成してください"
    )]
    ConfigNotFound(PathBuf),

    #[error("設定ファイルのパースに失敗しました: {path}\n理由: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{platform} の設定がありません。`.upify/config.yaml` に `{platform}` セクションを追加してください")]
    MissingPlatform { platform: String },

    #[error("{platform} の設定項目 `{field}` が指定されていません")]
    MissingField {
        platform: String,
        field: &'static str,
    },

    #[error("ハンドラファイルが見つかりません: {0}")]
    HandlerNotFound(PathBuf),

    #[error("未対応のプラットフォームです: {0}")]
    UnsupportedPlatform(String),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
