//! デプロイ先に渡す環境変数セット

use crate::error::{ConfigError, Result};
use crate::loader::CONFIG_DIR;
use crate::model::Platform;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// デプロイ先プラットフォームを示す環境変数
pub const DEPLOY_PLATFORM_VAR: &str = "UPIFY_DEPLOY_PLATFORM";

/// 本番用 env ファイル（優先）
pub const PRODUCTION_ENV_FILE: &str = ".env.production";

/// 通常の env ファイル（フォールバック）
pub const ENV_FILE: &str = ".env";

/// 変数名順に並んだ環境変数のマップ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSet {
    vars: BTreeMap<String, String>,
}

impl EnvironmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.upify/.env.production` → `.upify/.env` の順で最初に見つかったものを読む
    ///
    /// どちらも無ければ空のセットを返す。
    pub fn load(project_root: &Path) -> Result<Self> {
        match find_env_file(project_root) {
            Some(path) => Self::from_file(&path),
            None => {
                info!("No .upify/.env file found, not adding environment variables");
                Ok(Self::new())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let set = Self::parse(&content);
        debug!(
            env_file = %path.display(),
            variable_count = set.len(),
            "Loaded variables from env file"
        );
        Ok(set)
    }

    /// `KEY=VALUE` 形式をパース
    pub fn parse(content: &str) -> Self {
        let mut set = Self::new();

        for line in content.lines() {
            let line = line.trim();

            // 空行とコメント行をスキップ
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                set.insert(key, strip_quotes(value.trim()));
            }
        }

        set
    }

    /// プラットフォーム識別子を注入したセットを返す
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.insert(DEPLOY_PLATFORM_VAR, platform.deploy_id());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for EnvironmentSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

fn find_env_file(project_root: &Path) -> Option<PathBuf> {
    let dir = project_root.join(CONFIG_DIR);
    [PRODUCTION_ENV_FILE, ENV_FILE]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// クォートを除去（"value" や 'value' の場合）
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
