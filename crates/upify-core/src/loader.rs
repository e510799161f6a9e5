use crate::error::{ConfigError, Result};
use crate::model::DeploymentConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// プロジェクトローカルの設定ディレクトリ
pub const CONFIG_DIR: &str = ".upify";

/// 設定ファイル名
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// `<project_root>/.upify/config.yaml`
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
}

/// プロジェクトの設定ファイルを読み込む
pub fn load_config(project_root: &Path) -> Result<DeploymentConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound(path));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let config: DeploymentConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

    debug!(
        config = %path.display(),
        name = %config.name,
        language = %config.language,
        "Loaded deployment config"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, PackageManager};
    use std::fs;

    #[test]
    fn test_load_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join(CONFIG_DIR);
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"
name: demo
framework: flask
language: python
package_manager: pip
entrypoint: main.py
app_var: app
aws-lambda:
  region: us-east-1
  role_name: demo-role
  runtime: python3.12
  memory: 512
"#,
        )
        .unwrap();

        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.language, Language::Python);
        assert_eq!(config.package_manager, PackageManager::Pip);

        let aws = config.aws_lambda.unwrap();
        assert_eq!(aws.role_name, "demo-role");
        assert_eq!(aws.memory, Some(512));
        assert!(config.gcp_cloudrun.is_none());
    }

    #[test]
    fn test_load_config_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_config(temp_dir.path());

        if let Err(ConfigError::ConfigNotFound(path)) = result {
            assert!(path.ends_with(".upify/config.yaml"));
        } else {
            panic!("Expected ConfigNotFound error");
        }
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join(CONFIG_DIR);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE_NAME), "name: [unclosed").unwrap();

        assert!(matches!(
            load_config(temp_dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
