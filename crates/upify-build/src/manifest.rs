//! package.json の読み書き

use crate::error::{BuildError, Result};
use crate::installer::Ecosystem;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

/// Cloud Functions の Node.js ランタイムが要求するフレームワーク
pub const FUNCTIONS_FRAMEWORK: &str = "@google-cloud/functions-framework";
pub const FUNCTIONS_FRAMEWORK_VERSION: &str = "^3.0.0";

/// キー順を保持した package.json
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    root: Map<String, Value>,
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BuildError::io_at(path, e))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| BuildError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match value {
            Value::Object(root) => Ok(Self {
                path: path.to_path_buf(),
                root,
            }),
            _ => Err(BuildError::Manifest {
                path: path.to_path_buf(),
                message: "トップレベルがオブジェクトではありません".to_string(),
            }),
        }
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.root
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(name))
    }

    pub fn main(&self) -> Option<&str> {
        self.root.get("main").and_then(Value::as_str)
    }

    pub fn set_main(&mut self, main: &str) {
        self.root
            .insert("main".to_string(), Value::String(main.to_string()));
    }

    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.root
            .get("dependencies")
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    pub fn add_dependency(&mut self, name: &str, version: &str) -> Result<()> {
        self.section_mut("dependencies")?
            .insert(name.to_string(), Value::String(version.to_string()));
        Ok(())
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.root
            .get("scripts")
            .and_then(Value::as_object)
            .and_then(|scripts| scripts.get(name))
            .and_then(Value::as_str)
    }

    pub fn add_script(&mut self, name: &str, command: &str) -> Result<()> {
        self.section_mut("scripts")?
            .insert(name.to_string(), Value::String(command.to_string()));
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.root).map_err(|e| BuildError::Manifest {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&self.path, content).map_err(|e| BuildError::io_at(&self.path, e))
    }

    fn section_mut(&mut self, key: &str) -> Result<&mut Map<String, Value>> {
        let entry = self
            .root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        entry.as_object_mut().ok_or_else(|| BuildError::Manifest {
            path: self.path.clone(),
            message: format!("`{}` がオブジェクトではありません", key),
        })
    }
}

/// Functions Framework 向けに package.json を書き換える
///
/// `main` をラッパーに向け、フレームワークを依存に追加し、
/// build スクリプトがあれば Cloud Build 用の `gcp-build` を宣言する。
pub fn adapt_for_functions_framework(workspace: &Path, ecosystem: &Ecosystem) -> Result<bool> {
    let path = workspace.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(BuildError::Manifest {
            path,
            message: "package.json が見つかりません".to_string(),
        });
    }

    let mut manifest = PackageManifest::load(&path)?;
    let handler = ecosystem.language.handler_file_name();
    let mut changed = false;

    if manifest.main() != Some(handler) {
        manifest.set_main(handler);
        changed = true;
    }

    if manifest.dependency(FUNCTIONS_FRAMEWORK) != Some(FUNCTIONS_FRAMEWORK_VERSION) {
        manifest.add_dependency(FUNCTIONS_FRAMEWORK, FUNCTIONS_FRAMEWORK_VERSION)?;
        changed = true;
    }

    if manifest.has_script("build") {
        let build = ecosystem.build_command();
        if manifest.script("gcp-build") != Some(build) {
            manifest.add_script("gcp-build", build)?;
            changed = true;
        }
    }

    if changed {
        manifest.save()?;
        tracing::info!(main = %handler, "Updated package.json for Functions Framework");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use upify_core::{Language, PackageManager};

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_adapt_sets_main_dependency_and_build() {
        let workspace = tempdir().unwrap();
        let path = workspace.path().join(MANIFEST_FILE);
        fs::write(
            &path,
            r#"{"name":"demo","version":"1.0.0","main":"index.js","scripts":{"build":"tsc"},"dependencies":{"express":"^4.0.0"}}"#,
        )
        .unwrap();

        let eco = Ecosystem::new(Language::TypeScript, PackageManager::Yarn);
        assert!(adapt_for_functions_framework(workspace.path(), &eco).unwrap());

        let json = read_json(&path);
        assert_eq!(json["main"], "upify_handler.js");
        assert_eq!(json["dependencies"]["express"], "^4.0.0");
        assert_eq!(json["dependencies"][FUNCTIONS_FRAMEWORK], "^3.0.0");
        assert_eq!(json["scripts"]["gcp-build"], "yarn build");

        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "version", "main", "scripts", "dependencies"]);
    }

    #[test]
    fn test_adapt_without_build_script() {
        let workspace = tempdir().unwrap();
        let path = workspace.path().join(MANIFEST_FILE);
        fs::write(&path, r#"{"name":"demo"}"#).unwrap();

        let eco = Ecosystem::new(Language::JavaScript, PackageManager::Npm);
        adapt_for_functions_framework(workspace.path(), &eco).unwrap();

        let json = read_json(&path);
        assert!(json.get("scripts").is_none());
        assert_eq!(json["dependencies"][FUNCTIONS_FRAMEWORK], "^3.0.0");
    }

    #[test]
    fn test_adapt_is_idempotent() {
        let workspace = tempdir().unwrap();
        let path = workspace.path().join(MANIFEST_FILE);
        fs::write(&path, r#"{"name":"demo","scripts":{"build":"tsc"}}"#).unwrap();

        let eco = Ecosystem::new(Language::TypeScript, PackageManager::Npm);
        assert!(adapt_for_functions_framework(workspace.path(), &eco).unwrap());
        let first = fs::read_to_string(&path).unwrap();

        assert!(!adapt_for_functions_framework(workspace.path(), &eco).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_invalid_manifest() {
        let workspace = tempdir().unwrap();
        let path = workspace.path().join(MANIFEST_FILE);
        fs::write(&path, "[1, 2]").unwrap();

        let result = PackageManifest::load(&path);
        assert!(matches!(result, Err(BuildError::Manifest { .. })));
    }
}
