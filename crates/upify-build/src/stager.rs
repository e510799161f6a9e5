use crate::error::{BuildError, Result};
use crate::installer::{DependencyInstaller, Ecosystem};
use crate::manifest::PackageManifest;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// ステージング時に除外するディレクトリ（階層の深さに関係なく名前で一致）
pub const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "venv", ".venv", ".upify", "dist"];

/// ステージング時に除外するロックファイル
pub const EXCLUDED_FILES: &[&str] = &["package-lock.json", "yarn.lock"];

/// コピー結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
}

/// ソースツリーを隔離されたワークスペースへコピーする
#[derive(Debug, Clone)]
pub struct SourceStager {
    excluded_dirs: Vec<String>,
    excluded_files: Vec<String>,
}

impl Default for SourceStager {
    fn default() -> Self {
        Self {
            excluded_dirs: EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            excluded_files: EXCLUDED_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourceStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 除外対象かどうか
    pub fn is_excluded(&self, name: &str, is_dir: bool) -> bool {
        if is_dir {
            self.excluded_dirs.iter().any(|d| d == name)
        } else {
            self.excluded_files.iter().any(|f| f == name)
        }
    }

    /// フィルタ付きでツリーをコピー
    ///
    /// シンボリックリンクは辿って実体をコピーする。リンクのループは走査エラーになる。
    pub fn copy_tree(&self, source: &Path, destination: &Path) -> Result<CopyStats> {
        if !source.is_dir() {
            return Err(BuildError::SourceNotFound(source.to_path_buf()));
        }

        fs::create_dir_all(destination).map_err(|e| BuildError::io_at(destination, e))?;

        let source = source
            .canonicalize()
            .map_err(|e| BuildError::io_at(source, e))?;
        let destination = destination
            .canonicalize()
            .map_err(|e| BuildError::io_at(destination, e))?;

        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Copying source tree"
        );

        let mut stats = CopyStats::default();
        let walker = WalkDir::new(&source)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| self.keep(entry, &destination));

        for entry in walker {
            let entry = entry?;
            let relative = match entry.path().strip_prefix(&source) {
                Ok(rel) if rel.as_os_str().is_empty() => continue,
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            let target = destination.join(&relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| BuildError::io_at(&target, e))?;
                stats.dirs += 1;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| BuildError::io_at(parent, e))?;
                }
                fs::copy(entry.path(), &target).map_err(|e| BuildError::io_at(entry.path(), e))?;
                stats.files += 1;
            }
        }

        tracing::debug!(files = stats.files, dirs = stats.dirs, "Source tree copied");
        Ok(stats)
    }

    fn keep(&self, entry: &DirEntry, destination: &Path) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        // コピー先がソース内にある場合の再帰コピーを防ぐ
        if entry.path().starts_with(destination) {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        !self.is_excluded(&name, entry.file_type().is_dir())
    }

    /// コピー後に依存関係をインストールし、宣言されていればビルドする
    ///
    /// `ecosystem` が `None` の場合はコピーのみ（リモートでビルドするプラットフォーム向け）。
    pub async fn stage(
        &self,
        source: &Path,
        destination: &Path,
        installer: &dyn DependencyInstaller,
        ecosystem: Option<&Ecosystem>,
    ) -> Result<CopyStats> {
        let stager = self.clone();
        let (src, dest): (PathBuf, PathBuf) = (source.to_path_buf(), destination.to_path_buf());

        // ファイルコピーは同期 I/O なので blocking タスクで実行
        let stats = tokio::task::spawn_blocking(move || stager.copy_tree(&src, &dest))
            .await
            .map_err(|e| BuildError::TaskAborted(e.to_string()))??;

        let Some(ecosystem) = ecosystem else {
            return Ok(stats);
        };

        installer
            .install_dependencies(destination, ecosystem)
            .await?;

        if declares_build_script(destination, ecosystem)? {
            installer.run_build_script(destination, ecosystem).await?;
        } else if ecosystem.language.is_node() {
            tracing::info!("No build script found; skipping build step");
        }

        Ok(stats)
    }
}

/// package.json に build スクリプトが宣言されているか
pub fn declares_build_script(workspace: &Path, ecosystem: &Ecosystem) -> Result<bool> {
    if !ecosystem.language.is_node() {
        return Ok(false);
    }
    let path = workspace.join(crate::manifest::MANIFEST_FILE);
    if !path.exists() {
        return Ok(false);
    }
    Ok(PackageManifest::load(&path)?.has_script("build"))
}
