//! ステージング済みワークスペースを単一の ZIP アーカイブにまとめる

use crate::error::{BuildError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// プラットフォームへ直接アップロードできるサイズの上限 (50 MiB)
pub const INLINE_UPLOAD_LIMIT: u64 = 50 * 1024 * 1024;

/// 作成したアーカイブ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// ファイルとディレクトリのエントリ数
    pub entries: usize,
    /// アーカイブのバイト数
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactPackager;

impl ArtifactPackager {
    pub fn new() -> Self {
        Self
    }

    /// `source_dir` 配下を `destination` に ZIP 化する
    ///
    /// ディレクトリは末尾 `/` 付きの無圧縮エントリ、ファイルは Deflate で格納する。
    pub fn package(&self, source_dir: &Path, destination: &Path) -> Result<Artifact> {
        if !source_dir.is_dir() {
            return Err(BuildError::SourceNotFound(source_dir.to_path_buf()));
        }
        // 書きかけのアーカイブを自分自身に含めない
        if lies_within(source_dir, destination)? {
            return Err(BuildError::ArtifactInsideSource(destination.to_path_buf()));
        }

        let file = File::create(destination).map_err(|e| BuildError::io_at(destination, e))?;
        let mut zip = zip::ZipWriter::new(file);
        let mut entries = 0;

        for entry in WalkDir::new(source_dir).follow_links(true) {
            let entry = entry?;
            let relative = match entry.path().strip_prefix(source_dir) {
                Ok(rel) if rel.as_os_str().is_empty() => continue,
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let name = archive_name(relative);
            let mode = unix_mode(entry.path())?;

            if entry.file_type().is_dir() {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .unix_permissions(mode);
                zip.add_directory(format!("{}/", name), options)?;
            } else {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .unix_permissions(mode)
                    .large_file(true);
                zip.start_file(name.as_str(), options)?;
                let mut input =
                    File::open(entry.path()).map_err(|e| BuildError::io_at(entry.path(), e))?;
                io::copy(&mut input, &mut zip)?;
            }
            entries += 1;
        }

        zip.finish()?;

        let size = fs::metadata(destination)
            .map_err(|e| BuildError::io_at(destination, e))?
            .len();

        tracing::debug!(
            artifact = %destination.display(),
            entries,
            size,
            "Created deployment archive"
        );

        let artifact = Artifact {
            path: destination.to_path_buf(),
            entries,
            size,
        };
        check_artifact_size(&artifact);
        Ok(artifact)
    }

    /// [`package`](Self::package) を blocking タスクで実行する
    pub async fn package_async(&self, source_dir: &Path, destination: &Path) -> Result<Artifact> {
        let packager = self.clone();
        let (src, dest) = (source_dir.to_path_buf(), destination.to_path_buf());

        // zip クレートは async 非対応
        tokio::task::spawn_blocking(move || packager.package(&src, &dest))
            .await
            .map_err(|e| BuildError::TaskAborted(e.to_string()))?
    }
}

/// 上限を超えるアーカイブは警告のみ（アップロード時にプラットフォームが拒否する）
pub fn check_artifact_size(artifact: &Artifact) -> bool {
    if artifact.size > INLINE_UPLOAD_LIMIT {
        tracing::warn!(
            size = artifact.size,
            limit = INLINE_UPLOAD_LIMIT,
            "Deployment archive exceeds the inline upload limit"
        );
        return false;
    }
    true
}

/// `destination` が `source_dir` 配下を指すか
///
/// 出力先の親ディレクトリが存在しない場合は作成時に失敗するのでここでは判定しない。
fn lies_within(source_dir: &Path, destination: &Path) -> Result<bool> {
    let source = source_dir
        .canonicalize()
        .map_err(|e| BuildError::io_at(source_dir, e))?;
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(parent
        .canonicalize()
        .is_ok_and(|parent| parent.starts_with(&source)))
}

/// OS に依存しない `/` 区切りのエントリ名
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path).map_err(|e| BuildError::io_at(path, e))?;
    Ok(metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn unix_mode(path: &Path) -> Result<u32> {
    let metadata = fs::metadata(path).map_err(|e| BuildError::io_at(path, e))?;
    Ok(if metadata.is_dir() { 0o755 } else { 0o644 })
}
