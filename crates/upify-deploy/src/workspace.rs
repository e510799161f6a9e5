//! 一時的なステージングワークスペース

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "upify_deployment_";
const SOURCE_DIR: &str = "source";
const ARTIFACT_FILE: &str = "source.zip";

/// `<tmp>/source` にソースのコピー、`<tmp>/source.zip` にアーカイブを置く
///
/// アーカイブはソースの外に置くので自分自身を含まない。
/// 値を drop するとディレクトリごと削除される。
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        std::fs::create_dir(dir.path().join(SOURCE_DIR))?;
        tracing::debug!(workspace = %dir.path().display(), "Created staging workspace");
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join(SOURCE_DIR)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.path().join(ARTIFACT_FILE)
    }
}
