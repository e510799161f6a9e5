//! プラットフォーム固有のエントリファイル規約への適合
//!
//! Cloud Functions (Python) はエントリファイル名が `main.py` に固定されている。
//! ユーザーの `main.py` を退避し、ラッパー内の import を書き換えてから
//! ラッパーを `main.py` に配置する。

use crate::error::{BuildError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use upify_core::{Language, Platform};

/// リネーム計画
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    /// プラットフォームが要求するファイル名
    pub reserved: String,
    /// ユーザーファイルの退避先
    pub renamed: String,
    /// 予約スロットに配置するラッパー
    pub wrapper: String,
    /// import を書き換えるファイル
    pub patch_files: Vec<String>,
}

impl RenamePlan {
    /// GCP Python 用の計画
    pub fn python_main() -> Self {
        Self {
            reserved: "main.py".to_string(),
            renamed: "_main.py".to_string(),
            wrapper: Language::Python.handler_file_name().to_string(),
            patch_files: vec![
                Language::Python.handler_file_name().to_string(),
                Language::Python.main_file_name().to_string(),
            ],
        }
    }

    fn module_name(file: &str) -> &str {
        file.strip_suffix(".py").unwrap_or(file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrypointAdapter {
    /// ハンドラ参照を任意に指定できるプラットフォーム
    PassThrough,
    RenameAndPatch(RenamePlan),
}

/// 適合処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adaptation {
    Unchanged,
    AlreadyAdapted,
    /// `renamed_user_file` はユーザーの `main.py` を退避したかどうか
    Adapted { renamed_user_file: bool },
}

impl EntrypointAdapter {
    pub fn for_platform(platform: Platform, language: Language) -> Self {
        match (platform, language) {
            (Platform::GcpCloudRun, Language::Python) => {
                EntrypointAdapter::RenameAndPatch(RenamePlan::python_main())
            }
            _ => EntrypointAdapter::PassThrough,
        }
    }

    pub fn adapt(&self, workspace: &Path) -> Result<Adaptation> {
        match self {
            EntrypointAdapter::PassThrough => Ok(Adaptation::Unchanged),
            EntrypointAdapter::RenameAndPatch(plan) => rename_and_patch(workspace, plan),
        }
    }
}

fn rename_and_patch(workspace: &Path, plan: &RenamePlan) -> Result<Adaptation> {
    let reserved = workspace.join(&plan.reserved);
    let renamed = workspace.join(&plan.renamed);
    let wrapper = workspace.join(&plan.wrapper);

    if !wrapper.exists() {
        if reserved.exists() {
            tracing::debug!(workspace = %workspace.display(), "Entrypoint already adapted");
            return Ok(Adaptation::AlreadyAdapted);
        }
        return Err(BuildError::WrapperNotFound(wrapper));
    }

    let renamed_user_file = reserved.exists();
    if renamed_user_file {
        if renamed.exists() {
            return Err(BuildError::RenameConflict(renamed));
        }
        tracing::info!(
            from = %plan.reserved,
            to = %plan.renamed,
            "Renaming user entry file"
        );
        fs::rename(&reserved, &renamed).map_err(|e| BuildError::io_at(&reserved, e))?;

        let old_module = RenamePlan::module_name(&plan.reserved);
        let new_module = RenamePlan::module_name(&plan.renamed);
        for file in &plan.patch_files {
            let path = workspace.join(file);
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| BuildError::io_at(&path, e))?;
            let patched = rewrite_imports(&content, old_module, new_module)?;
            if patched != content {
                tracing::debug!(file = %file, "Patched imports");
                fs::write(&path, patched).map_err(|e| BuildError::io_at(&path, e))?;
            }
        }
    }

    fs::rename(&wrapper, &reserved).map_err(|e| BuildError::io_at(&wrapper, e))?;

    Ok(Adaptation::Adapted { renamed_user_file })
}

/// `import <old>` と `from <old> import ...` の行だけを書き換える
///
/// `import main_utils`, `import main as m`, `from mainframe import x` は対象外。
pub fn rewrite_imports(content: &str, old_module: &str, new_module: &str) -> Result<String> {
    let escaped = regex::escape(old_module);
    let import_re = Regex::new(&format!(r"^([ \t]*)import[ \t]+{}[ \t]*$", escaped))?;
    let from_re = Regex::new(&format!(
        r"^([ \t]*)from[ \t]+{}([ \t]+import[ \t]+.*)$",
        escaped
    ))?;

    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        if let Some(caps) = import_re.captures(body) {
            out.push_str(&caps[1]);
            out.push_str("import ");
            out.push_str(new_module);
        } else if let Some(caps) = from_re.captures(body) {
            out.push_str(&caps[1]);
            out.push_str("from ");
            out.push_str(new_module);
            out.push_str(&caps[2]);
        } else {
            out.push_str(body);
        }
        out.push_str(ending);
    }
    Ok(out)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HANDLER: &str = "import functions_framework\nfrom main import app\n\n@functions_framework.http\ndef handler(request):\n    return app(request)\n";

    fn gcp_python() -> EntrypointAdapter {
        EntrypointAdapter::for_platform(Platform::GcpCloudRun, Language::Python)
    }

    #[test]
    fn test_pass_through_for_lambda() {
        let workspace = tempdir().unwrap();
        fs::write(workspace.path().join("main.py"), "app = 1").unwrap();
        fs::write(workspace.path().join("upify_handler.py"), HANDLER).unwrap();

        let adapter = EntrypointAdapter::for_platform(Platform::AwsLambda, Language::Python);
        assert_eq!(adapter, EntrypointAdapter::PassThrough);
        assert_eq!(adapter.adapt(workspace.path()).unwrap(), Adaptation::Unchanged);
        assert!(workspace.path().join("upify_handler.py").exists());
    }

    #[test]
    fn test_rename_and_patch() {
        let workspace = tempdir().unwrap();
        let ws = workspace.path();
        fs::write(ws.join("main.py"), "app = 'user'\n").unwrap();
        fs::write(ws.join("upify_handler.py"), HANDLER).unwrap();
        fs::write(ws.join("upify_main.py"), "import main\n").unwrap();

        let result = gcp_python().adapt(ws).unwrap();
        assert_eq!(
            result,
            Adaptation::Adapted {
                renamed_user_file: true
            }
        );

        assert_eq!(fs::read_to_string(ws.join("_main.py")).unwrap(), "app = 'user'\n");
        let entry = fs::read_to_string(ws.join("main.py")).unwrap();
        assert!(entry.contains("from _main import app\n"));
        assert!(entry.contains("import functions_framework\n"));
        assert!(!ws.join("upify_handler.py").exists());
        assert_eq!(fs::read_to_string(ws.join("upify_main.py")).unwrap(), "import _main\n");
    }

    #[test]
    fn test_adapt_is_idempotent() {
        let workspace = tempdir().unwrap();
        let ws = workspace.path();
        fs::write(ws.join("main.py"), "app = 'user'\n").unwrap();
        fs::write(ws.join("upify_handler.py"), HANDLER).unwrap();

        gcp_python().adapt(ws).unwrap();
        let first = fs::read_to_string(ws.join("main.py")).unwrap();

        assert_eq!(gcp_python().adapt(ws).unwrap(), Adaptation::AlreadyAdapted);
        assert_eq!(fs::read_to_string(ws.join("main.py")).unwrap(), first);
        assert_eq!(fs::read_to_string(ws.join("_main.py")).unwrap(), "app = 'user'\n");
    }

    #[test]
    fn test_wrapper_only_moves_into_slot() {
        let workspace = tempdir().unwrap();
        let ws = workspace.path();
        fs::write(ws.join("upify_handler.py"), HANDLER).unwrap();

        let result = gcp_python().adapt(ws).unwrap();
        assert_eq!(
            result,
            Adaptation::Adapted {
                renamed_user_file: false
            }
        );
        // 退避していないので import はそのまま
        assert_eq!(fs::read_to_string(ws.join("main.py")).unwrap(), HANDLER);
    }

    #[test]
    fn test_missing_wrapper_is_error() {
        let workspace = tempdir().unwrap();
        let result = gcp_python().adapt(workspace.path());
        assert!(matches!(result, Err(BuildError::WrapperNotFound(_))));
    }

    #[test]
    fn test_rename_conflict_does_not_clobber() {
        let workspace = tempdir().unwrap();
        let ws = workspace.path();
        fs::write(ws.join("main.py"), "app = 'user'\n").unwrap();
        fs::write(ws.join("_main.py"), "keep me").unwrap();
        fs::write(ws.join("upify_handler.py"), HANDLER).unwrap();

        let result = gcp_python().adapt(ws);
        assert!(matches!(result, Err(BuildError::RenameConflict(_))));
        assert_eq!(fs::read_to_string(ws.join("_main.py")).unwrap(), "keep me");
        assert_eq!(fs::read_to_string(ws.join("main.py")).unwrap(), "app = 'user'\n");
    }

    #[test]
    fn test_rewrite_imports_leaves_unrelated_lines() {
        let source = "import main_utils\nimport main as m\nfrom mainframe import x\n# import main\nimport main\n    from main import app, other\nfrom main.sub import y\n";
        let rewritten = rewrite_imports(source, "main", "_main").unwrap();

        assert_eq!(
            rewritten,
            "import main_utils\nimport main as m\nfrom mainframe import x\n# import main\nimport _main\n    from _main import app, other\nfrom main.sub import y\n"
        );
    }

    #[test]
    fn test_rewrite_imports_preserves_crlf() {
        let rewritten = rewrite_imports("from main import app\r\nprint(1)", "main", "_main").unwrap();
        assert_eq!(rewritten, "from _main import app\r\nprint(1)");
    }
}
