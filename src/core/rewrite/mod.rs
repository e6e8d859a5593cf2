//! Batch underscore-prefix rewriting across TypeScript/JavaScript trees.
//!
//! `rewrite_all` walks the requested roots, applies the ordered rule
//! table to every source file, and writes back only files whose content
//! actually changed. Unreadable or unwritable files are logged and
//! skipped; the batch always runs to completion.

mod rules;

pub use rules::{
    is_external_module, is_reserved, NameChange, RuleCounts, RuleKind, Ruleset,
    CALLABLE_PREFIXES, EXTERNAL_MODULES, RESERVED_NAMES, SOURCE_EXTENSIONS,
};

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::io;

const ALWAYS_SKIP_DIRS: &[&str] = &["node_modules", "vendor", ".git", ".svn", ".hg"];
const ROOT_ONLY_SKIP_DIRS: &[&str] = &["build", "dist", "target", "cache", "tmp"];

/// One file whose content had names to strip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRewrite {
    pub file: String,
    pub names_changed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub renames: Vec<NameChange>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResult {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub names_changed: usize,
    pub counts: RuleCounts,
    pub rewrites: Vec<FileRewrite>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

fn should_skip_dir(name: &str, is_root: bool) -> bool {
    if ALWAYS_SKIP_DIRS.contains(&name) {
        return true;
    }
    is_root && ROOT_ONLY_SKIP_DIRS.contains(&name)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_recursive(root, root, &mut files);
    files.sort();
    files
}

fn walk_recursive(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name();
            if should_skip_dir(&name.to_string_lossy(), dir == root) {
                continue;
            }
            walk_recursive(root, &path, files);
        } else if has_source_extension(&path) {
            files.push(path);
        }
    }
}

/// Rewrites every source file under `roots`. A root may also be a single
/// file. With `write` false the result reports what would change without
/// touching disk. `glob` filters by path relative to the scanned root;
/// a file root is matched by its name.
pub fn rewrite_all(roots: &[PathBuf], glob: Option<&str>, write: bool) -> RewriteResult {
    let ruleset = Ruleset::new();
    let mut result = RewriteResult::default();

    for root in roots {
        let files = if root.is_file() {
            if has_source_extension(root) {
                vec![root.clone()]
            } else {
                Vec::new()
            }
        } else {
            walk_files(root)
        };

        for path in files {
            if let Some(pattern) = glob {
                let mut rel = path.strip_prefix(root).unwrap_or(&path);
                if rel.as_os_str().is_empty() {
                    // A file root strips to nothing; match its name instead.
                    rel = path.file_name().map(Path::new).unwrap_or(&path);
                }
                if !glob_match::glob_match(pattern, &rel.to_string_lossy()) {
                    continue;
                }
            }

            result.files_scanned += 1;

            let content = match io::read_file(&path, "rewrite scan") {
                Ok(content) => content,
                Err(e) => {
                    log_status!("fix", "Failed to read {}: {}", path.display(), e);
                    result.skipped.push(SkippedFile {
                        file: path.display().to_string(),
                        reason: format!("read failed: {}", e),
                    });
                    continue;
                }
            };

            let (rewritten, changes) = ruleset.apply(&content);
            if changes.is_empty() {
                continue;
            }

            result.counts.merge(&RuleCounts::tally(&changes));
            result.names_changed += changes.len();
            result.files_changed += 1;

            let mut applied = false;
            if write {
                match io::write_file(&path, &rewritten, "rewrite apply") {
                    Ok(()) => applied = true,
                    Err(e) => {
                        log_status!("fix", "Failed to write {}: {}", path.display(), e);
                        result.skipped.push(SkippedFile {
                            file: path.display().to_string(),
                            reason: format!("write failed: {}", e),
                        });
                    }
                }
            }

            result.rewrites.push(FileRewrite {
                file: path.display().to_string(),
                names_changed: changes.len(),
                renames: changes,
                applied,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn rewrites_changed_files_on_disk() {
        let dir = setup_dir("janitor_rewrite_test_apply");
        let file = dir.join("a.ts");
        fs::write(&file, "import { _Foo } from './x';\n").unwrap();

        let result = rewrite_all(&[dir.clone()], None, true);
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.files_changed, 1);
        assert_eq!(result.names_changed, 1);
        assert!(result.rewrites[0].applied);
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "import { Foo } from './x';\n"
        );

        // A second pass finds nothing left to strip.
        let again = rewrite_all(&[dir.clone()], None, true);
        assert_eq!(again.files_changed, 0);
        assert!(again.rewrites.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let dir = setup_dir("janitor_rewrite_test_dry");
        let file = dir.join("a.tsx");
        let source = "const { _value } = props;\n";
        fs::write(&file, source).unwrap();

        let result = rewrite_all(&[dir.clone()], None, false);
        assert_eq!(result.files_changed, 1);
        assert!(!result.rewrites[0].applied);
        assert_eq!(fs::read_to_string(&file).unwrap(), source);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unchanged_files_are_not_listed() {
        let dir = setup_dir("janitor_rewrite_test_clean");
        fs::write(dir.join("a.ts"), "export const x = 1;\n").unwrap();

        let result = rewrite_all(&[dir.clone()], None, true);
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.files_changed, 0);
        assert!(result.rewrites.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn skips_dependency_and_root_build_dirs() {
        let dir = setup_dir("janitor_rewrite_test_skip");
        fs::create_dir_all(dir.join("node_modules/pkg")).unwrap();
        fs::write(
            dir.join("node_modules/pkg/a.ts"),
            "import { _Foo } from './x';\n",
        )
        .unwrap();
        fs::create_dir_all(dir.join("dist")).unwrap();
        fs::write(dir.join("dist/out.js"), "obj._Thing;\n").unwrap();
        fs::create_dir_all(dir.join("app/dist")).unwrap();
        fs::write(dir.join("app/dist/keep.ts"), "obj._Thing;\n").unwrap();

        let result = rewrite_all(&[dir.clone()], None, false);
        // Only the nested dist survives the root-level skip list.
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.files_changed, 1);
        assert!(result.rewrites[0].file.contains("app"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn glob_filters_relative_paths() {
        let dir = setup_dir("janitor_rewrite_test_glob");
        fs::create_dir_all(dir.join("components")).unwrap();
        fs::write(dir.join("components/a.tsx"), "obj._Err;\n").unwrap();
        fs::write(dir.join("b.ts"), "obj._Err;\n").unwrap();

        let result = rewrite_all(&[dir.clone()], Some("components/**"), false);
        assert_eq!(result.files_scanned, 1);
        assert!(result.rewrites[0].file.contains("components"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn glob_matches_the_file_name_for_a_file_root() {
        let dir = setup_dir("janitor_rewrite_test_glob_file");
        let file = dir.join("only.ts");
        fs::write(&file, "obj._error;\n").unwrap();

        let kept = rewrite_all(&[file.clone()], Some("*.ts"), false);
        assert_eq!(kept.files_scanned, 1);
        assert_eq!(kept.files_changed, 1);

        let excluded = rewrite_all(&[file.clone()], Some("*.tsx"), false);
        assert_eq!(excluded.files_scanned, 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn accepts_a_single_file_root() {
        let dir = setup_dir("janitor_rewrite_test_single");
        let file = dir.join("only.ts");
        fs::write(&file, "obj._error;\n").unwrap();

        let result = rewrite_all(&[file.clone()], None, true);
        assert_eq!(result.files_scanned, 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "obj.error;\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn ignores_non_source_extensions() {
        let dir = setup_dir("janitor_rewrite_test_ext");
        fs::write(dir.join("notes.md"), "obj._error;\n").unwrap();
        fs::write(dir.join("data.json"), "{}\n").unwrap();

        let result = rewrite_all(&[dir.clone()], None, true);
        assert_eq!(result.files_scanned, 0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
