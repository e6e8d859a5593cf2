//! Lint-driven fixes for unused bindings.
//!
//! Shells out to ESLint per file with `--format json`, collects the
//! unused-variable findings, and prefixes each reported identifier with
//! an underscore on its reported line. Findings are matched by rule id
//! first; message wording is only consulted when a finding carries no
//! rule id. Malformed tool output yields zero fixes, never an error.

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::rewrite::{is_external_module, is_reserved, SkippedFile};
use crate::utils::io;

/// Rule ids that report unused bindings.
const UNUSED_RULE_IDS: &[&str] = &[
    "no-unused-vars",
    "@typescript-eslint/no-unused-vars",
    "unused-imports/no-unused-vars",
];

/// Fallback phrases for findings that carry no rule id.
const UNUSED_MESSAGE_MARKERS: &[&str] = &[
    "is defined but never used",
    "is assigned a value but never used",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFileReport {
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<usize>,
}

/// One unused binding reported by the linter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedFinding {
    pub name: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// Fix record for a single checked file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFix {
    pub file: String,
    pub findings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefixed: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub applied: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintFixResult {
    pub files_checked: usize,
    pub total_findings: usize,
    pub total_fixes: usize,
    pub fixes: Vec<FileFix>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

/// Checks each file with ESLint and prefixes unused bindings in place.
///
/// A file where the tool itself crashes (exit code above 1, or killed)
/// is logged and skipped; the batch continues. Failure to spawn the
/// tool at all is an error, since no file could ever be checked.
pub fn fix_files(files: &[PathBuf], eslint: &str) -> Result<LintFixResult> {
    let mut result = LintFixResult::default();

    for path in files {
        let output = run_eslint(eslint, path)?;
        let exit_code = output.status.code().unwrap_or(-1);
        // ESLint exits 1 when it found problems; anything else is a crash.
        if exit_code != 0 && exit_code != 1 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log_status!("fix", "ESLint failed on {}: exit {}", path.display(), exit_code);
            result.skipped.push(SkippedFile {
                file: path.display().to_string(),
                reason: format!("eslint exited {}: {}", exit_code, stderr.trim()),
            });
            continue;
        }

        result.files_checked += 1;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let findings = parse_unused_findings(&stdout);
        result.total_findings += findings.len();
        if findings.is_empty() {
            continue;
        }

        let content = match io::read_file(path, "lint fix") {
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

        let mut current = content;
        let mut prefixed = Vec::new();
        for finding in &findings {
            if let Some(updated) = prefix_identifier(&current, &finding.name, finding.line) {
                current = updated;
                prefixed.push(finding.name.clone());
            }
        }

        let mut applied = false;
        if !prefixed.is_empty() {
            match io::write_file(path, &current, "lint fix") {
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

        result.total_fixes += prefixed.len();
        result.fixes.push(FileFix {
            file: path.display().to_string(),
            findings: findings.len(),
            prefixed,
            applied,
        });
    }

    Ok(result)
}

fn run_eslint(eslint: &str, file: &Path) -> Result<std::process::Output> {
    let mut parts = eslint.split_whitespace();
    let program = parts.next().ok_or_else(|| {
        Error::validation_invalid_argument("eslint", "command is empty", None, None)
    })?;

    let mut command = Command::new(program);
    command.args(parts);
    command.arg("--format").arg("json").arg(file);

    command.output().map_err(|e| {
        Error::lint_tool_failed(eslint, e.to_string())
            .with_hint("Install ESLint or pass --eslint with the command to run")
    })
}

/// Extracts unused-binding findings from `--format json` output. Output
/// that is not the expected JSON shape produces no findings.
fn parse_unused_findings(stdout: &str) -> Vec<UnusedFinding> {
    let reports: Vec<EslintFileReport> = match serde_json::from_str(stdout) {
        Ok(reports) => reports,
        Err(_) => return Vec::new(),
    };

    let name_pattern = Regex::new(r"'([A-Za-z_$][\w$]*)'").unwrap();
    let mut findings = Vec::new();
    for report in reports {
        for message in &report.messages {
            if !is_unused_finding(message) {
                continue;
            }
            let Some(line) = message.line else {
                continue;
            };
            let Some(caps) = name_pattern.captures(&message.message) else {
                continue;
            };
            findings.push(UnusedFinding {
                name: caps[1].to_string(),
                line,
                rule: message.rule_id.clone(),
            });
        }
    }
    findings
}

fn is_unused_finding(message: &EslintMessage) -> bool {
    match message.rule_id.as_deref() {
        Some(rule) => UNUSED_RULE_IDS.contains(&rule),
        None => UNUSED_MESSAGE_MARKERS
            .iter()
            .any(|marker| message.message.contains(marker)),
    }
}

/// Inserts `_` before the first occurrence of `name` on the given
/// 1-based line. Returns `None` when the name is exempt (already
/// prefixed, a generated type name, or part of an import from an
/// external package) or cannot be found on that line.
fn prefix_identifier(content: &str, name: &str, line: usize) -> Option<String> {
    if name.starts_with('_') || is_reserved(name) {
        return None;
    }

    let (start, end) = line_span(content, line)?;
    let line_text = &content[start..end];
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()?;
    let found = pattern.find(line_text)?;
    if in_external_import(content, start + found.start()) {
        return None;
    }

    let mut out = String::with_capacity(content.len() + 1);
    out.push_str(&content[..start + found.start()]);
    out.push('_');
    out.push_str(&content[start + found.start()..]);
    Some(out)
}

/// Byte span of a 1-based line, including its trailing newline.
fn line_span(content: &str, line: usize) -> Option<(usize, usize)> {
    if line == 0 {
        return None;
    }
    let mut start = 0;
    for (idx, text) in content.split_inclusive('\n').enumerate() {
        let end = start + text.len();
        if idx + 1 == line {
            return Some((start, end));
        }
        start = end;
    }
    None
}

/// True when the byte at `pos` sits inside an `import { ... } from '<m>'`
/// statement whose specifier is on the external allow-list. Import lists
/// can span lines, so the whole statement is matched, not one line.
fn in_external_import(content: &str, pos: usize) -> bool {
    let pattern =
        Regex::new(r#"\bimport\s+(type\s+)?\{[^}]*\}\s*from\s*['"]([^'"]+)['"]"#).unwrap();
    let inside = pattern.captures_iter(content).any(|caps| {
        let whole = caps.get(0).unwrap();
        whole.start() <= pos && pos < whole.end() && is_external_module(&caps[2])
    });
    inside
}
