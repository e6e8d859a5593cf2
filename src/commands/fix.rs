use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use janitor::config::JanitorConfig;
use janitor::lint_fix::{self, LintFixResult};
use janitor::rewrite::{self, RewriteResult};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct FixArgs {
    #[command(subcommand)]
    command: FixCommand,
}

#[derive(Subcommand)]
enum FixCommand {
    /// Strip leftover underscore prefixes from imports, destructuring, and member access
    Underscores {
        /// Files or directories to rewrite (defaults to configured roots)
        paths: Vec<String>,
        /// Only rewrite files whose relative path matches this glob
        #[arg(long)]
        glob: Option<String>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Underscore-prefix identifiers the linter reports as unused
    Unused {
        /// Files to check and fix
        #[arg(required = true)]
        files: Vec<String>,
        /// Lint command to run (receives `--format json <file>`)
        #[arg(long, default_value = "npx eslint")]
        eslint: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum FixOutput {
    #[serde(rename = "fix.underscores")]
    Underscores {
        roots: Vec<String>,
        dry_run: bool,
        #[serde(flatten)]
        result: RewriteResult,
    },

    #[serde(rename = "fix.unused")]
    Unused {
        eslint: String,
        #[serde(flatten)]
        result: LintFixResult,
    },
}

pub fn run_json(args: FixArgs) -> CmdResult<FixOutput> {
    match args.command {
        FixCommand::Underscores {
            paths,
            glob,
            dry_run,
        } => run_underscores(&paths, glob.as_deref(), dry_run),
        FixCommand::Unused { files, eslint } => run_unused(&files, &eslint),
    }
}

fn run_underscores(paths: &[String], glob: Option<&str>, dry_run: bool) -> CmdResult<FixOutput> {
    let explicit = !paths.is_empty();
    let roots = if explicit {
        paths.to_vec()
    } else {
        JanitorConfig::load(Path::new("."))?.roots
    };

    let mut resolved = Vec::new();
    for root in &roots {
        let expanded = shellexpand::tilde(root);
        let path = PathBuf::from(expanded.as_ref());
        // Configured roots may be absent in a given checkout; paths the
        // user typed must exist.
        if explicit && !path.exists() {
            return Err(janitor::Error::validation_invalid_argument(
                "paths",
                "path does not exist",
                Some(root.clone()),
                None,
            ));
        }
        resolved.push(path);
    }

    let result = rewrite::rewrite_all(&resolved, glob, !dry_run);

    Ok((
        FixOutput::Underscores {
            roots,
            dry_run,
            result,
        },
        0,
    ))
}

fn run_unused(files: &[String], eslint: &str) -> CmdResult<FixOutput> {
    let mut resolved = Vec::new();
    for file in files {
        let expanded = shellexpand::tilde(file);
        let path = PathBuf::from(expanded.as_ref());
        if !path.exists() {
            return Err(janitor::Error::validation_invalid_argument(
                "files",
                "file does not exist",
                Some(file.clone()),
                None,
            ));
        }
        resolved.push(path);
    }

    let result = lint_fix::fix_files(&resolved, eslint)?;

    Ok((
        FixOutput::Unused {
            eslint: eslint.to_string(),
            result,
        },
        0,
    ))
}
