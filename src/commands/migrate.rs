use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use janitor::config::JanitorConfig;
use janitor::migrate::{self, MigrationTarget, PushResult};
use janitor::utils::io;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct MigrateArgs {
    #[command(subcommand)]
    command: MigrateCommand,
}

#[derive(Subcommand)]
enum MigrateCommand {
    /// Push a local SQL file to the hosted database's exec_sql endpoint
    Push {
        /// SQL file to push
        file: String,
        /// Project base URL (defaults to config, then SUPABASE_URL)
        #[arg(long)]
        url: Option<String>,
        /// Environment variable holding the service role key
        #[arg(long)]
        key_env: Option<String>,
        /// Push statement by statement instead of as one blob
        #[arg(long)]
        split: bool,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum MigrateOutput {
    #[serde(rename = "migrate.push")]
    Push {
        url: String,
        #[serde(flatten)]
        result: PushResult,
    },
}

pub fn run_json(args: MigrateArgs) -> CmdResult<MigrateOutput> {
    match args.command {
        MigrateCommand::Push {
            file,
            url,
            key_env,
            split,
            timeout,
        } => run_push(&file, url.as_deref(), key_env.as_deref(), split, timeout),
    }
}

fn run_push(
    file: &str,
    url: Option<&str>,
    key_env: Option<&str>,
    split: bool,
    timeout: Option<u64>,
) -> CmdResult<MigrateOutput> {
    let config = JanitorConfig::load(Path::new("."))?;
    let target = MigrationTarget::resolve(url, key_env, timeout, &config)?;

    let expanded = shellexpand::tilde(file);
    let path = PathBuf::from(expanded.as_ref());
    if !path.exists() {
        return Err(janitor::Error::validation_invalid_argument(
            "file",
            "file does not exist",
            Some(file.to_string()),
            None,
        ));
    }
    let sql = io::read_file(&path, "load migration")?;

    let result = migrate::push_sql(file, &sql, &target, split)?;

    let exit_code = if result.statements_succeeded == 0 { 1 } else { 0 };

    Ok((
        MigrateOutput::Push {
            url: target.base_url.clone(),
            result,
        },
        exit_code,
    ))
}
