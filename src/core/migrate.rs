//! SQL migration push to a hosted Postgres over its REST RPC endpoint.
//!
//! Statements are submitted through an `exec_sql` helper procedure.
//! Installing the helper is attempted best-effort through the same
//! endpoint before the real push; when the remote reports the procedure
//! missing, the push stops and surfaces the helper source to run by hand.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::core::config::JanitorConfig;
use crate::core::error::{Error, ErrorCode, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RPC route, relative to the project base URL.
const RPC_PATH: &str = "/rest/v1/rpc/exec_sql";

/// Environment variables consulted for the base URL when neither flag nor
/// config provides one.
const URL_ENV_VARS: &[&str] = &["SUPABASE_URL", "VITE_SUPABASE_URL"];

const HELPER_FUNCTION: &str = "exec_sql";

/// Error-body signatures PostgREST emits when the helper is not installed.
const HELPER_MISSING_MARKERS: &[&str] = &["PGRST202", "Could not find the function"];

/// Source for the helper procedure, also surfaced as the fix when the
/// remote reports it missing.
const HELPER_SOURCE: &str = "\
CREATE OR REPLACE FUNCTION exec_sql(sql text)
RETURNS void
LANGUAGE plpgsql
SECURITY DEFINER
AS $$
BEGIN
  EXECUTE sql;
END;
$$;";

/// Resolved endpoint, credential, and timeout for one push.
///
/// The service key never comes from flags or files: only from the
/// environment variable named by `--key-env` or the config.
#[derive(Debug, Clone)]
pub struct MigrationTarget {
    pub base_url: String,
    service_key: String,
    pub timeout_secs: u64,
}

impl MigrationTarget {
    pub fn resolve(
        url: Option<&str>,
        key_env: Option<&str>,
        timeout: Option<u64>,
        config: &JanitorConfig,
    ) -> Result<Self> {
        let base_url = url
            .map(str::to_string)
            .or_else(|| config.migration.url.clone())
            .or_else(|| {
                URL_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            })
            .ok_or_else(|| {
                Error::validation_missing_argument(vec!["--url".to_string()]).with_hint(
                    "Pass --url, set migration.url in janitor.json, or export SUPABASE_URL",
                )
            })?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let key_env_name = key_env
            .map(str::to_string)
            .unwrap_or_else(|| config.migration.key_env.clone());
        let service_key = std::env::var(&key_env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::config_missing_key(key_env_name.clone(), None).with_hint(format!(
                    "Export {} with the service role key",
                    key_env_name
                ))
            })?;

        let timeout_secs = match timeout {
            Some(0) => {
                return Err(Error::validation_invalid_argument(
                    "timeout",
                    "must be at least 1 second",
                    None,
                    None,
                ))
            }
            Some(secs) => secs,
            None if config.migration.timeout_secs == 0 => {
                return Err(Error::config_invalid_value(
                    "migration.timeoutSecs",
                    Some("0".to_string()),
                    "must be at least 1 second",
                ))
            }
            None => config.migration.timeout_secs,
        };

        Ok(Self {
            base_url,
            service_key,
            timeout_secs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    Whole,
    Statements,
}

/// A statement that failed, with its zero-based position in the script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementOutcome {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub file: String,
    pub mode: PushMode,
    pub statements_total: usize,
    pub statements_succeeded: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StatementOutcome>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub helper_missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// Splits a script into statements: comment-only lines are dropped, the
/// rest is cut on `;`. Deliberately naive — semicolons inside string
/// literals or procedure bodies are not understood, which is why whole
/// mode is the default.
pub fn split_statements(sql: &str) -> Vec<String> {
    let without_comments = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pushes `sql` to the target, either as one blob or statement by
/// statement. Per-statement failures in split mode are logged and
/// counted without stopping the rest.
pub fn push_sql(
    file: &str,
    sql: &str,
    target: &MigrationTarget,
    split: bool,
) -> Result<PushResult> {
    if sql.trim().is_empty() {
        return Err(Error::validation_invalid_argument(
            "file",
            "contains no SQL",
            Some(file.to_string()),
            None,
        ));
    }

    if split {
        let statements = split_statements(sql);
        if statements.is_empty() {
            return Err(Error::validation_invalid_argument(
                "file",
                "contains only comments",
                Some(file.to_string()),
                None,
            ));
        }

        let client = build_client(target.timeout_secs)?;
        install_helper(&client, target);
        return push_statements(&client, target, file, &statements);
    }

    let client = build_client(target.timeout_secs)?;
    install_helper(&client, target);
    push_whole(&client, target, file, sql)
}

fn push_whole(
    client: &reqwest::blocking::Client,
    target: &MigrationTarget,
    file: &str,
    sql: &str,
) -> Result<PushResult> {
    match rpc_exec(client, target, sql) {
        Ok(response) => Ok(PushResult {
            file: file.to_string(),
            mode: PushMode::Whole,
            statements_total: 1,
            statements_succeeded: 1,
            failures: Vec::new(),
            helper_missing: false,
            response: Some(response),
        }),
        Err(e) if is_helper_missing(&e) => Err(helper_missing_error()),
        Err(e) => Err(e),
    }
}

fn push_statements(
    client: &reqwest::blocking::Client,
    target: &MigrationTarget,
    file: &str,
    statements: &[String],
) -> Result<PushResult> {
    let mut result = PushResult {
        file: file.to_string(),
        mode: PushMode::Statements,
        statements_total: statements.len(),
        statements_succeeded: 0,
        failures: Vec::new(),
        helper_missing: false,
        response: None,
    };

    for (index, statement) in statements.iter().enumerate() {
        match rpc_exec(client, target, statement) {
            Ok(_) => result.statements_succeeded += 1,
            Err(e) if is_helper_missing(&e) => {
                // Every remaining statement would fail the same way.
                log_status!(
                    "migrate",
                    "exec_sql helper unavailable; stopping after statement {}",
                    index + 1
                );
                result.helper_missing = true;
                result.failures.push(StatementOutcome {
                    index,
                    error: outcome_error(&e),
                });
                break;
            }
            Err(e) => {
                log_status!("migrate", "Statement {} failed: {}", index + 1, e);
                result.failures.push(StatementOutcome {
                    index,
                    error: outcome_error(&e),
                });
            }
        }
    }

    if result.helper_missing && result.statements_succeeded == 0 {
        return Err(helper_missing_error());
    }

    Ok(result)
}

fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(format!("janitor/{}", VERSION))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))
}

/// One call to the `exec_sql` RPC. Transport problems and non-2xx
/// statuses come back as distinct error codes; the response body rides
/// along in the error details for inspection.
fn rpc_exec(
    client: &reqwest::blocking::Client,
    target: &MigrationTarget,
    sql: &str,
) -> Result<Value> {
    let url = format!("{}{}", target.base_url, RPC_PATH);

    let response = client
        .post(&url)
        .header("apikey", target.service_key.as_str())
        .bearer_auth(&target.service_key)
        .json(&serde_json::json!({ "sql": sql }))
        .send()
        .map_err(|e| Error::remote_transport(e.to_string(), Some(format!("POST {}", url))))?;

    let status = response.status();
    let body = response.text().map_err(|e| {
        Error::remote_transport(e.to_string(), Some(format!("read response from {}", url)))
    })?;

    if !status.is_success() {
        return Err(Error::remote_http(
            status.as_u16(),
            body,
            Some(format!("POST {}", url)),
        ));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

fn install_helper(client: &reqwest::blocking::Client, target: &MigrationTarget) {
    if let Err(e) = rpc_exec(client, target, HELPER_SOURCE) {
        log_status!("migrate", "Helper install attempt failed: {}", e);
    }
}

fn is_helper_missing(err: &Error) -> bool {
    if err.code != ErrorCode::RemoteHttpError {
        return false;
    }
    let body = err
        .details
        .get("body")
        .and_then(Value::as_str)
        .unwrap_or_default();
    HELPER_MISSING_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}

fn helper_missing_error() -> Error {
    Error::migration_helper_missing(HELPER_FUNCTION, HELPER_SOURCE)
        .with_hint("Create the helper in the SQL editor, then push again")
}

fn outcome_error(e: &Error) -> String {
    match e.details.get("body").and_then(Value::as_str) {
        Some(body) if !body.trim().is_empty() => format!("{}: {}", e, snippet(body)),
        _ => e.to_string(),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(200).collect();
        s.push_str("...");
        s
    }
}
