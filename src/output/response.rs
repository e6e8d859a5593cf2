//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use janitor::error::Hint;
use janitor::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

fn print_success<T: Serialize>(data: T) -> Result<()> {
    print_response(&CliResponse::success(data))
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ConfigMissingKey
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::LintToolFailed
        | ErrorCode::MigrationHelperMissing
        | ErrorCode::RemoteHttpError
        | ErrorCode::RemoteTransportError
        | ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_success(data),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_exit_2() {
        let err = Error::validation_missing_argument(vec!["--url".to_string()]);
        let (result, exit_code) = map_cmd_result_to_json::<()>(Err(err));
        assert!(result.is_err());
        assert_eq!(exit_code, 2);
    }

    #[test]
    fn remote_errors_exit_1() {
        let err = Error::remote_http(500, "boom", None);
        let (_, exit_code) = map_cmd_result_to_json::<()>(Err(err));
        assert_eq!(exit_code, 1);

        let err = Error::migration_helper_missing("exec_sql", "CREATE OR REPLACE ...");
        let (_, exit_code) = map_cmd_result_to_json::<()>(Err(err));
        assert_eq!(exit_code, 1);
    }

    #[test]
    fn success_keeps_the_command_exit_code() {
        let (result, exit_code) = map_cmd_result_to_json(Ok(("done", 0)));
        assert_eq!(result.unwrap(), serde_json::json!("done"));
        assert_eq!(exit_code, 0);
    }

    #[test]
    fn error_envelope_carries_code_and_hints() {
        let err = Error::remote_transport("timed out", None).with_hint("Check the network");
        let response = CliResponse::<()>::from_error(&err);
        assert!(!response.success);
        let cli_error = response.error.unwrap();
        assert_eq!(cli_error.code, "remote.transport_error");
        assert_eq!(cli_error.retryable, Some(true));
        assert_eq!(cli_error.hints.unwrap().len(), 1);
    }
}
