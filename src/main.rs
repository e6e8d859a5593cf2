use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{fix, migrate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "janitor")]
#[command(version = VERSION)]
#[command(about = "Maintenance CLI for TypeScript codebases backed by a hosted database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Codebase cleanup fixes
    Fix(fix::FixArgs),
    /// Database migration operations
    Migrate(migrate::MigrateArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
