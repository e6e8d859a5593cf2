pub type CmdResult<T> = janitor::Result<(T, i32)>;

pub mod fix;
pub mod migrate;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (janitor::Result<serde_json::Value>, i32) {
    crate::tty::status("janitor is working...");

    match command {
        crate::Commands::Fix(args) => dispatch!(args, fix),
        crate::Commands::Migrate(args) => dispatch!(args, migrate),
    }
}
