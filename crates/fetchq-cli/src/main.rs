use fetchq_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Never fails: falls back to stderr when the log file is unavailable.
    logging::init_logging();

    let code = match CliCommand::run_from_args().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("fetchq error: {:#}", err);
            1
        }
    };
    // Abandoned downloads may still hold blocking threads; exit without joining them.
    std::process::exit(code);
}
