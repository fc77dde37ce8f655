//! wsgi_release - release orchestration for a small Python package.
//!
//! Runs the requested operations and their prerequisites, then exits with the
//! status of the failing command (or 0).

use std::process;
use wsgi_release::cli;
use wsgi_release::cli::OutputManager;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Fatal errors are never silenced
            let output = OutputManager::new(false, false);
            let heading = if e.is_configuration_error() {
                "Configuration error"
            } else {
                "Fatal error"
            };
            output.error(&format!("{heading}: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&suggestion);
                }
            }

            process::exit(e.exit_code());
        }
    }
}
