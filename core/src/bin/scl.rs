/// SCL command line
///
/// Freezes a parsed step tree (JSON), verifies its requirements and runs it.
use scl_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
