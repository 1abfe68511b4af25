pub mod app;

use app::cli::run_cli;

pub fn run() -> i32 {
    run_cli()
}
