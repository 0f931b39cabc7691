//! `ci-analytics` binary entry point.

use std::process::ExitCode;

use clap::Parser;

use ci_analytics::cli_app::{Cli, run};

fn main() -> ExitCode {
    let cli = Cli::parse();
    ci_analytics::logger::init();
    run(&cli)
}
