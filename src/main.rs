use std::process::ExitCode;

use clap::Parser;
use paintfe_engine::cli::{self, CliArgs};

fn main() -> ExitCode {
    cli::run(CliArgs::parse())
}
