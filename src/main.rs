use clap::Parser;
use coinadvisor::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
