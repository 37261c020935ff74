use std::io;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use sigma_test::{RunOptions, run};

#[derive(Parser)]
#[command(name = "sigma-test")]
#[command(about = "Test Sigma rules against the example events stored next to them")]
#[command(version)]
struct Cli {
    /// Rule files or directories to test
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories of each path
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    recursive: bool,

    /// Glob pattern selecting backend config files
    #[arg(long, value_name = "GLOB")]
    config_files: Option<String>,
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        RunOptions {
            paths: cli.paths,
            recursive: cli.recursive,
            config_pattern: cli.config_files,
        }
    }
}

fn main() {
    env_logger::init();
    let options = RunOptions::from(Cli::parse());

    match run(&options, io::stdout().lock()) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
