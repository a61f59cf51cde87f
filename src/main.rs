use std::path::PathBuf;
use std::process;

use clap::Parser;

mod shell;

/// B+ tree backed table storage with an interactive shell
#[derive(Parser)]
#[command(name = "bptdb", version)]
struct Cli {
    /// Directory holding persisted tables
    #[arg(default_value = "data")]
    db_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = shell::run(&cli.db_dir) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
