use clap::Parser;

use panelmask::{cli, logger};

fn main() -> std::process::ExitCode {
    let args = cli::CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    match &args.log_file {
        Some(path) => logger::init_at(path),
        None => logger::init(),
    }
    logger::set_echo(args.verbose);

    cli::run(args)
}
