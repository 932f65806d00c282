#![forbid(unsafe_code)]

use std::process::ExitCode;

use dt_cli::{CliError, Command, execute, help_text, init_logging, parse_args};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("deal-tracker error: {error}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), CliError> {
    let args = match parse_args(std::env::args().skip(1))? {
        Command::Help => {
            println!("{}", help_text());
            return Ok(());
        }
        Command::Run(args) => args,
    };

    init_logging()?;
    let output = execute(&args)?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
