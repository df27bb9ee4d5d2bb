use std::process::ExitCode;

fn main() -> ExitCode {
    northwind_cli::run()
}
