use std::process::ExitCode;

fn main() -> ExitCode {
    dabini_cli::run()
}
