use std::process::ExitCode;

fn main() -> ExitCode {
    careon_cli::run()
}
