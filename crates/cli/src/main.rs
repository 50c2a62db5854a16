use std::process::ExitCode;

fn main() -> ExitCode {
    stressless_cli::run()
}
