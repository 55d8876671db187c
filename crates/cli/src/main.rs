use std::process::ExitCode;

fn main() -> ExitCode {
    voicedesk_cli::run()
}
