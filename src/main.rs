use std::process::ExitCode;

fn main() -> ExitCode {
    db_manager_lib::run()
}
