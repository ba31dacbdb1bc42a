//! GitHub Actions workflow commands.

/// Marks the step as failed with `message`.
pub fn set_failed(message: &str) {
    println!("{}", error_command(message));
}

fn error_command(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
