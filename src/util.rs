/// Format seconds as `m:ss`
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Split code into display lines, preserving indentation
pub fn code_lines(code: &str) -> Vec<&str> {
    code.split('\n').collect()
}
