const MAX_OUTPUT_LENGTH: usize = 15_000;
const MAX_ERROR_LENGTH: usize = 2_000;

/// Keep the head and tail of oversized tool output for oracle prompts.
pub fn truncate_output(output: &str) -> String {
    truncate_middle(output, MAX_OUTPUT_LENGTH)
}

pub fn truncate_middle(output: &str, max_len: usize) -> String {
    if output.len() <= max_len {
        return output.to_string();
    }
    let half = max_len / 2;
    let start = &output[..floor_char_boundary(output, half)];
    let end = &output[ceil_char_boundary(output, output.len() - half)..];
    format!(
        "{}\n\n... [truncated {} chars] ...\n\n{}",
        start,
        output.len() - start.len() - end.len(),
        end
    )
}

pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LENGTH {
        error.to_string()
    } else {
        format!("{}...", &error[..floor_char_boundary(error, MAX_ERROR_LENGTH)])
    }
}

/// Keep the first `max_lines` lines and append a truncation marker.
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let mut lines = text.lines();
    let kept: Vec<&str> = lines.by_ref().take(max_lines).collect();
    if lines.next().is_some() {
        format!("{}\n... (truncated)", kept.join("\n"))
    } else {
        kept.join("\n")
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
