use async_trait::async_trait;
use crate::errors::ReverieError;
use crate::utils::truncation::truncate_lines;
use super::{ensure_readable, Tool, ToolArgs, ToolOutput, ToolRequest};

pub const DEFAULT_MIN_LEN: usize = 4;
pub const DEFAULT_MAX_LINES: usize = 500;

/// Printable ASCII runs, one per line, like `strings -n <min_len>`.
pub struct StringsScanner {
    min_len: usize,
    max_lines: usize,
}

impl Default for StringsScanner {
    fn default() -> Self {
        Self { min_len: DEFAULT_MIN_LEN, max_lines: DEFAULT_MAX_LINES }
    }
}

impl StringsScanner {
    pub fn new(min_len: usize, max_lines: usize) -> Self {
        Self { min_len: min_len.max(1), max_lines }
    }
}

#[async_trait]
impl Tool for StringsScanner {
    fn name(&self) -> &'static str {
        "strings"
    }

    fn default_args(&self) -> ToolArgs {
        ToolArgs::Strings { min_len: self.min_len }
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError> {
        ensure_readable(&request.binary_path)?;
        let min_len = match request.args {
            ToolArgs::Strings { min_len } => min_len.max(1),
            _ => self.min_len,
        };
        let bytes = tokio::fs::read(&request.binary_path).await?;
        let found = extract_strings(&bytes, min_len);
        Ok(ToolOutput::text(truncate_lines(&found.join("\n"), self.max_lines)))
    }
}

/// Runs of printable ASCII (plus tab) at least `min_len` bytes long.
pub fn extract_strings(bytes: &[u8], min_len: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut current = Vec::new();
    for &b in bytes {
        if b == b'\t' || (0x20..0x7f).contains(&b) {
            current.push(b);
            continue;
        }
        if current.len() >= min_len {
            found.push(String::from_utf8_lossy(&current).into_owned());
        }
        current.clear();
    }
    if current.len() >= min_len {
        found.push(String::from_utf8_lossy(&current).into_owned());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extract_respects_min_len() {
        let data = b"\x00abc\x00abcd\x01Enter password: \xffxy";
        assert_eq!(extract_strings(data, 4), vec!["abcd", "Enter password: "]);
        assert_eq!(extract_strings(data, 3), vec!["abc", "abcd", "Enter password: "]);
    }

    #[test]
    fn test_trailing_run_is_kept() {
        assert_eq!(extract_strings(b"\x00tail", 4), vec!["tail"]);
    }

    #[tokio::test]
    async fn test_output_capped_with_marker() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..600 {
            write!(file, "line{:04}\0", i).unwrap();
        }
        let req = ToolRequest {
            binary_path: file.path().to_path_buf(),
            args: ToolArgs::Strings { min_len: 4 },
        };
        let out = StringsScanner::default().invoke(&req).await.unwrap().output.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 501);
        assert_eq!(lines[0], "line0000");
        assert_eq!(lines[499], "line0499");
        assert_eq!(lines[500], "... (truncated)");
    }
}
