use std::io::SeekFrom;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use crate::errors::ReverieError;
use super::{ensure_readable, Tool, ToolArgs, ToolOutput, ToolRequest};

pub const DEFAULT_LENGTH: usize = 256;
const MAX_LENGTH: usize = 64 * 1024;

/// Raw bytes in the canonical hex+ASCII layout of `hexdump -C`.
pub struct Hexdump;

#[async_trait]
impl Tool for Hexdump {
    fn name(&self) -> &'static str {
        "hexdump"
    }

    fn default_args(&self) -> ToolArgs {
        ToolArgs::Hexdump { offset: 0, length: DEFAULT_LENGTH }
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError> {
        ensure_readable(&request.binary_path)?;
        let (offset, length) = match request.args {
            ToolArgs::Hexdump { offset, length } => (offset, length.min(MAX_LENGTH)),
            _ => (0, DEFAULT_LENGTH),
        };

        let mut file = tokio::fs::File::open(&request.binary_path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::with_capacity(length);
        file.take(length as u64).read_to_end(&mut buf).await?;

        Ok(ToolOutput::text(canonical_dump(&buf, offset)))
    }
}

/// Format `bytes` as `hexdump -C` would, with addresses starting at `base`.
///
/// Repeated identical lines collapse into a single `*`. The final line holds
/// the end offset.
pub fn canonical_dump(bytes: &[u8], base: u64) -> String {
    let mut lines = Vec::new();
    let mut previous: Option<&[u8]> = None;
    let mut squeezing = false;

    for (i, chunk) in bytes.chunks(16).enumerate() {
        let addr = base + (i * 16) as u64;
        if chunk.len() == 16 && previous == Some(chunk) {
            if !squeezing {
                lines.push("*".to_string());
                squeezing = true;
            }
            continue;
        }
        squeezing = false;
        previous = Some(chunk);
        lines.push(format_line(addr, chunk));
    }
    lines.push(format!("{:08x}", base + bytes.len() as u64));
    lines.join("\n")
}

fn format_line(addr: u64, chunk: &[u8]) -> String {
    let mut hex = String::with_capacity(49);
    for (i, b) in chunk.iter().enumerate() {
        if i == 8 {
            hex.push(' ');
        }
        hex.push_str(&format!("{:02x} ", b));
    }
    let ascii: String = chunk
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
        .collect();
    format!("{:08x}  {:<49} |{}|", addr, hex, ascii)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_line_layout() {
        let dump = canonical_dump(b"\x7fELF\x02\x01\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00", 0);
        let mut lines = dump.lines();
        assert_eq!(
            lines.next().unwrap(),
            "00000000  7f 45 4c 46 02 01 01 00  00 00 00 00 00 00 00 00  |.ELF............|"
        );
        assert_eq!(lines.next().unwrap(), "00000010");
    }

    #[test]
    fn test_partial_line_is_padded() {
        let dump = canonical_dump(b"hello", 0x20);
        assert_eq!(
            dump,
            "00000020  68 65 6c 6c 6f                                    |hello|\n00000025"
        );
    }

    #[test]
    fn test_repeated_lines_are_squeezed() {
        let dump = canonical_dump(&[0u8; 64], 0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "*");
        assert_eq!(lines[2], "00000040");
    }

    #[tokio::test]
    async fn test_reads_window_at_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789abcdefSECRET").unwrap();
        let req = ToolRequest {
            binary_path: file.path().to_path_buf(),
            args: ToolArgs::Hexdump { offset: 16, length: 6 },
        };
        let out = Hexdump.invoke(&req).await.unwrap().output.unwrap();
        assert!(out.starts_with("00000010  53 45 43 52 45 54"));
        assert!(out.contains("|SECRET|"));
        assert!(out.ends_with("00000016"));
    }
}
