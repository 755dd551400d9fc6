use std::sync::LazyLock;
use regex::Regex;

// CSI sequences, OSC sequences terminated by BEL or ST, and lone two-byte escapes.
static ANSI_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").ok()
});

/// Remove terminal escape sequences and carriage returns from a transcript.
pub fn clean_terminal_output(text: &str) -> String {
    let stripped = match ANSI_RE.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => text.into(),
    };
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}
