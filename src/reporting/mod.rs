pub mod formatter;

pub use formatter::{format_final_report, status_label};
