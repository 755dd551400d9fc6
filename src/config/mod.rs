pub mod parser;
pub mod resolve;
pub mod schema;
pub mod types;

pub use types::*;
pub use parser::{parse_config, parse_config_str};
pub use resolve::{resolve, Overrides, Settings};
