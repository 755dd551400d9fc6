pub mod agents;
pub mod cli;
pub mod config;
pub mod errors;
pub mod llm;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod reporting;
pub mod tools;
pub mod utils;
