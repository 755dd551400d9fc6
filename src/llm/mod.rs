pub mod provider;
pub mod groq;
pub mod gemini;
pub mod json;
pub mod resilient;
pub mod router;
pub mod scripted;
pub mod types;

pub use provider::LLMProvider;
pub use resilient::ResilientOracle;
pub use router::{create_provider, OracleConfig};
pub use scripted::ScriptedProvider;
pub use types::{LLMResponse, ProviderFamily};
