use serde::{Deserialize, Serialize};

/// Optional YAML configuration. Every section and field may be omitted.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ReverieConfig {
    pub oracle: Option<OracleSection>,
    pub execution: Option<ExecutionSection>,
    pub analysis: Option<AnalysisSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OracleSection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExecutionSection {
    pub timeout_secs: Option<u64>,
    pub debugger_timeout_secs: Option<u64>,
    pub max_payload_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnalysisSection {
    pub max_cycles: Option<u32>,
    pub strings_min_len: Option<usize>,
    pub strings_max_lines: Option<usize>,
    pub prompts_dir: Option<String>,
}
