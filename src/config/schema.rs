use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "oracle": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string", "enum": ["groq", "gemini", "google"] },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" },
                    "max_retries": { "type": "integer", "minimum": 0, "maximum": 10 }
                }
            },
            "execution": {
                "type": "object",
                "properties": {
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "debugger_timeout_secs": { "type": "integer", "minimum": 1 },
                    "max_payload_bytes": { "type": "integer", "minimum": 1, "maximum": 4096 }
                }
            },
            "analysis": {
                "type": "object",
                "properties": {
                    "max_cycles": { "type": "integer", "minimum": 1 },
                    "strings_min_len": { "type": "integer", "minimum": 1 },
                    "strings_max_lines": { "type": "integer", "minimum": 1 },
                    "prompts_dir": { "type": "string" }
                }
            }
        }
    })
});
