use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use crate::tools::ToolRequest;
use super::plan::Plan;

/// The single record threaded through every phase of the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisState {
    pub run_id: String,
    pub target: TargetInfo,
    pub goal: Goal,
    pub hypotheses: Vec<Hypothesis>,
    pub observations: Observations,
    pub artifacts: Artifacts,
    pub plan: Plan,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub blockers: Vec<Blocker>,
    pub confidence: Confidence,
    pub termination: Termination,
    /// Completed critique passes.
    pub cycle: u32,
    /// Index of the newest log entry Observe has already consumed.
    pub observed_through: Option<usize>,
    pub started_at: DateTime<Utc>,
}

impl AnalysisState {
    pub fn new(binary_path: PathBuf, objective: &str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            target: TargetInfo::new(binary_path),
            goal: Goal {
                primary_objective: objective.to_string(),
                sub_goals: Vec::new(),
            },
            hypotheses: Vec::new(),
            observations: Observations::default(),
            artifacts: Artifacts::default(),
            plan: Plan::default(),
            execution_log: Vec::new(),
            blockers: Vec::new(),
            confidence: Confidence::default(),
            termination: Termination::default(),
            cycle: 0,
            observed_through: None,
            started_at: Utc::now(),
        }
    }

    pub fn last_log_entry(&self) -> Option<&ExecutionLogEntry> {
        self.execution_log.last()
    }

    /// Short digest of what is known so far, used to seed oracle prompts.
    pub fn findings_summary(&self, max_strings: usize) -> String {
        let mut summary = String::new();
        if !self.observations.strings.is_empty() {
            let values: Vec<&str> = self.observations.strings.iter()
                .take(max_strings)
                .map(|s| s.value.as_str())
                .collect();
            summary.push_str(&format!(
                "Strings found ({}): {}",
                self.observations.strings.len(),
                values.join(", ")
            ));
        }
        if !self.observations.code.is_empty() {
            if !summary.is_empty() { summary.push('\n'); }
            summary.push_str(&format!("Functions found: {}", self.observations.code.len()));
        }
        if !self.artifacts.notes.is_empty() {
            if !summary.is_empty() { summary.push('\n'); }
            summary.push_str(&format!("Notes: {}", self.artifacts.notes.join("; ")));
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BinaryType {
    #[serde(rename = "ELF")]
    Elf,
    #[serde(rename = "PE")]
    Pe,
    #[serde(rename = "Mach-O")]
    MachO,
    #[default]
    Unknown,
}

impl BinaryType {
    /// Map a free-form format label ("ELF 64-bit", "pe32+", "mach-o") to a known type.
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        if lower.starts_with("elf") {
            Self::Elf
        } else if lower.starts_with("mach") {
            Self::MachO
        } else if lower.starts_with("pe") || lower.contains("ms-dos") || lower.contains("portable executable") {
            Self::Pe
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elf => "ELF",
            Self::Pe => "PE",
            Self::MachO => "Mach-O",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for BinaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub binary_path: PathBuf,
    pub binary_type: BinaryType,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub stripped: Option<bool>,
    pub protections: Vec<String>,
    pub entrypoint: Option<u64>,
}

impl TargetInfo {
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            binary_type: BinaryType::Unknown,
            arch: None,
            os: None,
            stripped: None,
            protections: Vec::new(),
            entrypoint: None,
        }
    }

    /// Overwrite only the fields present in `update`.
    pub fn enrich(&mut self, update: &TargetUpdate) {
        if let Some(label) = &update.binary_type {
            let parsed = BinaryType::from_label(label);
            if parsed != BinaryType::Unknown {
                self.binary_type = parsed;
            }
        }
        if let Some(arch) = update.arch.as_ref().filter(|a| !a.trim().is_empty()) {
            self.arch = Some(arch.clone());
        }
        if let Some(os) = update.os.as_ref().filter(|o| !o.trim().is_empty()) {
            self.os = Some(os.clone());
        }
        if let Some(stripped) = update.stripped {
            self.stripped = Some(stripped);
        }
        if let Some(protections) = update.protections.as_ref().filter(|p| !p.is_empty()) {
            self.protections = protections.clone();
        }
        if let Some(entry) = update.entrypoint {
            self.entrypoint = Some(entry);
        }
    }
}

/// Partial TargetInfo reported by the observation oracle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetUpdate {
    #[serde(default)]
    pub binary_type: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub stripped: Option<bool>,
    #[serde(default)]
    pub protections: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_opt_address")]
    pub entrypoint: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub primary_objective: String,
    pub sub_goals: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisStatus {
    Active,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub claim: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub status: HypothesisStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringObservation {
    pub value: String,
    #[serde(default, deserialize_with = "de_address")]
    pub offset: u64,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeObservation {
    #[serde(default, deserialize_with = "de_address")]
    pub function_addr: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "de_address_list")]
    pub calls: Vec<u64>,
    #[serde(default, deserialize_with = "de_address_list")]
    pub xrefs: Vec<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeObservation {
    #[serde(default)]
    pub breakpoint: String,
    #[serde(default, deserialize_with = "de_register_map")]
    pub registers: BTreeMap<String, u64>,
    #[serde(default)]
    pub memory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observations {
    #[serde(default)]
    pub strings: Vec<StringObservation>,
    #[serde(default)]
    pub code: Vec<CodeObservation>,
    #[serde(default)]
    pub runtime: Vec<RuntimeObservation>,
}

impl Observations {
    pub fn extend(&mut self, other: Observations) {
        self.strings.extend(other.strings);
        self.code.extend(other.code);
        self.runtime.extend(other.runtime);
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.code.is_empty() && self.runtime.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default)]
    pub decoded_strings: Vec<String>,
    #[serde(default)]
    pub extracted_keys: Vec<String>,
    #[serde(default)]
    pub decrypted_payloads: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Artifacts {
    pub fn extend(&mut self, other: Artifacts) {
        self.decoded_strings.extend(other.decoded_strings);
        self.extracted_keys.extend(other.extracted_keys);
        self.decrypted_payloads.extend(other.decrypted_payloads);
        self.notes.extend(other.notes);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub step_id: u32,
    pub action: String,
    pub tool: String,
    pub status: StepStatus,
    /// Position of the execution log entry produced for this step.
    pub result_ref: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub step_id: u32,
    pub tool: String,
    pub input: ToolRequest,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Arguments came from the structural fallback rather than the oracle.
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    #[serde(rename = "type")]
    pub blocker_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Confidence {
    pub understanding_level: f64,
    pub unanswered_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Termination {
    pub satisfied: bool,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Number(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl RawAddress {
    /// Negative, fractional and unparsable values resolve to `None`.
    fn resolve(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Signed(n) => u64::try_from(n).ok(),
            Self::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
                Some(f as u64)
            }
            Self::Float(_) => None,
            Self::Text(s) => parse_address(&s),
        }
    }
}

/// Parse "0x401000", "401000h" or "4198400" into an address.
pub fn parse_address(text: &str) -> Option<u64> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = t.strip_suffix('h') {
        return u64::from_str_radix(hex, 16).ok();
    }
    t.parse::<u64>().ok()
}

fn de_address<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let raw = Option::<RawAddress>::deserialize(d)?;
    Ok(raw.and_then(RawAddress::resolve).unwrap_or(0))
}

fn de_opt_address<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<RawAddress>::deserialize(d)?;
    Ok(raw.and_then(RawAddress::resolve))
}

fn de_address_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u64>, D::Error> {
    let raw = Option::<Vec<RawAddress>>::deserialize(d)?;
    Ok(raw.unwrap_or_default().into_iter().filter_map(RawAddress::resolve).collect())
}

fn de_register_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, u64>, D::Error> {
    let raw = Option::<BTreeMap<String, RawAddress>>::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.resolve().map(|v| (k, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_type_from_label() {
        assert_eq!(BinaryType::from_label("ELF"), BinaryType::Elf);
        assert_eq!(BinaryType::from_label("ELF 64-bit LSB executable"), BinaryType::Elf);
        assert_eq!(BinaryType::from_label("PE32+"), BinaryType::Pe);
        assert_eq!(BinaryType::from_label("Mach-O"), BinaryType::MachO);
        assert_eq!(BinaryType::from_label("data"), BinaryType::Unknown);
    }

    #[test]
    fn test_binary_type_serde_labels() {
        assert_eq!(serde_json::to_string(&BinaryType::MachO).unwrap(), "\"Mach-O\"");
        let parsed: BinaryType = serde_json::from_str("\"ELF\"").unwrap();
        assert_eq!(parsed, BinaryType::Elf);
    }

    #[test]
    fn test_enrich_only_touches_reported_fields() {
        let mut target = TargetInfo::new(PathBuf::from("/bin/true"));
        target.arch = Some("x86_64".into());
        target.os = Some("linux".into());

        target.enrich(&TargetUpdate {
            binary_type: Some("ELF".into()),
            stripped: Some(true),
            ..Default::default()
        });

        assert_eq!(target.binary_type, BinaryType::Elf);
        assert_eq!(target.stripped, Some(true));
        assert_eq!(target.arch.as_deref(), Some("x86_64"));
        assert_eq!(target.os.as_deref(), Some("linux"));
    }

    #[test]
    fn test_enrich_ignores_unknown_format_label() {
        let mut target = TargetInfo::new(PathBuf::from("/bin/true"));
        target.binary_type = BinaryType::Elf;
        target.enrich(&TargetUpdate {
            binary_type: Some("unknown".into()),
            ..Default::default()
        });
        assert_eq!(target.binary_type, BinaryType::Elf);
    }

    #[test]
    fn test_observations_accept_hex_and_numeric_addresses() {
        let json = r#"{
            "strings": [{"value": "flag{", "offset": "0x2004"}],
            "code": [{"function_addr": 4198400, "summary": "main", "calls": ["0x401020", 16], "xrefs": null}],
            "runtime": [{"breakpoint": "main", "registers": {"rip": "0x401000", "rax": 0}}]
        }"#;
        let obs: Observations = serde_json::from_str(json).unwrap();
        assert_eq!(obs.strings[0].offset, 0x2004);
        assert_eq!(obs.code[0].function_addr, 4198400);
        assert_eq!(obs.code[0].calls, vec![0x401020, 16]);
        assert!(obs.code[0].xrefs.is_empty());
        assert_eq!(obs.runtime[0].registers["rip"], 0x401000);
    }

    #[test]
    fn test_out_of_range_addresses_do_not_reject_the_record() {
        let obs: Observations = serde_json::from_value(serde_json::json!({
            "strings": [
                {"value": "Enter password:", "offset": -1},
                {"value": "Granted", "offset": 12.5},
                {"value": "Denied", "offset": 4096.0}
            ],
            "code": [{"function_addr": -4198400, "calls": [-1, "0x401000", 1.5]}],
            "runtime": [{"breakpoint": "main", "registers": {"rax": -1, "rip": 4198400}}]
        }))
        .unwrap();
        let offsets: Vec<u64> = obs.strings.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 0, 4096]);
        assert_eq!(obs.code[0].function_addr, 0);
        assert_eq!(obs.code[0].calls, vec![0x401000]);
        assert_eq!(obs.runtime[0].registers.len(), 1);
        assert_eq!(obs.runtime[0].registers["rip"], 4198400);

        let update: TargetUpdate = serde_json::from_value(serde_json::json!({"entrypoint": -16})).unwrap();
        assert_eq!(update.entrypoint, None);
    }

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(parse_address("0x10"), Some(16));
        assert_eq!(parse_address("10h"), Some(16));
        assert_eq!(parse_address("10"), Some(10));
        assert_eq!(parse_address("main"), None);
    }

    #[test]
    fn test_findings_summary_lists_strings_and_notes() {
        let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "find the secret");
        state.observations.strings.push(StringObservation {
            value: "Enter password:".into(),
            ..Default::default()
        });
        state.artifacts.notes.push("prompts for a password".into());
        let summary = state.findings_summary(20);
        assert!(summary.contains("Strings found (1): Enter password:"));
        assert!(summary.contains("Notes: prompts for a password"));
    }

    #[test]
    fn test_blocker_serializes_type_field() {
        let b = Blocker { blocker_type: "anti-debug".into(), description: "ptrace check".into() };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["type"], "anti-debug");
    }
}
