use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::process::InteractiveRunner;
use super::debugger::Debugger;
use super::file_probe::FileProbe;
use super::hexdump::Hexdump;
use super::run_binary::RunBinary;
use super::strings::{StringsScanner, DEFAULT_MAX_LINES, DEFAULT_MIN_LEN};
use super::Tool;

/// Knobs for the built-in tool set.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub strings_min_len: usize,
    pub strings_max_lines: usize,
    pub exec_timeout: Duration,
    pub max_payload_bytes: usize,
    pub debugger_timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            strings_min_len: DEFAULT_MIN_LEN,
            strings_max_lines: DEFAULT_MAX_LINES,
            exec_timeout: crate::process::interactive::DEFAULT_TIMEOUT,
            max_payload_bytes: crate::process::MAX_PAYLOAD_BYTES,
            debugger_timeout: super::debugger::DEFAULT_TIMEOUT,
        }
    }
}

/// Capability name → handler.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The five built-in capabilities.
    pub fn standard(settings: &ToolSettings) -> Self {
        let runner = InteractiveRunner::new(settings.exec_timeout)
            .with_max_payload(settings.max_payload_bytes);
        let mut registry = Self::default();
        registry.register(Arc::new(FileProbe));
        registry.register(Arc::new(StringsScanner::new(settings.strings_min_len, settings.strings_max_lines)));
        registry.register(Arc::new(Hexdump));
        registry.register(Arc::new(Debugger::new(settings.debugger_timeout)));
        registry.register(Arc::new(RunBinary::new(runner)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }
}
