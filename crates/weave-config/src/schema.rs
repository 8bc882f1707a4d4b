use serde::{Deserialize, Serialize};

/// Root configuration, loaded from `weave.toml` and shared by both binaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeaveConfig {
    pub worker: WorkerConfig,
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

/// Socket-layer tuning: directory/file names under `$XDG_RUNTIME_DIR` and
/// the per-direction timeouts the accept loop enforces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub socket_dir: String,
    pub socket_file: String,
    pub recv_timeout_secs: u64,
    pub send_timeout_secs: u64,
    /// Advisory only — the wire format's own frame-size ceiling is a fixed
    /// protocol constant, not a runtime tunable. This field exists so the
    /// config round-trips and validates, and so a deployer can shrink their
    /// own expectations below the wire limit, not to change it.
    pub max_message_size: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            socket_dir: "weave".into(),
            socket_file: "worker.sock".into(),
            recv_timeout_secs: 60,
            send_timeout_secs: 5,
            max_message_size: 10 * 1024 * 1024,
        }
    }
}

/// Local model server connection details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub delimiter: String,
    pub accumulator_cap_bytes: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "llama3".into(),
            delimiter: "---".into(),
            accumulator_cap_bytes: 1024 * 1024,
        }
    }
}

/// Defaults applied when a tool call omits a generation field, and the
/// baseline the orchestrator clamps against via `GenerationParams::sanitize`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub default_width: u32,
    pub default_height: u32,
    pub default_steps: u32,
    pub default_cfg: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_width: 512,
            default_height: 512,
            default_steps: 28,
            default_cfg: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl WeaveConfig {
    /// Validate the config and return a list of warnings/errors. Returns
    /// `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Worker socket names ───
        if self.worker.socket_dir.is_empty() {
            warnings.push(ConfigWarning {
                field: "worker.socket_dir".into(),
                message: "socket_dir is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'weave'".into()),
            });
        }
        if self.worker.socket_file.is_empty() {
            warnings.push(ConfigWarning {
                field: "worker.socket_file".into(),
                message: "socket_file is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'worker.sock'".into()),
            });
        }

        // ── Worker timeouts ───
        if self.worker.recv_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "worker.recv_timeout_secs".into(),
                message: "recv timeout of 0 disables the timeout entirely".into(),
                severity: WarningSeverity::Warning,
                hint: Some("A hung peer connection will never be reaped".into()),
            });
        }
        if self.worker.max_message_size == 0 {
            warnings.push(ConfigWarning {
                field: "worker.max_message_size".into(),
                message: "max_message_size is 0 — no frame could ever decode".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 10485760 (10 MiB)".into()),
            });
        }

        // ── LLM base URL ───
        if self.llm.base_url.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.base_url".into(),
                message: "base_url is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'http://127.0.0.1:11434'".into()),
            });
        } else if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            warnings.push(ConfigWarning {
                field: "llm.base_url".into(),
                message: format!("base_url '{}' has no scheme", self.llm.base_url),
                severity: WarningSeverity::Warning,
                hint: Some("Prefix with 'http://' or 'https://'".into()),
            });
        }

        // ── LLM model ───
        if self.llm.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'llama3'".into()),
            });
        }

        // ── Accumulator cap ───
        if self.llm.accumulator_cap_bytes == 0 {
            warnings.push(ConfigWarning {
                field: "llm.accumulator_cap_bytes".into(),
                message: "accumulator_cap_bytes is 0 — every stream would overflow immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1048576 (1 MiB)".into()),
            });
        }

        // ── Generation defaults ───
        if self.generation.default_width < 64 || self.generation.default_width > 2048 {
            warnings.push(ConfigWarning {
                field: "generation.default_width".into(),
                message: format!("default_width {} is outside the wire's valid range", self.generation.default_width),
                severity: WarningSeverity::Error,
                hint: Some("Valid range is 64-2048".into()),
            });
        }
        if self.generation.default_height < 64 || self.generation.default_height > 2048 {
            warnings.push(ConfigWarning {
                field: "generation.default_height".into(),
                message: format!("default_height {} is outside the wire's valid range", self.generation.default_height),
                severity: WarningSeverity::Error,
                hint: Some("Valid range is 64-2048".into()),
            });
        }
        if self.generation.default_steps < 1 || self.generation.default_steps > 100 {
            warnings.push(ConfigWarning {
                field: "generation.default_steps".into(),
                message: format!("default_steps {} is outside the wire's valid range", self.generation.default_steps),
                severity: WarningSeverity::Error,
                hint: Some("Valid range is 1-100".into()),
            });
        }
        if !(0.0..=20.0).contains(&self.generation.default_cfg) {
            warnings.push(ConfigWarning {
                field: "generation.default_cfg".into(),
                message: format!("default_cfg {} is outside the wire's valid range", self.generation.default_cfg),
                severity: WarningSeverity::Error,
                hint: Some("Valid range is 0.0-20.0".into()),
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
