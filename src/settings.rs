// Scorch Compiler Settings
// Named, validated options applied to a single compile

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LOOP_COUNTER: &str = "max_loop_counter";
pub const REGEX_ENABLED: &str = "regex_enabled";
pub const STRICT_NUMERIC_CONVERSION: &str = "strict_numeric_conversion";

/// Every option name `CompilerSettings` recognizes
pub const OPTION_NAMES: [&str; 3] = [MAX_LOOP_COUNTER, REGEX_ENABLED, STRICT_NUMERIC_CONVERSION];

/// Errors raised while building settings, before any compile begins
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unrecognized compiler option '{0}', expected one of: {}", OPTION_NAMES.join(", "))]
    UnknownOption(String),

    #[error("invalid value '{value}' for compiler option '{option}': {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("malformed compiler option '{0}', expected name=value")]
    Malformed(String),
}

/// Options controlling analysis and code generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    /// Iterations budget for the runtime loop guard; 0 disables the guard
    pub max_loop_counter: u32,
    /// Permit regex literals
    pub regex_enabled: bool,
    /// Forbid implicit int to double widening and implicit def to numeric unboxing
    pub strict_numeric_conversion: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_loop_counter: 1_000_000,
            regex_enabled: false,
            strict_numeric_conversion: false,
        }
    }
}

impl CompilerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one option by name from its textual value
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), SettingsError> {
        match name {
            MAX_LOOP_COUNTER => {
                self.max_loop_counter = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                    SettingsError::InvalidValue {
                        option: name.to_string(),
                        value: value.to_string(),
                        reason: e.to_string(),
                    }
                })?;
            }
            REGEX_ENABLED => self.regex_enabled = parse_flag(name, value)?,
            STRICT_NUMERIC_CONVERSION => self.strict_numeric_conversion = parse_flag(name, value)?,
            _ => return Err(SettingsError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Build settings from `(name, value)` pairs, starting from the defaults
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (name, value) in pairs {
            settings.set(name, value)?;
        }
        Ok(settings)
    }

    /// Apply a single `name=value` assignment
    pub fn apply(&mut self, assignment: &str) -> Result<(), SettingsError> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| SettingsError::Malformed(assignment.to_string()))?;
        self.set(name.trim(), value)
    }

    pub fn loop_guard_enabled(&self) -> bool {
        self.max_loop_counter > 0
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SettingsError::InvalidValue {
            option: name.to_string(),
            value: other.to_string(),
            reason: "expected 'true' or 'false'".to_string(),
        }),
    }
}
