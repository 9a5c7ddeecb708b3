use std::fmt;

use serde::{Deserialize, Serialize};

/// Answer code as printed in the codebook. Integer tokens are stored as
/// numbers, anything else (ranges, letters) as trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Numeric(i64),
    Text(String),
}

impl Code {
    pub fn canonical(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => Self::Numeric(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKind {
    ValidSkip,
    DontKnow,
    Refusal,
    NotStated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub code: Code,
    pub label: String,
    #[serde(default)]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub weighted_frequency: Option<u64>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub missing: Option<MissingKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub frequency: u64,
    pub weighted_frequency: u64,
    pub percent: f64,
}

/// One survey variable as reconstructed from the codebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub variable_name: String,
    pub label: String,
    #[serde(default)]
    pub universe: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub question_name: Option<String>,
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub options: Vec<ResponseOption>,
    #[serde(default)]
    pub totals: Option<Totals>,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugCounts {
    pub fragments: usize,
    pub lines: usize,
    pub discarded_lines: usize,
    pub unattached_lines: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input_path: String,
    pub input_sha256: String,
    pub output_path: String,
    pub profile: String,
    pub counts: DebugCounts,
}
