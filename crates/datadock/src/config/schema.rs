use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub input_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub aliases: Vec<ColumnAlias>,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// A single column alias used by the schema validator.
/// `alias` matches an incoming column, `column` is the target name it
/// resolves to. Both sides are canonicalized before lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub alias: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_top_k() -> usize {
    5
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    5
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            sample_rows: default_sample_rows(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Minutes a job may wait for a decision before the sweeper fails it.
    /// Zero disables the sweep.
    #[serde(default)]
    pub timeout_minutes: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { timeout_minutes: 0 }
    }
}

/// Remote schema-inference configuration. Only consulted when the crate is
/// built with the `ai` feature; the heuristic backend ignores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_ai_endpoint(),
            model: default_ai_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path. `None` resolves to the platform default location,
    /// `":memory:"` opens an in-memory database.
    #[serde(default)]
    pub path: Option<String>,
}

/// File formats the reader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            _ => None,
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_csv() {
        assert_eq!(TableFormat::from_extension("csv"), Some(TableFormat::Csv));
        assert_eq!(TableFormat::from_extension("CSV"), Some(TableFormat::Csv));
    }

    #[test]
    fn test_from_extension_tsv_variants() {
        assert_eq!(TableFormat::from_extension("tsv"), Some(TableFormat::Tsv));
        assert_eq!(TableFormat::from_extension("tab"), Some(TableFormat::Tsv));
        assert_eq!(TableFormat::from_extension("TSV"), Some(TableFormat::Tsv));
    }

    #[test]
    fn test_from_extension_unknown() {
        assert_eq!(TableFormat::from_extension("xlsx"), None);
        assert_eq!(TableFormat::from_extension("txt"), None);
        assert_eq!(TableFormat::from_extension(""), None);
    }

    #[test]
    fn test_delimiter() {
        assert_eq!(TableFormat::Csv.delimiter(), b',');
        assert_eq!(TableFormat::Tsv.delimiter(), b'\t');
    }

    #[test]
    fn test_matching_config_default() {
        let matching = MatchingConfig::default();
        assert!((matching.similarity_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(matching.top_k, 5);
    }

    #[test]
    fn test_approval_config_default_disables_sweep() {
        assert_eq!(ApprovalConfig::default().timeout_minutes, 0);
    }

    #[test]
    fn test_ai_config_default_disabled() {
        let ai = AiConfig::default();
        assert!(!ai.enabled);
        assert_eq!(ai.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(ai.timeout_secs, 60);
    }
}
