use crate::discovery::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a reclaim analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scanning configuration
    pub scan: ScanConfig,

    /// Entry point and export configuration
    pub entry: EntryConfig,

    /// Duplicate detection configuration
    pub duplicates: DuplicateConfig,

    /// Plan generation configuration
    pub plan: PlanConfig,

    /// Run-level settings
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns to exclude from scanning (build output is always excluded)
    pub exclude: Vec<String>,

    /// Restrict scanning to these languages (empty means all)
    pub languages: Vec<Language>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Globs for files whose top-level code and public symbols are roots
    pub files: Vec<String>,

    /// Symbol name patterns that are roots ("main", "test_*", "*Handler")
    pub symbols: Vec<String>,

    /// Annotation/decorator fragments that mark a symbol as a root
    pub annotations: Vec<String>,

    /// Names that must be declared by at most one file
    pub unique_entry_points: Vec<String>,

    /// Treat every public symbol as an exported root
    pub library_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Minimum Jaccard similarity for near duplicates
    pub similarity_threshold: f64,

    /// Number of tokens per shingle
    pub shingle_size: usize,

    /// Bodies with fewer normalized tokens are ignored
    pub min_body_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Propose `archive` instead of `remove` for whole dead files
    pub archive_dead_files: bool,

    /// Destination for archived files, relative to the scan root
    pub archive_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget for one analysis run
    pub max_duration_secs: Option<u64>,

    /// Command run after each applied group; non-zero exit rolls the group back
    pub verify_command: Option<String>,

    /// Where the plan report is written, relative to the scan root
    pub report_path: Option<PathBuf>,
}

/// Directories that are build or tool output in every ecosystem we scan
pub const BUILD_OUTPUT_EXCLUDES: &[&str] = &[
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/out/**",
    "**/node_modules/**",
    "**/.git/**",
    "**/__pycache__/**",
    "**/vendor/**",
    "**/.venv/**",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            entry: EntryConfig::default(),
            duplicates: DuplicateConfig::default(),
            plan: PlanConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: BUILD_OUTPUT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            languages: vec![],
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            files: vec![
                "**/main.*".to_string(),
                "**/__main__.py".to_string(),
                "**/lib.rs".to_string(),
                "**/build.rs".to_string(),
                "**/index.js".to_string(),
                "**/index.ts".to_string(),
                "**/setup.py".to_string(),
                "**/tests/**".to_string(),
                "**/test_*.py".to_string(),
                "**/*_test.go".to_string(),
                "**/*.test.*".to_string(),
                "**/*.spec.*".to_string(),
                "**/benches/**".to_string(),
            ],
            symbols: vec!["main".to_string(), "test_*".to_string()],
            annotations: vec![
                "test".to_string(),
                "Test".to_string(),
                "main".to_string(),
                "route".to_string(),
                "fixture".to_string(),
                "Override".to_string(),
                "no_mangle".to_string(),
                "export".to_string(),
                "Bean".to_string(),
                "Composable".to_string(),
            ],
            unique_entry_points: vec![],
            library_mode: false,
        }
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            shingle_size: 5,
            min_body_tokens: 10,
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            archive_dead_files: false,
            archive_dir: PathBuf::from(".reclaim-archive"),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: None,
            verify_command: None,
            report_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)?,
            "toml" => toml::from_str(&contents)?,
            _ => {
                // Try YAML first, then TOML
                match serde_yaml::from_str(&contents) {
                    Ok(config) => config,
                    Err(_) => toml::from_str(&contents)?,
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self, ConfigError> {
        let default_names = [
            ".reclaim.yml",
            ".reclaim.yaml",
            ".reclaim.toml",
            "reclaim.yml",
            "reclaim.yaml",
            "reclaim.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Reject values the analysis cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.duplicates.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if self.duplicates.shingle_size == 0 {
            return Err(ConfigError::Invalid(
                "shingle_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a symbol name is configured as an entry point
    pub fn is_entry_symbol(&self, name: &str) -> bool {
        self.entry.symbols.iter().any(|p| name_match(p, name))
    }

    /// Check if any annotation marks its symbol as an entry point
    pub fn has_entry_annotation(&self, annotations: &[String]) -> bool {
        annotations.iter().any(|annotation| {
            let bare = annotation_name(annotation);
            self.entry
                .annotations
                .iter()
                .any(|marker| bare.split([':', '.', '(', ')', ',', ' ']).any(|part| part == marker))
        })
    }
}

/// Strip annotation syntax: `#[tokio::main]` -> `tokio::main`, `@app.route("/")` -> `app.route("/")`
fn annotation_name(annotation: &str) -> &str {
    let trimmed = annotation.trim();
    let trimmed = trimmed
        .strip_prefix("#![")
        .or_else(|| trimmed.strip_prefix("#["))
        .or_else(|| trimmed.strip_prefix('@'))
        .unwrap_or(trimmed);
    trimmed.trim_end_matches(']')
}

/// Simple wildcard matching for symbol names like "*Handler" or "test_*"
pub fn name_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        if let Some(middle) = suffix.strip_suffix('*') {
            return text.contains(middle);
        }
        return text.ends_with(suffix);
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return text.starts_with(prefix);
    }

    text == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_match_suffix() {
        assert!(name_match("*Handler", "RequestHandler"));
        assert!(!name_match("*Handler", "HandlerFactory"));
    }

    #[test]
    fn test_name_match_prefix() {
        assert!(name_match("test_*", "test_parse"));
        assert!(!name_match("test_*", "parse_test"));
    }

    #[test]
    fn test_name_match_contains_and_exact() {
        assert!(name_match("*route*", "add_route_table"));
        assert!(name_match("main", "main"));
        assert!(!name_match("main", "domain"));
    }

    #[test]
    fn test_entry_annotations() {
        let config = Config::default();
        assert!(config.has_entry_annotation(&["#[test]".to_string()]));
        assert!(config.has_entry_annotation(&["#[tokio::main]".to_string()]));
        assert!(config.has_entry_annotation(&["@app.route(\"/\")".to_string()]));
        assert!(config.has_entry_annotation(&["@Test".to_string()]));
        assert!(config.has_entry_annotation(&["#[cfg(test)]".to_string()]));
        assert!(!config.has_entry_annotation(&["#[derive(Debug)]".to_string()]));
        assert!(!config.has_entry_annotation(&["@contest".to_string()]));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.duplicates.similarity_threshold, 0.8);
        assert_eq!(config.duplicates.shingle_size, 5);
        assert!(config.scan.exclude.iter().any(|p| p.contains("target")));
        assert!(!config.entry.library_mode);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.duplicates.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.duplicates.similarity_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_and_toml() {
        let dir = tempfile::TempDir::new().unwrap();

        let yaml = dir.path().join(".reclaim.yml");
        std::fs::write(
            &yaml,
            "duplicates:\n  similarity_threshold: 0.9\nentry:\n  library_mode: true\n",
        )
        .unwrap();
        let config = Config::from_default_locations(dir.path()).unwrap();
        assert_eq!(config.duplicates.similarity_threshold, 0.9);
        assert!(config.entry.library_mode);
        assert_eq!(config.duplicates.shingle_size, 5);

        let toml_path = dir.path().join("custom.toml");
        std::fs::write(&toml_path, "[duplicates]\nshingle_size = 3\n").unwrap();
        let config = Config::from_file(&toml_path).unwrap();
        assert_eq!(config.duplicates.shingle_size, 3);
    }
}
