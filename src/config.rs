//! Configuration management
//!
//! Settings arrive through LSP `initializationOptions`, either as our config shape
//! directly or nested under a `cogtrust` key depending on the client. Anything
//! unparseable falls back to defaults rather than failing startup; a server that
//! refuses to start over a typo in settings is worse than one that scans with
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CogtrustConfig {
    pub scanner: ScannerConfig,

    pub scan: ScanConfig,

    pub hints: HintsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Scanner executable; resolved through PATH when not absolute.
    pub binary_path: PathBuf,

    /// Rules directory passed as `--config`. Relative paths resolve against
    /// the workspace root.
    pub rules_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub on_save: bool,

    /// Language ids scanned on save; other documents are ignored.
    pub languages: Vec<String>,

    pub max_concurrent_scans: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    pub enabled: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("semgrep"),
            rules_dir: PathBuf::from("semgrep-rules"),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            on_save: true,
            languages: vec!["python".to_string(), "javascript".to_string()],
            max_concurrent_scans: 4,
        }
    }
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ScannerConfig {
    pub fn resolved_rules_dir(&self, workspace_root: Option<&Path>) -> PathBuf {
        if self.rules_dir.is_absolute() {
            return self.rules_dir.clone();
        }

        match workspace_root {
            Some(root) => root.join(&self.rules_dir),
            None => self.rules_dir.clone(),
        }
    }
}

impl ScanConfig {
    pub fn scans_language(&self, language_id: &str) -> bool {
        self.languages.iter().any(|l| l == language_id)
    }
}

impl CogtrustConfig {
    pub fn from_lsp_value(value: serde_json::Value) -> Self {
        // Sections default individually, so a bare object parses as all
        // defaults; the nested key has to be checked before the direct shape.
        if let Some(settings) = value.get("cogtrust") {
            if let Ok(config) = serde_json::from_value::<CogtrustConfig>(settings.clone()) {
                debug!("Deserialized configuration from 'cogtrust' key");
                return config;
            }
        }

        if let Ok(config) = serde_json::from_value::<CogtrustConfig>(value) {
            debug!("Deserialized configuration directly");
            return config;
        }

        debug!("Unrecognized initialization options, using defaults");
        CogtrustConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CogtrustConfig::default();

        assert_eq!(config.scanner.binary_path, PathBuf::from("semgrep"));
        assert_eq!(config.scanner.rules_dir, PathBuf::from("semgrep-rules"));
        assert!(config.scan.on_save);
        assert!(config.scan.scans_language("python"));
        assert!(config.scan.scans_language("javascript"));
        assert!(!config.scan.scans_language("rust"));
        assert!(config.hints.enabled);
    }

    #[test]
    fn test_from_lsp_value_direct() {
        let value = serde_json::json!({
            "scanner": { "binary_path": "/usr/local/bin/semgrep" },
            "scan": { "languages": ["python"] }
        });

        let config = CogtrustConfig::from_lsp_value(value);
        assert_eq!(
            config.scanner.binary_path,
            PathBuf::from("/usr/local/bin/semgrep")
        );
        assert_eq!(config.scan.languages, vec!["python".to_string()]);
        // Untouched sections keep defaults.
        assert!(config.hints.enabled);
    }

    #[test]
    fn test_from_lsp_value_nested_key() {
        let value = serde_json::json!({
            "cogtrust": { "hints": { "enabled": false } }
        });

        let config = CogtrustConfig::from_lsp_value(value);
        assert!(!config.hints.enabled);
    }

    #[test]
    fn test_from_lsp_value_garbage_falls_back_to_defaults() {
        let config = CogtrustConfig::from_lsp_value(serde_json::json!("nonsense"));
        assert!(config.scan.on_save);
    }

    #[test]
    fn test_resolved_rules_dir() {
        let config = ScannerConfig::default();

        assert_eq!(
            config.resolved_rules_dir(Some(Path::new("/work"))),
            PathBuf::from("/work/semgrep-rules")
        );
        assert_eq!(
            config.resolved_rules_dir(None),
            PathBuf::from("semgrep-rules")
        );

        let absolute = ScannerConfig {
            rules_dir: PathBuf::from("/etc/semgrep-rules"),
            ..Default::default()
        };
        assert_eq!(
            absolute.resolved_rules_dir(Some(Path::new("/work"))),
            PathBuf::from("/etc/semgrep-rules")
        );
    }
}
