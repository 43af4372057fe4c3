//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/wikisync/) and project (.wikisync/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{analysis, network, publish, synthesis};
use crate::hierarchy::{OrganizationTemplate, SectionRule};
use crate::types::{Result, SyncError};
use crate::util::{RetryPolicy, TimeoutConfig};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Project-specific settings
    pub project: ProjectConfig,

    /// Source scanning and analyzer settings
    pub analysis: AnalysisConfig,

    /// Content generator settings
    pub generator: GeneratorConfig,

    /// Retry and parallelism bounds for content generation
    pub synthesis: StageConfig,

    /// Remote platform settings
    pub platform: PlatformConfig,

    /// Retry and parallelism bounds for publishing
    pub publish: StageConfig,

    /// Organizational template (ignored when `project.template_file` is set)
    pub template: Vec<SectionRule>,

    pub feedback: FeedbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            project: ProjectConfig::default(),
            analysis: AnalysisConfig::default(),
            generator: GeneratorConfig::default(),
            synthesis: StageConfig::synthesis(),
            platform: PlatformConfig::default(),
            publish: StageConfig::publish(),
            template: OrganizationTemplate::default().sections,
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SyncError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(SyncError::Config(format!(
                "Generator temperature must be between 0.0 and 2.0, got {}",
                self.generator.temperature
            )));
        }

        if self.generator.timeout_secs == 0 {
            return Err(SyncError::Config(
                "Generator timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.platform.timeout_secs == 0 {
            return Err(SyncError::Config(
                "Platform timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.synthesis.validate("synthesis")?;
        self.publish.validate("publish")?;

        let root_key = self.platform.root_key.trim();
        if root_key.is_empty() || root_key.contains('/') {
            return Err(SyncError::Config(format!(
                "Platform root_key must be a single non-empty segment, got '{}'",
                self.platform.root_key
            )));
        }

        if self.generator.kind == GeneratorKind::Http {
            let base = self.generator.api_base.as_deref().unwrap_or_default();
            validate_url("generator.api_base", base)?;
            if self.generator.model.trim().is_empty() {
                return Err(SyncError::Config(
                    "generator.model is required for the http generator".to_string(),
                ));
            }
        }

        if self.platform.kind == PlatformKind::Http {
            let base = self.platform.base_url.as_deref().unwrap_or_default();
            validate_url("platform.base_url", base)?;
        }

        if self.project.template_file.is_none() {
            OrganizationTemplate::new(self.template.clone()).validate()?;
        }

        Ok(())
    }

    /// Documentation root the state and lock are scoped to
    pub fn documentation_root(&self) -> &str {
        self.platform.root_key.trim()
    }

    /// Resolve the organizational template, loading the YAML file if configured
    pub fn organization_template(&self, project_root: &Path) -> Result<OrganizationTemplate> {
        match &self.project.template_file {
            Some(file) => {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    project_root.join(file)
                };
                OrganizationTemplate::from_yaml_file(&path)
            }
            None => Ok(OrganizationTemplate::new(self.template.clone())),
        }
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::new(self.generator.timeout_secs, self.platform.timeout_secs)
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| SyncError::Config(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::Config(format!(
            "{} must use http or https, got '{}'",
            field,
            parsed.scheme()
        )));
    }
    Ok(())
}

// =============================================================================
// Project Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (defaults to directory name)
    pub name: Option<String>,

    /// Source root relative to the project directory
    pub source_root: Option<PathBuf>,

    /// YAML organizational template, relative to the project directory
    pub template_file: Option<PathBuf>,
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Glob patterns to include
    pub include: Vec<String>,

    /// Glob patterns to exclude
    pub exclude: Vec<String>,

    /// Maximum file size in bytes
    pub max_file_size: usize,

    /// Honor .gitignore files while scanning
    pub respect_gitignore: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: vec![
                "node_modules/**".to_string(),
                "dist/**".to_string(),
                ".git/**".to_string(),
                "target/**".to_string(),
                "vendor/**".to_string(),
                "__pycache__/**".to_string(),
                ".venv/**".to_string(),
                "build/**".to_string(),
                ".wikisync/**".to_string(),
            ],
            max_file_size: analysis::MAX_FILE_SIZE,
            respect_gitignore: true,
        }
    }
}

// =============================================================================
// Generator Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Deterministic markdown outlines built from the entity graph
    #[default]
    Outline,
    /// OpenAI-compatible chat completions endpoint
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,

    /// Model name (part of the generation fingerprint)
    pub model: String,

    /// API base URL, e.g. `https://api.openai.com/v1`
    pub api_base: Option<String>,

    /// API key; falls back to `WIKISYNC_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Outline,
            model: "outline-v1".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
        }
    }
}

// =============================================================================
// Stage Bounds
// =============================================================================

/// Retry and parallelism bounds shared by synthesis and publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Retries after the first failed call
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    /// Calls (synthesis) or subtrees (publish) in flight at once
    pub concurrency: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::synthesis()
    }
}

impl StageConfig {
    pub fn synthesis() -> Self {
        Self {
            max_retries: synthesis::DEFAULT_MAX_RETRIES,
            base_delay_ms: synthesis::BASE_DELAY_MS,
            max_delay_secs: synthesis::MAX_DELAY_SECS,
            concurrency: synthesis::DEFAULT_CONCURRENCY,
        }
    }

    pub fn publish() -> Self {
        Self {
            max_retries: publish::DEFAULT_MAX_RETRIES,
            base_delay_ms: publish::BASE_DELAY_MS,
            max_delay_secs: publish::MAX_DELAY_SECS,
            concurrency: publish::DEFAULT_CONCURRENCY,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay_ms, self.max_delay_secs)
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Config(format!(
                "{}.concurrency must be greater than 0",
                section
            )));
        }
        if self.max_delay_secs.saturating_mul(1000) < self.base_delay_ms {
            return Err(SyncError::Config(format!(
                "{}.max_delay_secs must not be below base_delay_ms",
                section
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Platform Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Markdown files plus an index under a local directory
    #[default]
    Directory,
    /// REST wiki service
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub kind: PlatformKind,

    /// Service base URL for the http platform
    pub base_url: Option<String>,

    /// Bearer token; falls back to `WIKISYNC_PLATFORM_TOKEN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Output directory for the directory platform, relative to the project
    pub directory: PathBuf,

    /// Documentation root (space) pages are published under
    pub root_key: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kind: PlatformKind::Directory,
            base_url: None,
            token: None,
            directory: PathBuf::from("wiki"),
            root_key: "docs".to_string(),
            timeout_secs: publish::CALL_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Feedback Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// JSONL file corrections are forwarded to, relative to the project
    pub sink: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            sink: PathBuf::from(".wikisync/feedback.jsonl"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::GroupBy;
    use crate::model::DocType;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.documentation_root(), "docs");
        assert_eq!(config.synthesis.max_retries, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.publish.concurrency = 0;
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_http_platform_requires_url() {
        let mut config = Config::default();
        config.platform.kind = PlatformKind::Http;
        assert!(config.validate().is_err());

        config.platform.base_url = Some("ftp://wiki.local".into());
        assert!(config.validate().is_err());

        config.platform.base_url = Some("https://wiki.local/api".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let mut config = Config::default();
        config.template.push(SectionRule::new(
            "API",
            DocType::ApiReference,
            &[],
            GroupBy::None,
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_root_key_must_be_one_segment() {
        let mut config = Config::default();
        config.platform.root_key = "docs/sub".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_file_resolved_against_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("layout.yaml"),
            "- path: Guide\n  doc_type: use-case\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.project.template_file = Some(PathBuf::from("layout.yaml"));
        let template = config.organization_template(dir.path()).unwrap();
        assert_eq!(template.sections.len(), 1);
        assert_eq!(template.sections[0].path, "Guide");
    }
}
