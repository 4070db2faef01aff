use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Application configuration, loaded once in `main` and passed down
/// explicitly to every component that needs it.
///
/// All values have defaults for local use; a `config.toml` next to the
/// binary overrides them, and API keys come from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for all data files
    pub data_dir: PathBuf,
    pub opensanctions: OpenSanctionsConfig,
    pub opencorporates: OpenCorporatesConfig,
    pub companies_house: CompaniesHouseConfig,
    pub http: HttpConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenSanctionsConfig {
    pub base_url: String,
    /// Which dataset to download: "default", "sanctions", "peps", or "crime"
    pub dataset: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenCorporatesConfig {
    pub base_url: String,
    /// Optional API token; raises rate limits when set
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompaniesHouseConfig {
    pub base_url: String,
    /// Required for any Companies House call
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// Delay between registry API requests, for rate limiting
    pub rate_limit_delay_ms: u64,
}

/// Entity-resolution thresholds. Carried in configuration for parity with
/// downstream tooling; no algorithm in this crate exercises them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub name_match_threshold: u8,
    pub address_match_threshold: u8,
    /// ISO 3166-1 alpha-2 codes for secrecy jurisdictions
    pub high_risk_jurisdictions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            opensanctions: OpenSanctionsConfig::default(),
            opencorporates: OpenCorporatesConfig::default(),
            companies_house: CompaniesHouseConfig::default(),
            http: HttpConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl Default for OpenSanctionsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.opensanctions.org/datasets/latest".to_string(),
            dataset: "sanctions".to_string(),
        }
    }
}

impl Default for OpenCorporatesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.opencorporates.com/v0.4".to_string(),
            api_key: None,
        }
    }
}

impl Default for CompaniesHouseConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.company-information.service.gov.uk".to_string(),
            api_key: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
            max_retries: 3,
            rate_limit_delay_ms: 1000,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_match_threshold: 85,
            address_match_threshold: 80,
            high_risk_jurisdictions: ["vg", "ky", "sc", "pa", "bz", "ws", "mh"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` if present, falling back to
    /// defaults. API keys are taken from the environment when not set in
    /// the file.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if config.opencorporates.api_key.is_none() {
            config.opencorporates.api_key = std::env::var("OPENCORPORATES_API_KEY").ok();
        }
        if config.companies_house.api_key.is_none() {
            config.companies_house.api_key = std::env::var("UK_COMPANIES_HOUSE_API_KEY").ok();
        }

        Ok(config)
    }

    /// Directory for raw downloaded data
    pub fn raw_data_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Directory for processed parquet tables
    pub fn processed_data_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Directory for reports and CSV exports
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("output")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.http.rate_limit_delay_ms)
    }

    /// Create all required data directories
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.raw_data_dir().join("opensanctions"),
            self.processed_data_dir(),
            self.output_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.opensanctions.dataset, "sanctions");
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.matching.name_match_threshold, 85);
        assert!(config
            .matching
            .high_risk_jurisdictions
            .contains(&"vg".to_string()));
        assert_eq!(config.raw_data_dir(), PathBuf::from("data/raw"));
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/snm"

            [opensanctions]
            dataset = "peps"

            [http]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/snm"));
        assert_eq!(config.opensanctions.dataset, "peps");
        assert_eq!(config.http.max_retries, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.http.timeout_seconds, 120);
        assert_eq!(
            config.opensanctions.base_url,
            "https://data.opensanctions.org/datasets/latest"
        );
    }
}
