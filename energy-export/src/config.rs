use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

const CONFIG_ENV: &str = "ENERGY_EXPORT_CONFIG";
const CREDENTIALS_ENV: &str = "ENERGY_EXPORT_CREDENTIALS";
const DEFAULT_CONFIG_PATH: &str = "energy-export.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no '{0}' section in credentials file")]
    MissingCredentials(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GivEnergyConfig {
    pub base_url: String,
    pub inverter_serial: String,
    /// 0 = half-hourly buckets, 1 = daily, 2 = monthly, 3 = yearly, 4 = total.
    pub grouping: u8,
    pub timeout_secs: u64,
}

impl Default for GivEnergyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.givenergy.cloud/v1".to_string(),
            inverter_serial: "EA2302G468".to_string(),
            grouping: 0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OctopusConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for OctopusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.octopus.energy/v1".to_string(),
            page_size: 2000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub entity_pattern: String,
    pub measurements: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.8.150:8086".to_string(),
            database: "hass".to_string(),
            entity_pattern: "givtcp".to_string(),
            measurements: ["Wh", "W", "°C", "V"].map(String::from).to_vec(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials_path: PathBuf,
    pub givenergy: GivEnergyConfig,
    pub octopus: OctopusConfig,
    pub influx: InfluxConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("creds.yaml"),
            givenergy: GivEnergyConfig::default(),
            octopus: OctopusConfig::default(),
            influx: InfluxConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `$ENERGY_EXPORT_CONFIG`, else `energy-export.toml`.
    ///
    /// A missing default file yields the built-in defaults; a missing file
    /// named by the environment variable is an error.
    pub fn load() -> Result<Self, ConfigError> {
        use std::env;

        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            Err(_) => {
                tracing::debug!("no {DEFAULT_CONFIG_PATH} found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// `$ENERGY_EXPORT_CREDENTIALS` overrides `credentials_path`.
    pub fn credentials_path(&self) -> PathBuf {
        std::env::var_os(CREDENTIALS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.credentials_path.clone())
    }
}

#[derive(Clone, Deserialize)]
pub struct GivEnergyCredentials {
    /// Sent verbatim as the `Authorization` header.
    pub token: String,
}

#[derive(Clone, Deserialize)]
pub struct OctopusCredentials {
    pub api_key: String,
    /// Meter point administration number.
    pub mpan: String,
    pub meter_serial: String,
}

/// Contents of the local credentials YAML file.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    pub givenergy: Option<GivEnergyCredentials>,
    pub octopus: Option<OctopusCredentials>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn givenergy(&self) -> Result<&GivEnergyCredentials, ConfigError> {
        self.givenergy
            .as_ref()
            .ok_or(ConfigError::MissingCredentials("givenergy"))
    }

    pub fn octopus(&self) -> Result<&OctopusCredentials, ConfigError> {
        self.octopus
            .as_ref()
            .ok_or(ConfigError::MissingCredentials("octopus"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [influx]
            url = "http://localhost:8086"
            measurements = ["W"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.influx.url, "http://localhost:8086");
        assert_eq!(cfg.influx.measurements, vec!["W"]);
        assert_eq!(cfg.influx.database, "hass");
        assert_eq!(cfg.influx.entity_pattern, "givtcp");
        assert_eq!(cfg.octopus.page_size, 2000);
        assert_eq!(cfg.givenergy.grouping, 0);
        assert_eq!(cfg.credentials_path, PathBuf::from("creds.yaml"));
    }

    #[test]
    fn default_measurements() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.influx.measurements, vec!["Wh", "W", "°C", "V"]);
    }

    #[test]
    fn credentials_sections_are_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "octopus:\n  api_key: sk_test\n  mpan: \"1900000000000\"\n  meter_serial: 21L000000"
        )
        .unwrap();

        let creds = Credentials::load(file.path()).unwrap();
        let octopus = creds.octopus().unwrap();
        assert_eq!(octopus.api_key, "sk_test");
        assert_eq!(octopus.mpan, "1900000000000");
        assert!(matches!(
            creds.givenergy(),
            Err(ConfigError::MissingCredentials("givenergy"))
        ));
    }

    #[test]
    fn unreadable_credentials_name_the_path() {
        let err = Credentials::load(Path::new("/nonexistent/creds.yaml"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/creds.yaml"));
    }
}
