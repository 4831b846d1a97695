use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub public_url: String,
    pub upload_dir: String,
    pub log_dir: String,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_input_cost_per_million: f64,
    pub llm_output_cost_per_million: f64,
    pub scheduler_enabled: bool,
    pub scheduler_interval_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    public_url: Option<String>,
    upload_dir: Option<String>,
    log_dir: Option<String>,
    llm_api_url: Option<String>,
    llm_api_key: Option<String>,
    llm_model: Option<String>,
    llm_input_cost_per_million: Option<f64>,
    llm_output_cost_per_million: Option<f64>,
    scheduler_enabled: Option<bool>,
    scheduler_interval_secs: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_llm_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const DEFAULT_INPUT_COST_PER_MILLION: f64 = 0.15;
const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 0.60;
const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 3600;

fn parse_value<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, String> {
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{key} has an invalid value: '{value}'")),
        _ => Ok(None),
    }
}

impl PartialServerConfig {
    fn from_file(config_path: Option<&str>) -> Result<Self, String> {
        let Some(path_str) = config_path else {
            return Ok(Self::default());
        };
        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    /// Reads every key from `lookup`, which maps an upper-case variable name to its value.
    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Ok(Self {
            listen_addr: text("LISTEN_ADDR"),
            database_url: text("DATABASE_URL"),
            jwt_secret: text("JWT_SECRET"),
            public_url: text("PUBLIC_URL"),
            upload_dir: text("UPLOAD_DIR"),
            log_dir: text("LOG_DIR"),
            llm_api_url: text("LLM_API_URL"),
            llm_api_key: text("LLM_API_KEY"),
            llm_model: text("LLM_MODEL"),
            llm_input_cost_per_million: parse_value(
                "LLM_INPUT_COST_PER_MILLION",
                lookup("LLM_INPUT_COST_PER_MILLION"),
            )?,
            llm_output_cost_per_million: parse_value(
                "LLM_OUTPUT_COST_PER_MILLION",
                lookup("LLM_OUTPUT_COST_PER_MILLION"),
            )?,
            scheduler_enabled: parse_value("SCHEDULER_ENABLED", lookup("SCHEDULER_ENABLED"))?,
            scheduler_interval_secs: parse_value(
                "SCHEDULER_INTERVAL_SECS",
                lookup("SCHEDULER_INTERVAL_SECS"),
            )?,
        })
    }

    /// `self` wins over `fallback` key by key.
    fn or(self, fallback: Self) -> Self {
        Self {
            listen_addr: self.listen_addr.or(fallback.listen_addr),
            database_url: self.database_url.or(fallback.database_url),
            jwt_secret: self.jwt_secret.or(fallback.jwt_secret),
            public_url: self.public_url.or(fallback.public_url),
            upload_dir: self.upload_dir.or(fallback.upload_dir),
            log_dir: self.log_dir.or(fallback.log_dir),
            llm_api_url: self.llm_api_url.or(fallback.llm_api_url),
            llm_api_key: self.llm_api_key.or(fallback.llm_api_key),
            llm_model: self.llm_model.or(fallback.llm_model),
            llm_input_cost_per_million: self
                .llm_input_cost_per_million
                .or(fallback.llm_input_cost_per_million),
            llm_output_cost_per_million: self
                .llm_output_cost_per_million
                .or(fallback.llm_output_cost_per_million),
            scheduler_enabled: self.scheduler_enabled.or(fallback.scheduler_enabled),
            scheduler_interval_secs: self.scheduler_interval_secs.or(fallback.scheduler_interval_secs),
        }
    }

    fn finish(self) -> Result<ServerConfig, String> {
        let scheduler_interval_secs = self
            .scheduler_interval_secs
            .unwrap_or(DEFAULT_SCHEDULER_INTERVAL_SECS);
        if scheduler_interval_secs == 0 {
            return Err("SCHEDULER_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(ServerConfig {
            listen_addr: self.listen_addr.unwrap_or_else(default_listen_addr),
            database_url: self.database_url.ok_or("DATABASE_URL is required")?,
            jwt_secret: self.jwt_secret.ok_or("JWT_SECRET is required")?,
            public_url: self
                .public_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(default_public_url),
            upload_dir: self.upload_dir.unwrap_or_else(default_upload_dir),
            log_dir: self.log_dir.unwrap_or_else(default_log_dir),
            llm_api_url: self.llm_api_url.unwrap_or_else(default_llm_api_url),
            llm_api_key: self.llm_api_key.ok_or("LLM_API_KEY is required")?,
            llm_model: self.llm_model.unwrap_or_else(default_llm_model),
            llm_input_cost_per_million: self
                .llm_input_cost_per_million
                .unwrap_or(DEFAULT_INPUT_COST_PER_MILLION),
            llm_output_cost_per_million: self
                .llm_output_cost_per_million
                .unwrap_or(DEFAULT_OUTPUT_COST_PER_MILLION),
            scheduler_enabled: self.scheduler_enabled.unwrap_or(true),
            scheduler_interval_secs,
        })
    }
}

impl ServerConfig {
    /// Loads the optional TOML file, then environment variables (after `.env`). The
    /// environment wins.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = PartialServerConfig::from_file(config_path)?;

        // 2. Load from environment variables
        let env_config = PartialServerConfig::from_lookup(|key| env::var(key).ok())?;

        // 3. Merge: environment overrides file
        env_config.or(file_config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> PartialServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PartialServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url = "sqlite://file.db"
jwt_secret = "from-file"
llm_api_key = "sk-file"
llm_model = "file-model"
scheduler_interval_secs = 600
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let file_config = PartialServerConfig::from_file(Some(&path)).unwrap();
        let env_config = env_of(&[("JWT_SECRET", "from-env"), ("SCHEDULER_ENABLED", "false")]);
        let config = env_config.or(file_config).finish().unwrap();

        assert_eq!(config.database_url, "sqlite://file.db");
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.llm_model, "file-model");
        assert_eq!(config.scheduler_interval_secs, 600);
        assert!(!config.scheduler_enabled);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.llm_input_cost_per_million, 0.15);
    }

    #[test]
    fn test_missing_required_keys_fail() {
        let err = env_of(&[("JWT_SECRET", "s"), ("LLM_API_KEY", "k")])
            .finish()
            .unwrap_err();
        assert!(err.contains("DATABASE_URL"));

        let err = PartialServerConfig::from_lookup(|key| {
            (key == "SCHEDULER_INTERVAL_SECS").then(|| "hourly".to_string())
        })
        .unwrap_err();
        assert!(err.contains("SCHEDULER_INTERVAL_SECS"));
    }

    #[test]
    fn test_missing_file_is_ignored_and_public_url_is_trimmed() {
        let file_config = PartialServerConfig::from_file(Some("/nonexistent/newsdesk.toml")).unwrap();
        let config = env_of(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", "s"),
            ("LLM_API_KEY", "k"),
            ("PUBLIC_URL", "https://news.example/"),
        ])
        .or(file_config)
        .finish()
        .unwrap();
        assert_eq!(config.public_url, "https://news.example");
        assert_eq!(config.upload_dir, "uploads");
    }
}
