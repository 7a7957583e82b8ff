use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub groq_api_key: String,
    pub tavily_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub tavily_url: String,
    pub embedding_service_url: String,
    pub vector_db_service_url: String,
    pub embedding_model: String,
    pub index_path: String,
    pub doc_top_k: usize,
    pub web_max_results: usize,
    /// Lets document-mode queries with no hits retry against the web.
    pub document_web_fallback: bool,
    pub timeouts: Timeouts,
    pub query_rate_limit_per_minute: u32,
}

/// Upper bounds for each kind of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub classify: Duration,
    pub search: Duration,
    pub web: Duration,
    pub generation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            classify: Duration::from_secs(15),
            search: Duration::from_secs(10),
            web: Duration::from_secs(10),
            generation: Duration::from_secs(60),
        }
    }
}

pub const DEFAULT_DOC_TOP_K: usize = 4;
pub const DEFAULT_WEB_MAX_RESULTS: usize = 3;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            classify: secs(&lookup, "CLASSIFY_TIMEOUT_SECS", defaults.classify)?,
            search: secs(&lookup, "SEARCH_TIMEOUT_SECS", defaults.search)?,
            web: secs(&lookup, "WEB_TIMEOUT_SECS", defaults.web)?,
            generation: secs(&lookup, "GENERATION_TIMEOUT_SECS", defaults.generation)?,
        };

        let config = Config {
            port: parse(&lookup, "PORT", 8080)?,
            groq_api_key: required("GROQ_API_KEY")?,
            tavily_api_key: required("TAVILY_API_KEY")?,
            llm_base_url: var("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
            llm_model: var("LLM_MODEL", "openai/gpt-oss-120b"),
            tavily_url: var("TAVILY_URL", "https://api.tavily.com"),
            embedding_service_url: var("EMBEDDING_SERVICE_URL", "http://localhost:8002"),
            vector_db_service_url: var("VECTOR_DB_SERVICE_URL", "http://localhost:8003"),
            embedding_model: var("EMBEDDING_MODEL", "sentence-transformers/all-MiniLM-L6-v2"),
            index_path: var("VECTOR_DB_PATH", "faiss_index"),
            doc_top_k: parse(&lookup, "DOC_TOP_K", DEFAULT_DOC_TOP_K)?,
            web_max_results: parse(&lookup, "WEB_MAX_RESULTS", DEFAULT_WEB_MAX_RESULTS)?,
            document_web_fallback: parse(&lookup, "DOCUMENT_WEB_FALLBACK", false)?,
            timeouts,
            query_rate_limit_per_minute: parse(&lookup, "QUERY_RATE_LIMIT_PER_MINUTE", 60)?,
        };

        if config.doc_top_k == 0 {
            return Err(ConfigError::Invalid { key: "DOC_TOP_K", message: "must be at least 1".into() });
        }
        if config.web_max_results == 0 {
            return Err(ConfigError::Invalid {
                key: "WEB_MAX_RESULTS",
                message: "must be at least 1".into(),
            });
        }

        Ok(config)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid { key, message: e.to_string() }),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid { key, message: "timeout must be at least 1s".into() });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const CREDS: [(&str, &str); 2] = [("GROQ_API_KEY", "gsk-test"), ("TAVILY_API_KEY", "tvly-test")];

    #[test]
    fn defaults_match_retrieval_contract() {
        let config = config_from(&CREDS).unwrap();
        assert_eq!(config.doc_top_k, 4);
        assert_eq!(config.web_max_results, 3);
        assert!(!config.document_web_fallback);
        assert_eq!(config.port, 8080);
        assert_eq!(config.index_path, "faiss_index");
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = config_from(&[("TAVILY_API_KEY", "tvly-test")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("GROQ_API_KEY")));

        let err = config_from(&[("GROQ_API_KEY", "gsk"), ("TAVILY_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("TAVILY_API_KEY")));
    }

    #[test]
    fn rejects_unparseable_and_zero_values() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("DOC_TOP_K", "four"));
        assert!(matches!(config_from(&pairs), Err(ConfigError::Invalid { key: "DOC_TOP_K", .. })));

        let mut pairs = CREDS.to_vec();
        pairs.push(("WEB_MAX_RESULTS", "0"));
        assert!(matches!(
            config_from(&pairs),
            Err(ConfigError::Invalid { key: "WEB_MAX_RESULTS", .. })
        ));

        let mut pairs = CREDS.to_vec();
        pairs.push(("WEB_TIMEOUT_SECS", "0"));
        assert!(matches!(
            config_from(&pairs),
            Err(ConfigError::Invalid { key: "WEB_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([("DOCUMENT_WEB_FALLBACK", "true"), ("DOC_TOP_K", "8"), ("PORT", "9000")]);
        let config = config_from(&pairs).unwrap();
        assert!(config.document_web_fallback);
        assert_eq!(config.doc_top_k, 8);
        assert_eq!(config.port, 9000);
    }
}
