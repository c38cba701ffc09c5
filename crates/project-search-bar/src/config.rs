//! Configuration for ProjectSearchBar.
//!
//! Everything is read from `PROJECTSEARCHBAR_*` environment variables; the CLI
//! layers its flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// arXiv endpoints and client constants.
pub mod arxiv {
    use std::time::Duration;

    /// OAI-PMH harvesting endpoint.
    pub const OAI_ENDPOINT: &str = "https://export.arxiv.org/oai2";

    /// Atom query API used for metadata enrichment.
    pub const ATOM_API: &str = "http://export.arxiv.org/api/query";

    /// Base URL for e-print (LaTeX source) downloads.
    pub const EPRINT_BASE: &str = "https://arxiv.org/e-print";

    /// Timeout for metadata and listing requests.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Timeout for e-print tarball downloads.
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// arXiv asks for no more than one request every three seconds.
    pub const POLITE_DELAY: Duration = Duration::from_secs(3);

    /// Metadata cache TTL (1 hour).
    pub const CACHE_TTL: Duration = Duration::from_secs(3600);

    /// Maximum cached metadata responses.
    pub const CACHE_MAX_SIZE: u64 = 1000;

    /// Maximum retries for transient failures.
    pub const MAX_RETRIES: u32 = 3;

    /// Ids per Atom `id_list` request.
    pub const METADATA_BATCH: usize = 20;

    /// User-Agent product token.
    pub const USER_AGENT: &str = "ProjectSearchBar/1.0";
}

/// Ranking constants.
pub mod ranking {
    /// BM25 term-frequency saturation.
    pub const BM25_K1: f32 = 1.5;

    /// BM25 length normalisation.
    pub const BM25_B: f32 = 0.75;

    /// Reciprocal rank fusion damping constant.
    pub const RRF_K: f32 = 60.0;

    /// Field weights applied to term frequencies at index time.
    pub const WEIGHT_TITLE: f32 = 3.0;
    pub const WEIGHT_ABSTRACT: f32 = 2.0;
    pub const WEIGHT_BODY: f32 = 1.0;

    /// Weight of the `\command` expansion added for words naming a math symbol.
    pub const MATH_ALIAS_WEIGHT: f32 = 0.5;

    /// Default and maximum page sizes.
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;
}

/// Server defaults.
pub mod server {
    /// Default bind host.
    pub const HOST: &str = "127.0.0.1";

    /// Default bind port.
    pub const PORT: u16 = 8360;

    /// Maximum in-flight HTTP requests.
    pub const MAX_CONCURRENT_REQUESTS: usize = 64;
}

/// Chat model defaults.
pub mod llm {
    use std::time::Duration;

    /// Base URL used when only an API key is configured.
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

    /// Default chat model.
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

    /// Chat completion timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
}

/// Chat model endpoint settings.
#[derive(Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (`.../v1`).
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Bearer token (optional for local servers).
    pub api_key: Option<String>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (database, vectors, papers).
    pub data_dir: PathBuf,

    /// Directory holding downloaded paper sources.
    pub papers_dir: PathBuf,

    /// Static UI directory served at `/`, if any.
    pub ui_dir: Option<PathBuf>,

    /// HTTP bind host.
    pub host: String,

    /// HTTP bind port.
    pub port: u16,

    /// Contact e-mail advertised in the User-Agent.
    pub contact: Option<String>,

    /// Skip arXiv enrichment entirely.
    pub offline: bool,

    /// OAI-PMH endpoint.
    pub oai_url: String,

    /// Atom API endpoint.
    pub atom_url: String,

    /// e-print base URL.
    pub eprint_url: String,

    /// Metadata/listing request timeout.
    pub request_timeout: Duration,

    /// Tarball download timeout.
    pub download_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Minimum spacing between arXiv requests.
    pub rate_limit_delay: Duration,

    /// Retries for transient arXiv failures.
    pub max_retries: u32,

    /// Metadata cache TTL.
    pub cache_ttl: Duration,

    /// Maximum metadata cache entries.
    pub cache_max_size: u64,

    /// Chat model, when configured.
    pub llm: Option<LlmConfig>,
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// Creates the data directory (and its `vectors/` child) if missing.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        config.ensure_dirs()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Does not touch the filesystem apart from probing for the default UI directory.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = get("PROJECTSEARCHBAR_DATA_DIR")
            .map(|d| expand_home(&d, get("HOME").as_deref()))
            .unwrap_or_else(|| PathBuf::from("data"));

        let papers_dir = get("PROJECTSEARCHBAR_PAPERS")
            .map(|d| expand_home(&d, get("HOME").as_deref()))
            .unwrap_or_else(|| data_dir.join("papers"));

        let ui_dir = get("PROJECTSEARCHBAR_UI_DIR").map(PathBuf::from).or_else(|| {
            let default = PathBuf::from("ui2").join("public");
            default.is_dir().then_some(default)
        });

        let port = get("PROJECTSEARCHBAR_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(server::PORT);

        let contact = get("PROJECTSEARCHBAR_CONTACT").filter(|c| c.contains('@'));

        let offline = get("PROJECTSEARCHBAR_OFFLINE").is_some_and(|v| parse_bool(&v));

        let api_key = get("PROJECTSEARCHBAR_LLM_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        let llm_url = get("PROJECTSEARCHBAR_LLM_URL").filter(|u| {
            let valid = is_http_url(u);
            if !valid {
                tracing::warn!(url = %u, "Ignoring PROJECTSEARCHBAR_LLM_URL; expected an http(s) URL");
            }
            valid
        });
        let llm = match (llm_url, api_key) {
            (None, None) => None,
            (url, api_key) => Some(LlmConfig {
                base_url: url
                    .unwrap_or_else(|| llm::DEFAULT_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get("PROJECTSEARCHBAR_LLM_MODEL")
                    .unwrap_or_else(|| llm::DEFAULT_MODEL.to_string()),
                api_key,
                temperature: 0.2,
                request_timeout: llm::REQUEST_TIMEOUT,
            }),
        };

        Self {
            data_dir,
            papers_dir,
            ui_dir,
            host: get("PROJECTSEARCHBAR_HOST").unwrap_or_else(|| server::HOST.to_string()),
            port,
            contact,
            offline,
            oai_url: arxiv::OAI_ENDPOINT.to_string(),
            atom_url: arxiv::ATOM_API.to_string(),
            eprint_url: arxiv::EPRINT_BASE.to_string(),
            request_timeout: arxiv::REQUEST_TIMEOUT,
            download_timeout: arxiv::DOWNLOAD_TIMEOUT,
            connect_timeout: arxiv::CONNECT_TIMEOUT,
            rate_limit_delay: arxiv::POLITE_DELAY,
            max_retries: arxiv::MAX_RETRIES,
            cache_ttl: arxiv::CACHE_TTL,
            cache_max_size: arxiv::CACHE_MAX_SIZE,
            llm,
        }
    }

    /// Create a test configuration pointing every endpoint at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str, data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            papers_dir: data_dir.join("papers"),
            ui_dir: None,
            host: server::HOST.to_string(),
            port: 0,
            contact: None,
            offline: false,
            oai_url: format!("{}/oai2", base_url),
            atom_url: format!("{}/api/query", base_url),
            eprint_url: format!("{}/e-print", base_url),
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            rate_limit_delay: Duration::from_millis(0), // No delay in tests
            max_retries: 0,
            cache_ttl: Duration::from_secs(0), // No caching in tests
            cache_max_size: 0,
            llm: Some(LlmConfig {
                base_url: format!("{}/v1", base_url),
                model: "test-model".to_string(),
                api_key: Some("test-key".to_string()),
                temperature: 0.0,
                request_timeout: Duration::from_secs(5),
            }),
        }
    }

    /// Path of the SQLite index.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("index.sqlite")
    }

    /// Directory reserved for vector exports.
    #[must_use]
    pub fn vectors_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// User-Agent sent to arXiv, with a `mailto:` when a contact is configured.
    #[must_use]
    pub fn user_agent(&self) -> String {
        match &self.contact {
            Some(email) => format!("{} (mailto:{})", arxiv::USER_AGENT, email),
            None => arxiv::USER_AGENT.to_string(),
        }
    }

    /// Socket address string for the HTTP server.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if a chat model is configured.
    #[must_use]
    pub const fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Create the data and vectors directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.vectors_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => Path::new(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.papers_dir, PathBuf::from("data").join("papers"));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8360);
        assert!(!config.offline);
        assert!(!config.has_llm());
        assert_eq!(config.db_path(), PathBuf::from("data").join("index.sqlite"));
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_PORT", "")]));
        assert_eq!(config.port, 8360);
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_PORT", "not-a-port")]));
        assert_eq!(config.port, 8360);
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_PORT", "9000")]));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_papers_dir_follows_data_dir() {
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_DATA_DIR", "/srv/psb")]));
        assert_eq!(config.papers_dir, PathBuf::from("/srv/psb/papers"));

        let config = Config::from_lookup(lookup(&[
            ("PROJECTSEARCHBAR_DATA_DIR", "/srv/psb"),
            ("PROJECTSEARCHBAR_PAPERS", "~/arxiv_tex"),
            ("HOME", "/home/reader"),
        ]));
        assert_eq!(config.papers_dir, PathBuf::from("/home/reader/arxiv_tex"));
    }

    #[test]
    fn test_user_agent_requires_email() {
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_CONTACT", "nobody")]));
        assert_eq!(config.user_agent(), "ProjectSearchBar/1.0");

        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_CONTACT", " a@b.org ")]));
        assert_eq!(config.user_agent(), "ProjectSearchBar/1.0 (mailto:a@b.org)");
    }

    #[test]
    fn test_llm_from_api_key_only() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")]));
        let llm = config.llm.expect("llm configured");
        assert_eq!(llm.base_url, "https://api.openai.com/v1");
        assert_eq!(llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_llm_debug_hides_key() {
        let config = Config::from_lookup(lookup(&[
            ("PROJECTSEARCHBAR_LLM_URL", "http://localhost:11434/v1/"),
            ("PROJECTSEARCHBAR_LLM_API_KEY", "super-secret"),
        ]));
        let llm = config.llm.expect("llm configured");
        assert_eq!(llm.base_url, "http://localhost:11434/v1");
        let debug = format!("{llm:?}");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_llm_url_must_be_http() {
        let config = Config::from_lookup(lookup(&[
            ("PROJECTSEARCHBAR_LLM_URL", "localhost:8080/v1"),
            ("PROJECTSEARCHBAR_LLM_API_KEY", "k"),
        ]));
        assert_eq!(config.llm.unwrap().base_url, llm::DEFAULT_BASE_URL);

        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_LLM_URL", "http://127.0.0.1:8080/v1/")]));
        assert_eq!(config.llm.unwrap().base_url, "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn test_offline_flag() {
        let config = Config::from_lookup(lookup(&[("PROJECTSEARCHBAR_OFFLINE", "yes")]));
        assert!(config.offline);
    }
}
