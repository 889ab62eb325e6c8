//! Pipeline CRM
//!
//! A small-business CRM backend with:
//! - Neo4j entity store for organizations, contacts, opportunities and activities
//! - Configurable sales pipelines with stage-entry automation
//! - Risk and rollup engine behind the dashboards, analytics and reports
//! - An AI sales copilot over any OpenAI-compatible endpoint

pub mod api;
pub mod auth;
pub mod copilot;
pub mod crm;
pub mod neo4j;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub copilot: CopilotConfig,
    /// Auth section. If absent, auth_config is None (deny-by-default)
    pub auth: Option<AuthConfig>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Public URL behind a reverse proxy, e.g. `https://crm.example.com`
    pub public_url: Option<String>,
    /// Extra CORS origins allowed with credentials
    pub allowed_origins: Vec<String>,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            public_url: None,
            allowed_origins: Vec::new(),
        }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "crm-password".into(),
        }
    }
}

/// Copilot configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    /// OpenAI-compatible base URL. Empty or `disabled` turns the copilot off.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl CopilotConfig {
    /// The base URL, or None when the copilot is disabled
    pub fn enabled_base_url(&self) -> Option<&str> {
        let url = self.base_url.trim();
        if url.is_empty() || url.eq_ignore_ascii_case("disabled") {
            None
        } else {
            Some(url)
        }
    }
}

/// Authentication configuration.
///
/// Login is email/password against the user store. The allowlist is provisioned
/// into the store at startup (or via `setup-users`) with `default_password`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (HS256, minimum 32 characters)
    pub jwt_secret: String,
    /// JWT and session cookie lifetime in seconds (default: 7 days)
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
    /// Initial password of provisioned allowlist users
    #[serde(default = "default_password")]
    pub default_password: String,
    #[serde(default)]
    pub authorized_users: Vec<AuthorizedUser>,
}

/// One allowlist entry
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub email: String,
    pub name: String,
    /// `admin` or `sales_lead`
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_jwt_expiry() -> u64 {
    7 * 24 * 3600
}

fn default_password() -> String {
    "ChangeMe-2026".to_string()
}

fn default_role() -> String {
    "sales_lead".to_string()
}

impl AuthConfig {
    /// Whether `email` is on the allowlist (case-insensitive)
    pub fn is_authorized(&self, email: &str) -> bool {
        let email = email.trim();
        self.authorized_users
            .iter()
            .any(|u| u.email.trim().eq_ignore_ascii_case(email))
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_port: u16,
    pub public_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub copilot: CopilotConfig,
    /// Auth config. None means deny-by-default (no auth section in YAML)
    pub auth_config: Option<AuthConfig>,
}

impl Config {
    /// Load configuration from environment variables and `config.yaml` in CWD.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing file falls
    /// back to env vars and defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut copilot = yaml.copilot;
        if let Ok(url) = std::env::var("COPILOT_URL") {
            copilot.base_url = url;
        }
        if let Ok(model) = std::env::var("COPILOT_MODEL") {
            copilot.model = model;
        }
        if let Ok(key) = std::env::var("COPILOT_API_KEY") {
            copilot.api_key = Some(key);
        }

        let mut auth_config = yaml.auth;
        if let (Some(auth), Ok(secret)) = (auth_config.as_mut(), std::env::var("JWT_SECRET")) {
            auth.jwt_secret = secret;
        }

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            public_url: std::env::var("PUBLIC_URL")
                .ok()
                .or(yaml.server.public_url)
                .filter(|u| !u.trim().is_empty()),
            allowed_origins: yaml.server.allowed_origins,
            copilot,
            auth_config,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn neo4j::CrmStore>,
    pub copilot: copilot::CopilotService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to Neo4j (initializing the schema) and build the copilot
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(
            neo4j::Neo4jClient::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
                .await?,
        );

        let generator: Option<Arc<dyn copilot::TextGenerator>> =
            match copilot::HttpTextGenerator::from_config(&config.copilot)? {
                Some(generator) => {
                    tracing::info!(model = %config.copilot.model, "AI copilot enabled");
                    let generator: Arc<dyn copilot::TextGenerator> = Arc::new(generator);
                    Some(generator)
                }
                None => {
                    tracing::info!("AI copilot disabled");
                    None
                }
            };

        Ok(Self {
            store,
            copilot: copilot::CopilotService::new(generator),
            config: Arc::new(config),
        })
    }

    /// Create allowlisted users that are missing from the store
    pub async fn provision_users(&self) -> Result<auth::ProvisionReport> {
        match &self.config.auth_config {
            Some(auth) => {
                auth::provision_allowlist(
                    self.store.as_ref(),
                    &auth.authorized_users,
                    &auth.default_password,
                    auth::password::BCRYPT_COST,
                )
                .await
            }
            None => {
                tracing::warn!("No auth section configured, no users provisioned");
                Ok(auth::ProvisionReport::default())
            }
        }
    }

    /// HTTP server state over this application state
    pub fn server_state(&self) -> api::handlers::ServerState {
        api::handlers::ServerState {
            store: self.store.clone(),
            crm: crm::CrmManager::new(self.store.clone()),
            copilot: self.copilot.clone(),
            auth_config: self.config.auth_config.clone(),
            public_url: self.config.public_url.clone(),
            server_port: self.config.server_port,
            allowed_origins: self.config.allowed_origins.clone(),
            password_cost: auth::password::BCRYPT_COST,
        }
    }
}

/// Provision users, then serve the API until ctrl-c
pub async fn start_server(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j");

    let report = state.provision_users().await?;
    if !report.created.is_empty() {
        tracing::info!(created = ?report.created, "Provisioned allowlisted users");
    }

    if state.config.auth_config.is_none() {
        tracing::warn!("No auth section configured: every protected route answers 403");
    }

    let port = state.config.server_port;
    let app = api::create_router(Arc::new(state.server_state()));

    let address = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    tracing::info!(%address, "CRM server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
server:
  port: 9090
  public_url: https://crm.example.com
  allowed_origins:
    - http://localhost:3000

neo4j:
  uri: bolt://db:7687
  user: admin
  password: secret

copilot:
  base_url: http://llm.local/v1
  model: llama3
  timeout_secs: 30

auth:
  jwt_secret: "super-secret-key-min-32-characters!"
  jwt_expiry_secs: 3600
  default_password: "Initial-Pass-1"
  authorized_users:
    - email: owner@example.com
      name: Owner
      role: admin
    - email: rep@example.com
      name: Rep
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.server.public_url.as_deref(),
            Some("https://crm.example.com")
        );
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.neo4j.uri, "bolt://db:7687");
        assert_eq!(config.copilot.model, "llama3");
        assert_eq!(config.copilot.timeout_secs, 30);
        assert!(config.copilot.api_key.is_none());

        let auth = config.auth.unwrap();
        assert_eq!(auth.jwt_expiry_secs, 3600);
        assert_eq!(auth.default_password, "Initial-Pass-1");
        assert_eq!(auth.authorized_users.len(), 2);
        assert_eq!(auth.authorized_users[0].role, "admin");
        assert_eq!(auth.authorized_users[1].role, "sales_lead");
    }

    #[test]
    fn test_auth_config_absent() {
        let yaml = r#"
server:
  port: 8080
neo4j:
  uri: bolt://localhost:7687
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 8001);
        assert!(config.server.public_url.is_none());
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(config.neo4j.user, "neo4j");
        assert_eq!(config.copilot.base_url, "https://api.openai.com/v1");
        assert_eq!(config.copilot.timeout_secs, 60);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_jwt_expiry_default() {
        let yaml = r#"
auth:
  jwt_secret: "min-32-chars-secret-key-for-test!"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.jwt_expiry_secs, 604800);
        assert!(auth.authorized_users.is_empty());
        assert!(!auth.default_password.is_empty());
    }

    #[test]
    fn test_copilot_disabled_values() {
        let mut copilot = CopilotConfig::default();
        assert_eq!(copilot.enabled_base_url(), Some("https://api.openai.com/v1"));

        copilot.base_url = "".into();
        assert!(copilot.enabled_base_url().is_none());

        copilot.base_url = "DISABLED".into();
        assert!(copilot.enabled_base_url().is_none());
    }

    #[test]
    fn test_is_authorized_case_insensitive() {
        let yaml = r#"
jwt_secret: "min-32-chars-secret-key-for-test!"
authorized_users:
  - email: Owner@Example.com
    name: Owner
"#;
        let auth: AuthConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(auth.is_authorized("owner@example.com"));
        assert!(auth.is_authorized(" OWNER@example.com "));
        assert!(!auth.is_authorized("stranger@example.com"));
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "NEO4J_URI",
                "NEO4J_USER",
                "NEO4J_PASSWORD",
                "SERVER_PORT",
                "PUBLIC_URL",
                "COPILOT_URL",
                "COPILOT_MODEL",
                "COPILOT_API_KEY",
                "JWT_SECRET",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
neo4j:
  uri: bolt://yaml-host:7687
  user: yaml-user
  password: yaml-pass
copilot:
  model: yaml-model
auth:
  jwt_secret: "yaml-secret-key-min-32-characters!!"
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.neo4j_uri, "bolt://yaml-host:7687");
        assert_eq!(config.neo4j_user, "yaml-user");
        assert_eq!(config.copilot.model, "yaml-model");
        assert!(config.public_url.is_none());
        assert_eq!(
            config.auth_config.as_ref().unwrap().jwt_secret,
            "yaml-secret-key-min-32-characters!!"
        );

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("NEO4J_URI", "bolt://env-host:7687");
        std::env::set_var("SERVER_PORT", "7777");
        std::env::set_var("PUBLIC_URL", "https://crm.example.com");
        std::env::set_var("COPILOT_URL", "disabled");
        std::env::set_var("JWT_SECRET", "env-secret-key-min-32-characters!!!");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.neo4j_uri, "bolt://env-host:7687");
        assert_eq!(config.server_port, 7777);
        assert_eq!(config.public_url.as_deref(), Some("https://crm.example.com"));
        assert!(config.copilot.enabled_base_url().is_none());
        assert_eq!(
            config.auth_config.as_ref().unwrap().jwt_secret,
            "env-secret-key-min-32-characters!!!"
        );
        // YAML value still used where no env override
        assert_eq!(config.neo4j_user, "yaml-user");

        clear_env();

        // --- Phase 3: No YAML file, JWT_SECRET alone does not enable auth ---
        std::env::set_var("JWT_SECRET", "env-secret-key-min-32-characters!!!");
        let nonexistent = Path::new("/tmp/nonexistent-crm-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 8001);
        assert_eq!(config.neo4j_uri, "bolt://localhost:7687");
        assert!(config.auth_config.is_none());

        clear_env();
    }
}
