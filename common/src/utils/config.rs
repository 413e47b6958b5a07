use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_doc_extractor_url")]
    pub doc_extractor_url: String,
    #[serde(default = "default_thumbnail_command")]
    pub thumbnail_command: String,
    #[serde(default)]
    pub label_service_enabled: bool,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_label_model")]
    pub label_model: String,
    #[serde(default = "default_derivation_timeout_secs")]
    pub derivation_timeout_secs: u64,
    #[serde(default = "default_index_chunk_bytes")]
    pub index_chunk_bytes: usize,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_http_port() -> u16 {
    9321
}

fn default_doc_extractor_url() -> String {
    "http://localhost:9998/tika".to_string()
}

fn default_thumbnail_command() -> String {
    "convert".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_label_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_derivation_timeout_secs() -> u64 {
    120
}

fn default_index_chunk_bytes() -> usize {
    4 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "ws://127.0.0.1:8000".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "files".to_string(),
            surrealdb_database: "files".to_string(),
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            doc_extractor_url: default_doc_extractor_url(),
            thumbnail_command: default_thumbnail_command(),
            label_service_enabled: false,
            openai_api_key: None,
            openai_base_url: default_base_url(),
            label_model: default_label_model(),
            derivation_timeout_secs: default_derivation_timeout_secs(),
            index_chunk_bytes: default_index_chunk_bytes(),
        }
    }
}

impl AppConfig {
    /// Labels need both the switch and a key; either missing disables the branch.
    pub fn labels_configured(&self) -> bool {
        self.label_service_enabled
            && self
                .openai_api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
