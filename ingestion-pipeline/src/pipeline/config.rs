use std::time::Duration;

use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Size of one indexed chunk; every chunk but the last is filled completely.
    pub index_chunk_bytes: usize,
    /// Upper bound on a single derivation service call.
    pub derivation_timeout: Duration,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            index_chunk_bytes: 4 * 1024,
            derivation_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                index_chunk_bytes: config.index_chunk_bytes.max(1),
                derivation_timeout: Duration::from_secs(config.derivation_timeout_secs.max(1)),
            },
        }
    }
}
