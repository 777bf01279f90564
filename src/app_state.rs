use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::videogen::client::{FalClient, GenerationClient};
use crate::videogen::records::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub generation_client: Arc<dyn GenerationClient>,
    pub records: RecordStore,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> Result<Self> {
        let generation_client = init_generation_client(&app_config)?;
        Ok(Self::with_client(app_config, generation_client))
    }

    pub fn with_client(config: AppConfig, generation_client: Arc<dyn GenerationClient>) -> Self {
        AppState {
            records: RecordStore::new(config.max_records),
            config,
            generation_client,
        }
    }
}

pub fn init_generation_client(conf: &AppConfig) -> Result<Arc<dyn GenerationClient>> {
    let client = FalClient::new(conf.provider.clone()).context("Failed to build provider client")?;
    log::info!(
        "Provider client ready: http={} ({:?}) ws={} ({:?}) sync via {:?}",
        conf.provider.http_url,
        conf.provider.http_response_shape,
        conf.provider.ws_url,
        conf.provider.ws_response_shape,
        conf.provider.sync_transport
    );
    Ok(Arc::new(client))
}
