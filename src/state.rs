//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::RenderBackend;
use crate::config::{Config, ConfigError};
use crate::service::PageService;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Temp directory {path} is not usable: {source}")]
    TempDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    service: PageService,
}

impl AppState {
    /// Create the state with the engines named in `config`
    pub fn new(config: Config) -> Result<Self, StateError> {
        config.validate()?;
        std::fs::create_dir_all(&config.temp_dir).map_err(|source| StateError::TempDir {
            path: config.temp_dir.clone(),
            source,
        })?;

        let splitter = config.engines.split.build(&config);
        let rasterizer = config.engines.raster.build(&config);
        Ok(Self::with_backends(config, splitter, rasterizer))
    }

    /// Create the state with explicit engines
    pub fn with_backends(
        config: Config,
        splitter: Arc<dyn RenderBackend>,
        rasterizer: Arc<dyn RenderBackend>,
    ) -> Self {
        let service = PageService::new(config.clone(), splitter, rasterizer);
        Self {
            inner: Arc::new(AppStateInner { config, service }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn service(&self) -> &PageService {
        &self.inner.service
    }
}
