//! Configuration management for the PDF page server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::backend::Engine;
use crate::pdf::ImageFormat;

const MIN_BODY_MB: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub engines: EngineConfig,
    pub render: RenderConfig,
    /// Upper bound for a single engine invocation
    pub backend_timeout: Duration,
    /// Root under which per-request scratch directories are created
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub split: Engine,
    pub raster: Engine,
    pub pdfinfo_bin: String,
    pub pdfseparate_bin: String,
    pub pdftoppm_bin: String,
    pub ghostscript_bin: String,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub dpi: u32,
    pub format: ImageFormat,
    pub jpeg_quality: u8,
    /// Size cap applied when a request carries no `maxSize`
    pub default_max_image_mb: f64,
    pub flatten_forms: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Engine '{engine}' cannot be used for {role}")]
    Capability { engine: Engine, role: &'static str },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_body_bytes: 100 * 1024 * 1024,
            },
            engines: EngineConfig {
                split: Engine::Lopdf,
                raster: Engine::Poppler,
                pdfinfo_bin: "pdfinfo".to_string(),
                pdfseparate_bin: "pdfseparate".to_string(),
                pdftoppm_bin: "pdftoppm".to_string(),
                ghostscript_bin: "gs".to_string(),
            },
            render: RenderConfig {
                dpi: 200,
                format: ImageFormat::Png,
                jpeg_quality: 85,
                default_max_image_mb: 5.0,
                flatten_forms: true,
            },
            backend_timeout: Duration::from_secs(120),
            temp_dir: env::temp_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let max_body_mb: usize = parse_var("MAX_BODY_MB", 100)?;

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                max_body_bytes: max_body_mb.max(MIN_BODY_MB) * 1024 * 1024,
            },
            engines: EngineConfig {
                split: parse_var("SPLIT_ENGINE", defaults.engines.split)?,
                raster: parse_var("RASTER_ENGINE", defaults.engines.raster)?,
                pdfinfo_bin: env::var("PDFINFO_BIN").unwrap_or(defaults.engines.pdfinfo_bin),
                pdfseparate_bin: env::var("PDFSEPARATE_BIN")
                    .unwrap_or(defaults.engines.pdfseparate_bin),
                pdftoppm_bin: env::var("PDFTOPPM_BIN").unwrap_or(defaults.engines.pdftoppm_bin),
                ghostscript_bin: env::var("GHOSTSCRIPT_BIN")
                    .unwrap_or(defaults.engines.ghostscript_bin),
            },
            render: RenderConfig {
                dpi: parse_var("RENDER_DPI", defaults.render.dpi)?,
                format: parse_var("IMAGE_FORMAT", defaults.render.format)?,
                jpeg_quality: parse_var("JPEG_QUALITY", defaults.render.jpeg_quality)?,
                default_max_image_mb: parse_var(
                    "DEFAULT_MAX_IMAGE_MB",
                    defaults.render.default_max_image_mb,
                )?,
                flatten_forms: parse_var("FLATTEN_FORMS", defaults.render.flatten_forms)?,
            },
            backend_timeout: Duration::from_secs(parse_var(
                "BACKEND_TIMEOUT_SECS",
                defaults.backend_timeout.as_secs(),
            )?),
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject engine assignments the engine cannot serve
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.engines.split.can_split() {
            return Err(ConfigError::Capability {
                engine: self.engines.split,
                role: "page splitting",
            });
        }
        if !self.engines.raster.can_rasterize() {
            return Err(ConfigError::Capability {
                engine: self.engines.raster,
                role: "rasterization",
            });
        }
        Ok(())
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
