use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::errors::{Result, SegError};
use crate::model::Variant;

/// Minimum key material accepted for deriving the cookie signing key.
pub const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Secret used to sign session cookies. A random key is generated when unset.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "MASKS_FOLDER", default_value = "static/masks")]
    pub masks_dir: PathBuf,

    #[arg(long, env = "FLASK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "FLASK_PORT", default_value_t = 5005)]
    pub port: u16,

    /// Verbose logging. Only a case-insensitive `true` turns it on.
    #[arg(
        long,
        env = "FLASK_DEBUG",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_debug_flag
    )]
    pub debug: bool,

    #[arg(short, long, env = "MODEL_PATH", default_value = "Segmentation.onnx")]
    pub model_path: PathBuf,

    #[arg(short, long, env = "SEGMENTATION_VARIANT", value_enum, default_value_t = Variant::Instance)]
    pub variant: Variant,

    #[arg(short, long, env = "DEVICE_ID", default_value_t = 0)]
    pub device_id: i32,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Start-up checks. Anything that fails here would otherwise surface as a
    /// panic or a 500 on the first request.
    pub fn validate(&self) -> Result<()> {
        if !self.model_path.exists() {
            return Err(SegError::Configuration {
                message: format!("model file not found: {}", self.model_path.display()),
            });
        }
        if let Some(key) = &self.secret_key {
            if key.len() < MIN_SECRET_KEY_LEN {
                return Err(SegError::Configuration {
                    message: format!(
                        "SECRET_KEY must be at least {} bytes, got {}",
                        MIN_SECRET_KEY_LEN,
                        key.len()
                    ),
                });
            }
        }
        if self.max_upload_bytes == 0 {
            return Err(SegError::Configuration {
                message: "MAX_UPLOAD_BYTES must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub const fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

fn parse_debug_flag(s: &str) -> std::result::Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}
