//! Harness configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `CHALLENGE_MOCK_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HarnessError, Result};
use crate::flow::ClientOptions;

/// Config file looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "challenge-mock.toml";

/// Prefix for environment overrides (e.g. `CHALLENGE_MOCK_DELAY_MS`)
pub const ENV_PREFIX: &str = "CHALLENGE_MOCK_";

/// Fixture served once the challenge has been solved
pub const REQUESTED_PAGE: &str = "requested_page.html";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Directory fixtures are read from, addressed by file name
    pub fixtures_dir: PathBuf,
    /// Delay handed to the client under test, in milliseconds
    pub delay_ms: u64,
    /// Fixture name of the page served after the redirect
    pub requested_page: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: default_fixtures_dir(),
            delay_ms: 10,
            requested_page: REQUESTED_PAGE.to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(HarnessConfig::default()));

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(HarnessError::ConfigNotFound(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                if local.exists() {
                    figment = figment.merge(Toml::file(local));
                }
            }
        }

        let config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        Ok(config)
    }

    /// Load from the working directory and environment, falling back to the
    /// built-in defaults if the layered config cannot be read
    pub fn load_or_default() -> Self {
        HarnessConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "using default harness config");
            HarnessConfig::default()
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

fn default_fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}
