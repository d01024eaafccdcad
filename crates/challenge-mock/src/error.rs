use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing or tearing down a mocked challenge scope
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture not found: {name} ({path})")]
    FixtureNotFound { name: String, path: PathBuf },

    #[error("Failed to read fixture {path}: {source}")]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture {name} is not valid UTF-8: {source}")]
    FixtureEncoding {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Required token '{0}' not found in challenge page")]
    MissingToken(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to load config: {0}")]
    Config(Box<figment::Error>),

    #[error("No registered response for {method} {url}")]
    UnmatchedRequest { method: String, url: String },
}

impl From<figment::Error> for HarnessError {
    fn from(err: figment::Error) -> Self {
        HarnessError::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
