//! Mocked anti-bot JS challenge responses for end-to-end client tests
//!
//! This crate stands up a local mock server that plays the part of a site
//! behind a "checking your browser" gate, so a challenge-solving client can be
//! exercised without touching the network:
//!
//! 1. **Challenge**: the base URL answers `503` with a challenge page fixture
//! 2. **Redirect**: the exact answer submission URL answers `302`
//! 3. **Solved**: only after the redirect, the base URL answers `200` with the
//!    requested page
//!
//! A captcha flow serves a single terminal `403` page instead.
//!
//! # Usage
//!
//! ```no_run
//! use challenge_mock::{ChallengeFlow, FixtureStore, Harness};
//!
//! # async fn run() -> challenge_mock::Result<()> {
//! let harness = Harness::new(FixtureStore::shared());
//! harness
//!     .with_challenge_flow(ChallengeFlow::new("js_challenge.html", "42"), |scope| async move {
//!         // point the client under test at scope.base_url()
//!         let _ = scope.options().delay;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Fixtures
//!
//! Fixtures are read by file name from the configured fixtures directory
//! (`tests/fixtures` by default, or `CHALLENGE_MOCK_FIXTURES_DIR`).

pub mod config;
pub mod cookies;
pub mod descriptor;
pub mod error;
pub mod fixtures;
pub mod flow;
pub mod registry;
pub mod tokens;

pub use config::HarnessConfig;
pub use cookies::{cookie_pair, Cookie};
pub use descriptor::{
    Body, MatchContext, MatchOutcome, MatchedRequest, OnMatch, Overrides, ResponseDescriptor,
    UrlPattern, Variant,
};
pub use error::{HarnessError, Result};
pub use fixtures::{FixtureBytes, FixtureStore};
pub use flow::{ChallengeFlow, ClientOptions, FlowStage, Harness, MockScope, RedirectHook};
pub use registry::{Exchange, SequenceRegistry};
pub use tokens::{extract, submit_url, ChallengeTokens, SUBMIT_PATH};
