//! Scoped challenge and captcha flows
//!
//! Each flow starts a mock server, registers the responses for its stage
//! sequence, runs the test body against it and tears everything down on the
//! way out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scopeguard::ScopeGuard;
use tracing::{debug, info};
use wiremock::MockServer;

use crate::config::HarnessConfig;
use crate::descriptor::{
    MatchOutcome, MatchedRequest, Overrides, ResponseDescriptor, UrlPattern, Variant,
};
use crate::error::{HarnessError, Result};
use crate::fixtures::{FixtureBytes, FixtureStore};
use crate::registry::{Exchange, SequenceRegistry};
use crate::tokens;

/// Options passed through to the client under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// How long the client should wait before submitting its answer
    pub delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        HarnessConfig::default().client_options()
    }
}

/// Progress of a client through the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowStage {
    /// Nothing served yet
    Unsolved,
    /// The challenge page has been served
    Challenged,
    /// The answer was accepted; the requested page is now registered
    Solved,
}

#[derive(Clone)]
struct StageCell(Arc<Mutex<FlowStage>>);

impl StageCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(FlowStage::Unsolved)))
    }

    fn get(&self) -> FlowStage {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move forward to `next`; returns false if already there or beyond
    fn advance(&self, next: FlowStage) -> bool {
        let mut stage = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *stage >= next {
            return false;
        }
        debug!(from = ?*stage, to = ?next, "challenge stage advanced");
        *stage = next;
        true
    }
}

/// Hook run when the answer submission is matched.
///
/// Returning `Some` replaces the redirect response that is served.
pub type RedirectHook = Arc<dyn Fn(&MatchedRequest) -> Option<MatchOutcome> + Send + Sync>;

/// Parameters of a JS challenge flow
#[derive(Clone)]
pub struct ChallengeFlow {
    fixture: String,
    answer: String,
    redirect_to: String,
    on_redirect: Option<RedirectHook>,
}

impl ChallengeFlow {
    /// Serve `fixture` as the challenge and expect `answer` in the submission
    pub fn new(fixture: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            fixture: fixture.into(),
            answer: answer.into(),
            redirect_to: "/".to_string(),
            on_redirect: None,
        }
    }

    /// Location sent back once the answer is accepted (default `/`).
    ///
    /// An empty location keeps the default.
    pub fn redirect_to(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        if !location.is_empty() {
            self.redirect_to = location;
        }
        self
    }

    pub fn on_redirect(
        mut self,
        hook: impl Fn(&MatchedRequest) -> Option<MatchOutcome> + Send + Sync + 'static,
    ) -> Self {
        self.on_redirect = Some(Arc::new(hook));
        self
    }
}

/// View of a live mock scope handed to the test body
#[derive(Clone)]
pub struct MockScope {
    base_url: String,
    submit_url: Option<String>,
    options: ClientOptions,
    registry: SequenceRegistry,
    stage: StageCell,
}

impl MockScope {
    /// Base URL of the protected site
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path` on the protected site
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL a correct client submits its answer to (challenge flow only)
    pub fn submit_url(&self) -> Option<&str> {
        self.submit_url.as_deref()
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn stage(&self) -> FlowStage {
        self.stage.get()
    }

    pub fn registered(&self) -> Vec<ResponseDescriptor> {
        self.registry.registered()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.registry.exchanges()
    }

    pub fn unmatched(&self) -> Vec<MatchedRequest> {
        self.registry.unmatched()
    }
}

/// Keep the mock server alive until the guard drops, then clear the
/// registry and shut the server down, on every exit path
fn close_on_exit(
    server: MockServer,
    registry: SequenceRegistry,
) -> ScopeGuard<MockServer, impl FnOnce(MockServer)> {
    scopeguard::guard(server, move |server| {
        registry.clear();
        drop(server);
        info!("mock scope closed");
    })
}

/// Entry point for running test bodies inside mocked challenge scopes
pub struct Harness<'a> {
    fixtures: &'a FixtureStore,
    options: ClientOptions,
    requested_page: String,
}

impl<'a> Harness<'a> {
    /// Harness over `fixtures`, configured from the working directory and
    /// `CHALLENGE_MOCK_*` environment
    pub fn new(fixtures: &'a FixtureStore) -> Self {
        Self::from_config(fixtures, &HarnessConfig::load_or_default())
    }

    pub fn from_config(fixtures: &'a FixtureStore, config: &HarnessConfig) -> Self {
        Self {
            fixtures,
            options: config.client_options(),
            requested_page: config.requested_page.clone(),
        }
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    /// Run `test` against the full JS challenge sequence.
    ///
    /// Serves the challenge at the base URL, a redirect at the exact
    /// submission URL, and only after that redirect has been served the
    /// requested page at the base URL. Fixture and token errors abort before
    /// anything is registered.
    pub async fn with_challenge_flow<F, Fut, T>(&self, flow: ChallengeFlow, test: F) -> Result<T>
    where
        F: FnOnce(MockScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let page = self.fixtures.load(&flow.fixture)?;
        let html = std::str::from_utf8(&page).map_err(|e| HarnessError::FixtureEncoding {
            name: flow.fixture.clone(),
            source: e,
        })?;
        let tokens = tokens::extract(html, &flow.answer)?;
        let requested_page = self.fixtures.load(&self.requested_page)?;

        let server = MockServer::start().await;
        let base_url = server.uri();
        let submit_url = tokens::submit_url(&base_url, &tokens);
        let base = UrlPattern::exact(&base_url)?;
        let submit = UrlPattern::exact(&submit_url)?;

        let scope = self.open_scope(&server, base_url, Some(submit_url)).await;
        let guard = close_on_exit(server, scope.registry.clone());
        info!(fixture = %flow.fixture, base_url = %scope.base_url, "challenge scope opened");

        scope.registry.register(challenge_descriptor(
            Variant::Challenge,
            base.clone(),
            page,
            &scope.stage,
        ));
        scope.registry.register(redirect_descriptor(
            &flow,
            submit,
            base,
            requested_page,
            &scope.stage,
        ));

        let output = test(scope.clone()).await;
        let unmatched = scope.unmatched();
        drop(guard);

        finish(output, unmatched)
    }

    /// Run `test` against a terminal captcha page.
    ///
    /// Registers a single 403 captcha response at the base URL; there is no
    /// way past it.
    pub async fn with_captcha_flow<F, Fut, T>(&self, fixture: &str, test: F) -> Result<T>
    where
        F: FnOnce(MockScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let page = self.fixtures.load(fixture)?;

        let server = MockServer::start().await;
        let base_url = server.uri();
        let base = UrlPattern::exact(&base_url)?;

        let scope = self.open_scope(&server, base_url, None).await;
        let guard = close_on_exit(server, scope.registry.clone());
        info!(fixture, base_url = %scope.base_url, "captcha scope opened");

        scope.registry.register(challenge_descriptor(
            Variant::Captcha,
            base,
            page,
            &scope.stage,
        ));

        let output = test(scope.clone()).await;
        let unmatched = scope.unmatched();
        drop(guard);

        finish(output, unmatched)
    }

    async fn open_scope(
        &self,
        server: &MockServer,
        base_url: String,
        submit_url: Option<String>,
    ) -> MockScope {
        let registry = SequenceRegistry::new();
        registry.mount(server).await;
        MockScope {
            base_url,
            submit_url,
            options: self.options,
            registry,
            stage: StageCell::new(),
        }
    }
}

/// Challenge or captcha page; serving it marks the client as challenged
fn challenge_descriptor(
    variant: Variant,
    base: UrlPattern,
    page: FixtureBytes,
    stage: &StageCell,
) -> ResponseDescriptor {
    let stage = stage.clone();
    ResponseDescriptor::new(
        variant,
        base,
        Overrides::new().body(page).on_match(move |ctx| {
            stage.advance(FlowStage::Challenged);
            ctx.descriptor.outcome()
        }),
    )
}

/// Redirect for the answer submission; the first match registers the
/// requested page at the base URL
fn redirect_descriptor(
    flow: &ChallengeFlow,
    submit: UrlPattern,
    base: UrlPattern,
    requested_page: FixtureBytes,
    stage: &StageCell,
) -> ResponseDescriptor {
    let solved_page =
        ResponseDescriptor::new(Variant::Default, base, Overrides::new().body(requested_page));
    let hook = flow.on_redirect.clone();
    let stage = stage.clone();

    let mut headers = HashMap::new();
    headers.insert("Location".to_string(), flow.redirect_to.clone());

    ResponseDescriptor::new(
        Variant::Redirect,
        submit,
        Overrides::new().headers(headers).on_match(move |ctx| {
            let replacement = hook.as_ref().and_then(|hook| hook(ctx.request));
            if stage.advance(FlowStage::Solved) {
                ctx.registry.register(solved_page.clone());
            }
            replacement.unwrap_or_else(|| ctx.descriptor.outcome())
        }),
    )
}

fn finish<T>(output: T, unmatched: Vec<MatchedRequest>) -> Result<T> {
    match unmatched.into_iter().next() {
        Some(request) => Err(HarnessError::UnmatchedRequest {
            method: request.method,
            url: request.url,
        }),
        None => Ok(output),
    }
}
