//! The ordered set of responses live in a mock scope
//!
//! Descriptors are kept in registration order. When several match a request
//! the most recently registered one is served, so a later registration for a
//! URL supersedes an earlier one. Requests nothing matches fall through to a
//! catch-all that answers 404 and records them as unmatched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use wiremock::matchers::any;
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::descriptor::{
    path_and_query, MatchOutcome, MatchedRequest, ResponseDescriptor, Variant,
};

/// A request that was answered by a registered descriptor
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: MatchedRequest,
    pub variant: Variant,
    pub outcome: MatchOutcome,
}

#[derive(Default)]
struct RegistryState {
    descriptors: Vec<ResponseDescriptor>,
    exchanges: Vec<Exchange>,
    unmatched: Vec<MatchedRequest>,
}

/// Shared handle to the registered response sequence
#[derive(Clone, Default)]
pub struct SequenceRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor; it becomes visible to the next request
    pub fn register(&self, descriptor: ResponseDescriptor) {
        debug!(
            variant = %descriptor.variant(),
            method = descriptor.method(),
            url = ?descriptor.url(),
            status = descriptor.status(),
            "registered response"
        );
        self.state().descriptors.push(descriptor);
    }

    /// Currently registered descriptors, in registration order
    pub fn registered(&self) -> Vec<ResponseDescriptor> {
        self.state().descriptors.clone()
    }

    pub fn len(&self) -> usize {
        self.state().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().descriptors.is_empty()
    }

    /// Requests served so far, in order
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.state().exchanges.clone()
    }

    /// Requests that matched nothing, in order
    pub fn unmatched(&self) -> Vec<MatchedRequest> {
        self.state().unmatched.clone()
    }

    /// Descriptor that would answer `method` + `url` (path and query)
    pub fn resolve(&self, method: &str, url: &str) -> Option<ResponseDescriptor> {
        self.state()
            .descriptors
            .iter()
            .rev()
            .find(|d| d.matches(method, url))
            .cloned()
    }

    /// Drop every registration and recorded request
    pub fn clear(&self) {
        let mut state = self.state();
        state.descriptors.clear();
        state.exchanges.clear();
        state.unmatched.clear();
    }

    /// Serve a request, running the selected descriptor's `on_match`.
    ///
    /// The lock is released before `on_match` runs so it may register
    /// further descriptors.
    pub fn dispatch(&self, request: &MatchedRequest) -> Option<MatchOutcome> {
        let descriptor = self.resolve(&request.method, &request.url)?;
        let outcome = descriptor.respond(request, self);
        debug!(
            variant = %descriptor.variant(),
            method = %request.method,
            url = %request.url,
            status = outcome.status,
            "served registered response"
        );
        self.state().exchanges.push(Exchange {
            request: request.clone(),
            variant: descriptor.variant(),
            outcome: outcome.clone(),
        });
        Some(outcome)
    }

    fn record_unmatched(&self, request: MatchedRequest) {
        warn!(
            method = %request.method,
            url = %request.url,
            "no registered response for request"
        );
        self.state().unmatched.push(request);
    }

    /// Bind the registry to a mock server
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(Registered(self.clone()))
            .respond_with(Registered(self.clone()))
            .named("registered challenge sequence")
            .mount(server)
            .await;

        Mock::given(any())
            .respond_with(Unmatched(self.clone()))
            .with_priority(u8::MAX)
            .named("unmatched request")
            .mount(server)
            .await;
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Matches and answers requests covered by a registered descriptor
struct Registered(SequenceRegistry);

impl Match for Registered {
    fn matches(&self, request: &Request) -> bool {
        self.0
            .resolve(request.method.as_str(), path_and_query(&request.url))
            .is_some()
    }
}

impl Respond for Registered {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let request = MatchedRequest::from(request);
        match self.0.dispatch(&request) {
            Some(outcome) => outcome.into_template(),
            None => {
                let template = unmatched_template(&request);
                self.0.record_unmatched(request);
                template
            }
        }
    }
}

/// Lowest-priority fallback for requests no descriptor covers
struct Unmatched(SequenceRegistry);

impl Respond for Unmatched {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let request = MatchedRequest::from(request);
        let template = unmatched_template(&request);
        self.0.record_unmatched(request);
        template
    }
}

fn unmatched_template(request: &MatchedRequest) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_string(format!(
        "No registered response for {} {}",
        request.method, request.url
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Overrides, UrlPattern};

    fn request(url: &str) -> MatchedRequest {
        MatchedRequest {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: Vec::new(),
        }
    }

    fn descriptor(variant: Variant, url: &str, body: &str) -> ResponseDescriptor {
        ResponseDescriptor::new(
            variant,
            UrlPattern::exact(url).unwrap(),
            Overrides::new().body(body),
        )
    }

    #[test]
    fn test_later_registration_supersedes() {
        let registry = SequenceRegistry::new();
        registry.register(descriptor(Variant::Challenge, "http://mock", "challenge"));

        let served = registry.dispatch(&request("/")).unwrap();
        assert_eq!(served.status, 503);

        registry.register(descriptor(Variant::Default, "http://mock", "page"));
        let served = registry.dispatch(&request("/")).unwrap();
        assert_eq!(served.status, 200);
        assert_eq!(served.body, b"page");

        let variants: Vec<_> = registry.exchanges().iter().map(|e| e.variant).collect();
        assert_eq!(variants, [Variant::Challenge, Variant::Default]);
    }

    #[test]
    fn test_no_match() {
        let registry = SequenceRegistry::new();
        registry.register(descriptor(Variant::Challenge, "http://mock", "challenge"));

        assert!(registry.dispatch(&request("/other")).is_none());
        assert!(registry.exchanges().is_empty());
    }

    #[test]
    fn test_on_match_can_register() {
        let registry = SequenceRegistry::new();
        let follow_up = descriptor(Variant::Default, "http://mock", "page");
        registry.register(ResponseDescriptor::new(
            Variant::Redirect,
            UrlPattern::exact("http://mock/next").unwrap(),
            Overrides::new().on_match(move |ctx| {
                ctx.registry.register(follow_up.clone());
                ctx.descriptor.outcome()
            }),
        ));

        assert!(registry.resolve("GET", "/").is_none());
        let served = registry.dispatch(&request("/next")).unwrap();
        assert_eq!(served.status, 302);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("GET", "/").unwrap().status(), 200);
    }

    #[test]
    fn test_clear() {
        let registry = SequenceRegistry::new();
        registry.register(descriptor(Variant::Default, "http://mock", "page"));
        registry.dispatch(&request("/"));
        registry.record_unmatched(request("/missing"));

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.exchanges().is_empty());
        assert!(registry.unmatched().is_empty());
    }
}
