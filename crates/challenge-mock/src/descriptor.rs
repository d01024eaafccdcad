//! Canned HTTP responses with per-variant defaults
//!
//! A [`ResponseDescriptor`] starts from the defaults of its [`Variant`] and
//! applies caller [`Overrides`] on top. Explicit values always win.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use url::{Position, Url};
use wiremock::ResponseTemplate;

use crate::error::Result;
use crate::registry::SequenceRegistry;

/// Named response shapes served during a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The JS challenge page (stage 1)
    Challenge,
    /// Redirect sent back after a correct answer (stage 2)
    Redirect,
    /// The page behind the challenge (stage 3)
    Default,
    /// reCAPTCHA page, a Challenge served with 403
    Captcha,
}

/// Field values a variant falls back to
struct Defaults {
    method: String,
    status: u16,
    headers: HashMap<String, String>,
    content_type: String,
    body: Body,
}

impl Variant {
    /// Fresh default fields; nothing is shared between calls
    fn defaults(self) -> Defaults {
        match self {
            Variant::Challenge => Defaults {
                method: "GET".to_string(),
                status: 503,
                headers: header_map(&[("Server", "cloudflare")]),
                content_type: "text/html".to_string(),
                body: Body::empty(),
            },
            Variant::Redirect => Defaults {
                method: "GET".to_string(),
                status: 302,
                headers: header_map(&[("Location", "/")]),
                content_type: "text/html".to_string(),
                body: Body::empty(),
            },
            Variant::Default => Defaults {
                method: "GET".to_string(),
                status: 200,
                headers: HashMap::new(),
                content_type: "text/html".to_string(),
                body: Body::empty(),
            },
            Variant::Captcha => Defaults {
                status: 403,
                ..Variant::Challenge.defaults()
            },
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Challenge => "challenge",
            Variant::Redirect => "redirect",
            Variant::Default => "default",
            Variant::Captcha => "captcha",
        };
        f.write_str(name)
    }
}

fn header_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Response body, either fixed bytes or produced on demand
#[derive(Clone)]
pub enum Body {
    Bytes(Arc<[u8]>),
    Lazy(Arc<dyn Fn() -> Vec<u8> + Send + Sync>),
}

impl Body {
    pub fn empty() -> Self {
        Body::Bytes(Arc::from(Vec::new()))
    }

    pub fn lazy(f: impl Fn() -> Vec<u8> + Send + Sync + 'static) -> Self {
        Body::Lazy(Arc::new(f))
    }

    /// Evaluate the body
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Bytes(bytes) => bytes.to_vec(),
            Body::Lazy(f) => f(),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

impl From<Arc<[u8]>> for Body {
    fn from(bytes: Arc<[u8]>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Arc::from(bytes))
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Bytes(Arc::from(text.as_bytes()))
    }
}

/// What a descriptor is matched against.
///
/// Only the path and query of a request take part in matching; the host is
/// always the scope's mock server.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Exact path and query, normalized through URL parsing
    Exact(String),
    /// Regular expression over the path and query
    Regex(Regex),
}

impl UrlPattern {
    /// Exact match on an absolute URL
    pub fn exact(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        Ok(UrlPattern::Exact(path_and_query(&parsed).to_string()))
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(UrlPattern::Regex(Regex::new(pattern)?))
    }

    /// `target` is a request's path and query
    pub fn matches(&self, target: &str) -> bool {
        match self {
            UrlPattern::Exact(expected) => expected == target,
            UrlPattern::Regex(re) => re.is_match(target),
        }
    }
}

/// Path plus query of `url`, without fragment
pub fn path_and_query(url: &Url) -> &str {
    &url[Position::BeforePath..Position::AfterQuery]
}

/// Snapshot of a request that reached the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRequest {
    pub method: String,
    /// Path and query
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl MatchedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl From<&wiremock::Request> for MatchedRequest {
    fn from(request: &wiremock::Request) -> Self {
        Self {
            method: request.method.to_string(),
            url: path_and_query(&request.url).to_string(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        v.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
        }
    }
}

/// The response actually served for a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl MatchOutcome {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn into_template(self) -> ResponseTemplate {
        let mut template = ResponseTemplate::new(self.status);
        for (name, value) in &self.headers {
            template = template.insert_header(name.as_str(), value.as_str());
        }
        template.set_body_raw(self.body, &self.content_type)
    }
}

/// Everything an `on_match` callback gets to see
pub struct MatchContext<'a> {
    pub request: &'a MatchedRequest,
    pub descriptor: &'a ResponseDescriptor,
    /// Live registry, for registering follow-up responses
    pub registry: &'a SequenceRegistry,
}

/// Side-effecting hook run when a descriptor is selected
pub type OnMatch = Arc<dyn Fn(&MatchContext<'_>) -> MatchOutcome + Send + Sync>;

/// Caller-supplied fields that replace variant defaults
#[derive(Clone, Default)]
pub struct Overrides {
    method: Option<String>,
    status: Option<u16>,
    headers: Option<HashMap<String, String>>,
    content_type: Option<String>,
    body: Option<Body>,
    on_match: Option<OnMatch>,
    extensions: BTreeMap<String, String>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the whole header map
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn on_match(
        mut self,
        f: impl Fn(&MatchContext<'_>) -> MatchOutcome + Send + Sync + 'static,
    ) -> Self {
        self.on_match = Some(Arc::new(f));
        self
    }

    /// Any other key, carried on the descriptor untouched
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }
}

/// One canned response a mock transport may return
#[derive(Clone)]
pub struct ResponseDescriptor {
    variant: Variant,
    url: UrlPattern,
    method: String,
    status: u16,
    headers: HashMap<String, String>,
    content_type: String,
    body: Body,
    on_match: Option<OnMatch>,
    extensions: BTreeMap<String, String>,
}

impl ResponseDescriptor {
    pub fn new(variant: Variant, url: UrlPattern, overrides: Overrides) -> Self {
        let defaults = variant.defaults();
        Self {
            variant,
            url,
            method: overrides.method.unwrap_or(defaults.method),
            status: overrides.status.unwrap_or(defaults.status),
            headers: overrides.headers.unwrap_or(defaults.headers),
            content_type: overrides.content_type.unwrap_or(defaults.content_type),
            body: overrides.body.unwrap_or(defaults.body),
            on_match: overrides.on_match,
            extensions: overrides.extensions,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn url(&self) -> &UrlPattern {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    pub fn has_on_match(&self) -> bool {
        self.on_match.is_some()
    }

    /// Whether a request with `method` and path-and-query `url` selects this descriptor
    pub fn matches(&self, method: &str, url: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.url.matches(url)
    }

    /// The response described by the descriptor's own fields
    pub fn outcome(&self) -> MatchOutcome {
        MatchOutcome {
            status: self.status,
            headers: self.headers.clone(),
            content_type: self.content_type.clone(),
            body: self.body.to_bytes(),
        }
    }

    /// Run `on_match` if present, otherwise serve the plain outcome
    pub(crate) fn respond(
        &self,
        request: &MatchedRequest,
        registry: &SequenceRegistry,
    ) -> MatchOutcome {
        match &self.on_match {
            Some(on_match) => on_match(&MatchContext {
                request,
                descriptor: self,
                registry,
            }),
            None => self.outcome(),
        }
    }
}

impl fmt::Debug for ResponseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDescriptor")
            .field("variant", &self.variant)
            .field("url", &self.url)
            .field("method", &self.method)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_type", &self.content_type)
            .field("body", &self.body)
            .field("on_match", &self.on_match.is_some())
            .field("extensions", &self.extensions)
            .finish()
    }
}
