//! Hidden-field extraction and submission URL construction

use std::sync::LazyLock;

use regex::Regex;
use url::form_urlencoded;

use crate::error::{HarnessError, Result};

/// Path the challenge form submits to
pub const SUBMIT_PATH: &str = "/cdn-cgi/l/chk_jschl";

static S_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="s"\svalue="(?P<value>[^"]+)"#).expect("valid token pattern")
});
static JSCHL_VC_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="jschl_vc" value="(\w+)""#).expect("valid token pattern")
});
static PASS_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="pass" value="(.+?)""#).expect("valid token pattern")
});

/// Values the client must echo back when submitting its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeTokens {
    /// Session token; omitted from the query when absent
    pub s: Option<String>,
    pub jschl_vc: String,
    pub pass: String,
    pub jschl_answer: String,
}

impl ChallengeTokens {
    /// Query parameters in submission order
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(s) = &self.s {
            pairs.push(("s", s.as_str()));
        }
        pairs.push(("jschl_vc", self.jschl_vc.as_str()));
        pairs.push(("pass", self.pass.as_str()));
        pairs.push(("jschl_answer", self.jschl_answer.as_str()));
        pairs
    }
}

/// Pull the hidden form fields out of a challenge page
pub fn extract(html: &str, answer: &str) -> Result<ChallengeTokens> {
    let s = S_FIELD.captures(html).map(|caps| caps["value"].to_string());

    let jschl_vc = JSCHL_VC_FIELD
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or(HarnessError::MissingToken("jschl_vc"))?;

    let pass = PASS_FIELD
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or(HarnessError::MissingToken("pass"))?;

    Ok(ChallengeTokens {
        s,
        jschl_vc,
        pass,
        jschl_answer: answer.to_string(),
    })
}

/// Build the exact URL a correct client submits its answer to
pub fn submit_url(base_url: &str, tokens: &ChallengeTokens) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(tokens.query_pairs())
        .finish();
    format!(
        "{}{}?{}",
        base_url.trim_end_matches('/'),
        SUBMIT_PATH,
        query
    )
}
