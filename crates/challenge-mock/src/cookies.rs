//! Example cookies set by the challenge gate

pub const COOKIE_DOMAIN: &str = ".example-site.dev";
pub const COOKIE_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
}

impl Cookie {
    fn site(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: COOKIE_PATH.to_string(),
            domain: COOKIE_DOMAIN.to_string(),
        }
    }

    /// Value for a `Set-Cookie` response header
    pub fn set_cookie_header(&self) -> String {
        format!(
            "{}={}; Path={}; Domain={}",
            self.name, self.value, self.path, self.domain
        )
    }
}

/// The cookie set when the challenge is presented and the clearance cookie
/// set once it is passed
pub fn cookie_pair() -> (Cookie, Cookie) {
    (
        Cookie::site("__cfduid", "uid-1"),
        Cookie::site("cf_clearance", "uid-2"),
    )
}
