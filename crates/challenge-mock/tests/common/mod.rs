//! Common test utilities
#![allow(dead_code)]

use std::sync::Once;

/// Response as seen by the stand-in client
pub struct Reply {
    pub status: u16,
    pub location: Option<String>,
    pub server: Option<String>,
    pub body: Vec<u8>,
}

/// Blocking client that never follows redirects, so every stage is observable
pub fn client() -> ureq::Agent {
    ureq::Agent::config_builder()
        .max_redirects(0)
        .http_status_as_error(false)
        .build()
        .into()
}

pub fn get(agent: &ureq::Agent, url: &str) -> Reply {
    let mut response = agent.get(url).call().expect("request failed");
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let status = response.status().as_u16();
    let location = header("location");
    let server = header("server");
    let body = response
        .body_mut()
        .read_to_vec()
        .expect("failed to read body");

    Reply {
        status,
        location,
        server,
        body,
    }
}

pub fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).expect("fixture exists")
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
