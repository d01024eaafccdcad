//! Environment configuration reaching the default entry points.
//!
//! Kept in its own test binary: the shared fixture store reads the config
//! once per process.

mod common;

use challenge_mock::{ChallengeFlow, FixtureStore, Harness};
use common::{client, fixture, get};

#[tokio::test]
async fn test_env_configures_shared_store_and_harness() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("only_here.html"), fixture("page.html")).unwrap();
    std::fs::write(dir.path().join("landing.html"), b"<h1>landing</h1>").unwrap();

    std::env::set_var("CHALLENGE_MOCK_FIXTURES_DIR", dir.path());
    std::env::set_var("CHALLENGE_MOCK_DELAY_MS", "0");
    std::env::set_var("CHALLENGE_MOCK_REQUESTED_PAGE", "landing.html");

    let store = FixtureStore::shared();
    assert_eq!(store.dir(), dir.path());
    assert!(store.load("only_here.html").is_ok());

    let harness = Harness::new(store);
    assert!(harness.options().delay.is_zero());

    harness
        .with_challenge_flow(ChallengeFlow::new("only_here.html", "42"), |scope| async move {
            assert!(scope.options().delay.is_zero());

            let agent = client();
            assert_eq!(get(&agent, scope.submit_url().unwrap()).status, 302);
            let page = get(&agent, scope.base_url());
            assert_eq!(page.status, 200);
            assert_eq!(page.body, b"<h1>landing</h1>");
        })
        .await
        .unwrap();
}
