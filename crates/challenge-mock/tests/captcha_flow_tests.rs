//! End-to-end tests for the terminal captcha flow

mod common;

use challenge_mock::{FixtureStore, FlowStage, Harness, HarnessError, Variant};
use common::{client, fixture, get};

#[tokio::test]
async fn test_captcha_is_terminal() {
    let harness = Harness::new(FixtureStore::shared());

    harness
        .with_captcha_flow("captcha.html", |scope| async move {
            let registered = scope.registered();
            assert_eq!(registered.len(), 1);
            assert_eq!(registered[0].variant(), Variant::Captcha);
            assert_eq!(registered[0].status(), 403);
            assert_eq!(scope.submit_url(), None);

            let agent = client();
            for _ in 0..2 {
                let reply = get(&agent, scope.base_url());
                assert_eq!(reply.status, 403);
                assert_eq!(reply.server.as_deref(), Some("cloudflare"));
                assert_eq!(reply.body, fixture("captcha.html"));
            }

            assert_eq!(scope.registered().len(), 1);
            assert!(scope.exchanges().iter().all(|e| e.outcome.status == 403));
            assert_eq!(scope.stage(), FlowStage::Challenged);
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_captcha_has_no_redirect_stage() {
    let harness = Harness::new(FixtureStore::shared());

    let result = harness
        .with_captcha_flow("captcha.html", |scope| async move {
            let agent = client();
            let reply = get(&agent, &scope.url("/cdn-cgi/l/chk_captcha?s=anything"));
            assert_eq!(reply.status, 404);
        })
        .await;

    assert!(matches!(result, Err(HarnessError::UnmatchedRequest { .. })));
}

#[tokio::test]
async fn test_captcha_missing_fixture() {
    let harness = Harness::new(FixtureStore::shared());

    let result = harness
        .with_captcha_flow("no_such_captcha.html", |_| async {})
        .await;

    assert!(matches!(result, Err(HarnessError::FixtureNotFound { .. })));
}
