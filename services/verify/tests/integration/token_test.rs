use chrono::{Duration, Utc};
use futures::future::join_all;
use uuid::Uuid;

use lorehaven_domain::verification::VerificationPurpose;
use lorehaven_verify::domain::types::{VerificationToken, VerifyUser};
use lorehaven_verify::error::{TokenError, VerifyServiceError};
use lorehaven_verify::usecase::token::{generate_token_value, hash_token};

use crate::helpers::{Harness, link_base, test_user};

fn stored_token(user: &VerifyUser, value: &str, expires_in: Duration) -> VerificationToken {
    let now = Utc::now();
    VerificationToken {
        id: Uuid::now_v7(),
        user_id: user.id,
        token_hash: hash_token(value),
        purpose: VerificationPurpose::SignUp,
        issued_at: now,
        expires_at: now + expires_in,
        consumed_at: None,
    }
}

#[tokio::test]
async fn should_store_only_hash_and_queue_link() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let service = harness.token_service();

    let issued = service
        .issue(&user, VerificationPurpose::SignUp, &link_base(), Utc::now())
        .await
        .unwrap();

    assert_eq!(issued.value.len(), 43);
    let tokens = harness.tokens.tokens.lock().unwrap().clone();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_hash, hash_token(&issued.value));
    assert_eq!(tokens[0].purpose, VerificationPurpose::SignUp);
    assert_eq!(tokens[0].expires_at - tokens[0].issued_at, Duration::hours(24));

    let events = harness.outbox.of_kind("email_verification_requested");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["email"], user.email);
    assert_eq!(events[0].payload["purpose"], "sign_up");
    assert_eq!(
        events[0].payload["verify_url"],
        format!("https://lorehaven.example/verify/email/{}", issued.value)
    );
}

#[tokio::test]
async fn should_supersede_previous_unconsumed_token() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let service = harness.token_service();
    let now = Utc::now();

    let first = service
        .issue(&user, VerificationPurpose::SignUp, &link_base(), now)
        .await
        .unwrap();
    let second = service
        .issue(&user, VerificationPurpose::SignUp, &link_base(), now)
        .await
        .unwrap();

    let result = service.consume(&first.value, now).await;
    assert!(
        matches!(result, Err(VerifyServiceError::Token(TokenError::NotFound))),
        "superseded token must not verify, got {result:?}"
    );
    service.consume(&second.value, now).await.unwrap();
}

#[tokio::test]
async fn should_reject_every_consume_after_the_first() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let service = harness.token_service();
    let issued = service
        .issue(&user, VerificationPurpose::SignUp, &link_base(), Utc::now())
        .await
        .unwrap();

    let consumed = service.consume(&issued.value, Utc::now()).await.unwrap();
    assert!(consumed.consumed_at.is_some());

    for _ in 0..3 {
        let result = service.consume(&issued.value, Utc::now()).await;
        assert!(
            matches!(result, Err(VerifyServiceError::Token(TokenError::AlreadyConsumed))),
            "expected AlreadyConsumed, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_let_exactly_one_concurrent_consume_win() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let service = harness.token_service();
    let issued = service
        .issue(&user, VerificationPurpose::SignUp, &link_base(), Utc::now())
        .await
        .unwrap();

    let now = Utc::now();
    let results = join_all((0..8).map(|_| service.consume(&issued.value, now))).await;

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one consume must succeed");
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(VerifyServiceError::Token(TokenError::AlreadyConsumed))),
            "losers must observe AlreadyConsumed, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_report_expired_token() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let value = generate_token_value();
    harness
        .tokens
        .insert(stored_token(&user, &value, Duration::seconds(-1)));

    let result = harness.token_service().consume(&value, Utc::now()).await;
    assert!(
        matches!(result, Err(VerifyServiceError::Token(TokenError::Expired))),
        "expected Expired, got {result:?}"
    );
    assert!(harness.tokens.tokens.lock().unwrap()[0].consumed_at.is_none());
}

#[tokio::test]
async fn should_report_replay_of_expired_consumed_token_as_consumed() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let value = generate_token_value();
    let mut token = stored_token(&user, &value, Duration::seconds(-1));
    token.consumed_at = Some(Utc::now() - Duration::minutes(5));
    harness.tokens.insert(token);

    let result = harness.token_service().inspect(&value, Utc::now()).await;
    assert!(
        matches!(result, Err(VerifyServiceError::Token(TokenError::AlreadyConsumed))),
        "expected AlreadyConsumed, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_unknown_token_as_not_found() {
    let harness = Harness::new(vec![]);
    let result = harness
        .token_service()
        .consume(&generate_token_value(), Utc::now())
        .await;
    assert!(
        matches!(result, Err(VerifyServiceError::Token(TokenError::NotFound))),
        "expected NotFound, got {result:?}"
    );
}
