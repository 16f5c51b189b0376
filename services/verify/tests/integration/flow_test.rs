use chrono::{Duration, Utc};
use futures::future::join_all;

use lorehaven_domain::verification::{VerificationPurpose, VerificationState};
use lorehaven_verify::error::{OtpError, TokenError, VerifyServiceError};

use crate::helpers::{Harness, test_user};

fn assert_invalid_state(result: Result<impl std::fmt::Debug, VerifyServiceError>, expected: VerificationState) {
    match result {
        Err(VerifyServiceError::InvalidState { state, .. }) => assert_eq!(state, expected),
        other => panic!("expected InvalidState({expected}), got {other:?}"),
    }
}

#[tokio::test]
async fn should_walk_from_unverified_to_otp_verified() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    assert_eq!(flow.status(user.id).await.unwrap().state, VerificationState::Unverified);

    let pending = flow
        .request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    assert_eq!(pending.state, VerificationState::EmailPending);
    let token = harness.outbox.last_token();

    let verified = flow.confirm_email(&token).await.unwrap();
    assert_eq!(verified.state, VerificationState::EmailVerified);
    assert!(verified.expires_at.is_some());

    let otp_pending = flow.request_otp(user.id).await.unwrap();
    assert_eq!(otp_pending.state, VerificationState::OtpPending);
    assert_eq!(otp_pending.expires_at, verified.expires_at);
    let code = harness.outbox.last_code();

    let done = flow.confirm_otp(user.id, &code).await.unwrap();
    assert_eq!(done.state, VerificationState::OtpVerified);
    assert_eq!(done.expires_at, None);
    assert_eq!(done.version, 4);

    // Both secrets are spent.
    let replay = flow.confirm_email(&token).await;
    assert!(
        matches!(replay, Err(VerifyServiceError::Token(TokenError::AlreadyConsumed))),
        "got {replay:?}"
    );
    let replay = flow.confirm_otp(user.id, &code).await;
    assert_invalid_state(replay, VerificationState::OtpVerified);
    assert_eq!(
        harness.sessions.get(user.id).unwrap().state,
        VerificationState::OtpVerified
    );
}

#[tokio::test]
async fn should_refuse_otp_before_email_confirmation() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    let before = harness.sessions.get(user.id).unwrap();

    assert_invalid_state(
        flow.confirm_otp(user.id, "123456").await,
        VerificationState::EmailPending,
    );
    assert_invalid_state(flow.request_otp(user.id).await, VerificationState::EmailPending);

    assert_eq!(harness.sessions.get(user.id).unwrap(), before);
    assert!(harness.outbox.of_kind("otp_challenge_issued").is_empty());
}

#[tokio::test]
async fn should_refuse_otp_for_user_without_session() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);

    assert_invalid_state(
        harness.flow().confirm_otp(user.id, "123456").await,
        VerificationState::Unverified,
    );
    assert!(harness.sessions.get(user.id).is_none());
}

#[tokio::test]
async fn should_resend_link_while_pending_and_retire_old_one() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    let first = harness.outbox.last_token();
    let resent = flow
        .request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    assert_eq!(resent.version, 2);
    let second = harness.outbox.last_token();

    let stale = flow.confirm_email(&first).await;
    assert!(
        matches!(stale, Err(VerifyServiceError::Token(TokenError::NotFound))),
        "got {stale:?}"
    );
    flow.confirm_email(&second).await.unwrap();
}

#[tokio::test]
async fn should_expire_pending_session_and_allow_restart() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    let token = harness.outbox.last_token();
    harness.sessions.update(user.id, |s| {
        s.expires_at = Some(Utc::now() - Duration::seconds(1));
    });

    assert_eq!(flow.status(user.id).await.unwrap().state, VerificationState::Expired);
    assert_invalid_state(flow.confirm_email(&token).await, VerificationState::Expired);

    let restarted = flow
        .request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    assert_eq!(restarted.state, VerificationState::EmailPending);
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
}

#[tokio::test]
async fn should_reject_expired_link() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    harness
        .tokens
        .update(|t| t.expires_at = Utc::now() - Duration::seconds(1));

    let result = flow.confirm_email(&harness.outbox.last_token()).await;
    assert!(
        matches!(result, Err(VerifyServiceError::Token(TokenError::Expired))),
        "got {result:?}"
    );
}

#[tokio::test]
async fn should_abandon_session_stalled_after_email() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();
    harness.sessions.update(user.id, |s| {
        s.expires_at = Some(Utc::now() - Duration::seconds(1));
    });

    assert_eq!(flow.status(user.id).await.unwrap().state, VerificationState::Abandoned);
    assert_invalid_state(
        flow.confirm_otp(user.id, &harness.outbox.last_code()).await,
        VerificationState::Abandoned,
    );
    assert_invalid_state(flow.request_otp(user.id).await, VerificationState::Abandoned);

    let restarted = flow
        .request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    assert_eq!(restarted.state, VerificationState::EmailPending);
}

#[tokio::test]
async fn should_reissue_code_after_exhaustion() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();
    harness.otps.update(|c| c.attempts_remaining = 0);

    let result = flow.confirm_otp(user.id, &harness.outbox.last_code()).await;
    assert!(
        matches!(result, Err(VerifyServiceError::Otp(OtpError::AttemptsExhausted))),
        "got {result:?}"
    );
    assert_eq!(
        harness.sessions.get(user.id).unwrap().state,
        VerificationState::OtpPending
    );

    flow.request_otp(user.id).await.unwrap();
    let done = flow
        .confirm_otp(user.id, &harness.outbox.last_code())
        .await
        .unwrap();
    assert_eq!(done.state, VerificationState::OtpVerified);
}

#[tokio::test]
async fn should_refuse_sign_up_restart_after_success() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();

    assert_invalid_state(
        flow.request_email_verification(user.id, VerificationPurpose::SignUp)
            .await,
        VerificationState::EmailVerified,
    );
}

#[tokio::test]
async fn should_restart_unfinished_verification_for_forgot_password() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();

    let session = flow
        .request_password_reset(&user.email)
        .await
        .unwrap()
        .expect("known email starts a session");
    assert_eq!(session.state, VerificationState::EmailPending);

    let events = harness.outbox.of_kind("email_verification_requested");
    assert_eq!(events.last().unwrap().payload["purpose"], "forgot_password");
}

#[tokio::test]
async fn should_keep_verified_session_on_forgot_password() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();
    flow.confirm_otp(user.id, &harness.outbox.last_code())
        .await
        .unwrap();
    let verified = harness.sessions.get(user.id).unwrap();

    let session = flow
        .request_password_reset(&user.email)
        .await
        .unwrap()
        .expect("known email answers with the session");
    assert_eq!(session.state, VerificationState::OtpVerified);
    assert_eq!(harness.sessions.get(user.id).unwrap(), verified);

    let events = harness.outbox.of_kind("email_verification_requested");
    assert_eq!(events.len(), 2);
    assert_eq!(events.last().unwrap().payload["purpose"], "forgot_password");

    // The reset link is spendable once and never reopens the verification.
    let link = harness.outbox.last_token();
    let confirmed = flow.confirm_email(&link).await.unwrap();
    assert_eq!(confirmed.state, VerificationState::OtpVerified);
    let replay = flow.confirm_email(&link).await;
    assert!(
        matches!(replay, Err(VerifyServiceError::Token(TokenError::AlreadyConsumed))),
        "got {replay:?}"
    );
    assert_eq!(harness.sessions.get(user.id).unwrap(), verified);
    assert_invalid_state(
        flow.request_email_verification(user.id, VerificationPurpose::SignUp)
            .await,
        VerificationState::OtpVerified,
    );
}

#[tokio::test]
async fn should_not_reveal_unknown_email_on_forgot_password() {
    let harness = Harness::new(vec![test_user()]);

    let result = harness
        .flow()
        .request_password_reset("nobody@lorehaven.example")
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(harness.outbox.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_report_unknown_user() {
    let harness = Harness::new(vec![]);
    let result = harness
        .flow()
        .request_email_verification(test_user().id, VerificationPurpose::SignUp)
        .await;
    assert!(matches!(result, Err(VerifyServiceError::UserNotFound)), "got {result:?}");
}

#[tokio::test]
async fn should_throttle_link_issuance() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    for _ in 0..5 {
        flow.request_email_verification(user.id, VerificationPurpose::SignUp)
            .await
            .unwrap();
    }
    let before = harness.sessions.get(user.id).unwrap();

    let result = flow
        .request_email_verification(user.id, VerificationPurpose::SignUp)
        .await;
    assert!(matches!(result, Err(VerifyServiceError::TooManyRequests)), "got {result:?}");
    assert_eq!(harness.sessions.get(user.id).unwrap(), before);
    assert_eq!(harness.outbox.of_kind("email_verification_requested").len(), 5);
}

#[tokio::test]
async fn should_advance_once_under_concurrent_confirmations() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    let token = harness.outbox.last_token();

    let results = join_all((0..4).map(|_| flow.confirm_email(&token))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let session = harness.sessions.get(user.id).unwrap();
    assert_eq!(session.state, VerificationState::EmailVerified);
    assert_eq!(session.version, 2);
}

#[tokio::test]
async fn should_keep_link_usable_when_session_moves_first() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    let token = harness.outbox.last_token();
    let before = harness.sessions.get(user.id).unwrap();

    harness.sessions.lose_next_advance();
    assert_invalid_state(flow.confirm_email(&token).await, VerificationState::EmailPending);
    assert_eq!(harness.sessions.get(user.id).unwrap(), before);
    assert!(
        harness
            .tokens
            .tokens
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.consumed_at.is_none())
    );

    let verified = flow.confirm_email(&token).await.unwrap();
    assert_eq!(verified.state, VerificationState::EmailVerified);
}

#[tokio::test]
async fn should_keep_code_usable_when_session_moves_first() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();
    let code = harness.outbox.last_code();
    let before = harness.sessions.get(user.id).unwrap();

    harness.sessions.lose_next_advance();
    assert_invalid_state(
        flow.confirm_otp(user.id, &code).await,
        VerificationState::OtpPending,
    );
    assert_eq!(harness.sessions.get(user.id).unwrap(), before);
    let challenges = harness.otps.challenges.lock().unwrap().clone();
    assert_eq!(challenges.len(), 1);
    assert!(challenges[0].consumed_at.is_none());
    assert_eq!(challenges[0].attempts_remaining, harness.policy.otp_max_attempts);

    let done = flow.confirm_otp(user.id, &code).await.unwrap();
    assert_eq!(done.state, VerificationState::OtpVerified);
}

#[tokio::test]
async fn should_advance_once_under_concurrent_code_confirmations() {
    let user = test_user();
    let harness = Harness::new(vec![user.clone()]);
    let flow = harness.flow();

    flow.request_email_verification(user.id, VerificationPurpose::SignUp)
        .await
        .unwrap();
    flow.confirm_email(&harness.outbox.last_token()).await.unwrap();
    flow.request_otp(user.id).await.unwrap();
    let code = harness.outbox.last_code();

    let results = join_all((0..4).map(|_| flow.confirm_otp(user.id, &code))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let session = harness.sessions.get(user.id).unwrap();
    assert_eq!(session.state, VerificationState::OtpVerified);
    assert_eq!(session.version, 4);
}
