//! Session flows over in-memory backends.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use blood_for_nepal_core::validation::SignUpDraft;
use blood_for_nepal_integration_tests::{FakeMediaHost, TestContext};
use blood_for_nepal_service::controller::ControllerError;
use blood_for_nepal_service::media::ImageSource;

fn sign_up_draft(email: &str) -> SignUpDraft {
    SignUpDraft {
        email: email.to_owned(),
        password: "namaste123".to_owned(),
        confirm_password: "namaste123".to_owned(),
        first_name: "Sita".to_owned(),
        last_name: "Rai".to_owned(),
        phone_number: "9811111111".to_owned(),
    }
}

fn photo() -> ImageSource {
    ImageSource::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "sita.jpg", "image/jpeg")
}

#[tokio::test]
async fn test_sign_up_is_visible_to_new_session() {
    let ctx = TestContext::default();
    let profile = ctx
        .state
        .session()
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();

    // A second controller over the same state picks up the principal.
    let other = ctx.state.session();
    let restored = other.restore().await.unwrap();
    assert_eq!(restored, Some(profile));
    assert!(other.snapshot().data.is_signed_in());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();
    session.sign_out().await.unwrap();

    assert!(
        session
            .sign_up(sign_up_draft("Sita@Example.com"))
            .await
            .is_err()
    );
    assert_eq!(
        session.snapshot().error.as_deref(),
        Some("An account with this email already exists")
    );
}

#[tokio::test]
async fn test_password_reset_round_trip() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();
    session.sign_out().await.unwrap();

    session
        .send_password_reset("sita@example.com")
        .await
        .unwrap();
    assert_eq!(
        session.snapshot().message.as_deref(),
        Some("Password reset email sent successfully")
    );

    let token = ctx.outbox.last_token_for("sita@example.com").unwrap();
    session.reset_password(&token, "dhanyabad456").await.unwrap();

    assert!(session.sign_in("sita@example.com", "namaste123").await.is_err());
    assert!(
        session
            .sign_in("sita@example.com", "dhanyabad456")
            .await
            .is_ok()
    );

    // Tokens work once.
    assert!(session.reset_password(&token, "third-password").await.is_err());
}

#[tokio::test]
async fn test_reset_for_unknown_email_sends_nothing() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    session
        .send_password_reset("ghost@example.com")
        .await
        .unwrap();
    assert!(ctx.outbox.last_token_for("ghost@example.com").is_none());
}

#[tokio::test]
async fn test_photo_falls_back_to_signed_upload() {
    let ctx = TestContext::new(false);
    let session = ctx.state.session();
    let profile = session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();

    let saved = session
        .upload_profile_photo(&photo(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(saved.profile_picture.contains("/signed/"));
    assert!(saved.profile_picture.ends_with(&format!("{}.jpg", profile.id)));
    assert_eq!(ctx.media.signed_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_photo_leaves_profile() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    let profile = session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = session
        .upload_profile_photo(&photo(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Service(_)));

    let state = session.snapshot();
    assert_eq!(state.error.as_deref(), Some("Upload cancelled"));
    assert_eq!(state.data.profile, Some(profile));
    assert_eq!(ctx.media.signed_calls(), 0);
}

#[tokio::test]
async fn test_stale_profile_edit_conflicts() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    let original = session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();

    let mut first = original.clone();
    first.city = "Pokhara".to_owned();
    session.update_profile(first).await.unwrap();

    let mut second = original;
    second.city = "Dharan".to_owned();
    assert!(session.update_profile(second).await.is_err());

    let state = session.snapshot();
    assert!(state.error.unwrap().contains("changed by someone else"));
    assert_eq!(state.data.profile.unwrap().city, "Pokhara");
}

#[tokio::test]
async fn test_abandoned_photo_upload_frees_session() {
    let ctx =
        TestContext::with_media(FakeMediaHost::new(true).with_delay(Duration::from_secs(5)));
    let session = ctx.state.session();
    let profile = session
        .sign_up(sign_up_draft("sita@example.com"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        session.upload_profile_photo(&photo(), &cancel),
    )
    .await;
    assert!(abandoned.is_err());

    let state = session.snapshot();
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("Operation cancelled"));
    assert_eq!(state.data.profile.as_ref(), Some(&profile));

    // The controller accepts the next call.
    let mut edit = profile;
    edit.city = "Pokhara".to_owned();
    let saved = session.update_profile(edit).await.unwrap();
    assert_eq!(saved.city, "Pokhara");
}
