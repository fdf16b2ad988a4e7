mod common;

use axum::http::{Method, StatusCode};
use userdesk_auth::{CredentialStore, Role, TOKEN_KEY};
use userdesk_client::ClientError;
use userdesk_core::UserId;

use common::{ADMIN, READER, TestServer, XSRF_KEY};

#[tokio::test]
async fn sign_in_stores_token_and_rotated_anti_forgery_value() {
    let srv = TestServer::spawn().await;
    let (desk, store) = srv.client();

    let session = desk.auth.authenticate(ADMIN.0, ADMIN.1).await.unwrap();

    assert!(session.is_authenticated());
    assert!(session.roles().contains(&Role::POST_USERS));
    assert_eq!(store.load(TOKEN_KEY).unwrap().as_deref(), session.token());
    assert_eq!(store.load(XSRF_KEY).unwrap(), srv.api.current_xsrf());
}

#[tokio::test]
async fn sign_in_never_sends_a_bearer_token() {
    let srv = TestServer::spawn().await;
    let (desk, _) = srv.client();

    desk.auth.authenticate(ADMIN.0, ADMIN.1).await.unwrap();
    desk.auth.authenticate(READER.0, READER.1).await.unwrap();

    let logins = srv.api.requests_to(Method::POST, "/api/auth/authenticate");
    assert_eq!(logins.len(), 2);
    assert!(logins.iter().all(|r| r.bearer.is_none()));
    assert!(!desk.session.snapshot().roles().contains(&Role::POST_USERS));
}

#[tokio::test]
async fn bad_credentials_fail_and_keep_session_signed_out() {
    let srv = TestServer::spawn().await;
    let (desk, store) = srv.client();

    let err = desk.auth.authenticate("admin", "wrong").await.unwrap_err();

    assert!(matches!(err, ClientError::AuthenticationFailure));
    assert!(!desk.session.is_authenticated());
    assert_eq!(store.load(TOKEN_KEY).unwrap(), None);
    // The rejection still rotated the anti-forgery token.
    assert_eq!(store.load(XSRF_KEY).unwrap(), srv.api.current_xsrf());
}

#[tokio::test]
async fn authenticated_calls_carry_bearer_and_latest_anti_forgery_token() {
    let srv = TestServer::spawn().await;
    let desk = srv.signed_in(READER).await;
    let token = desk.session.bearer_token();

    desk.directory.refresh().await.unwrap();

    let seen = srv.api.seen();
    let login = &seen[0];
    let listing = &seen[1];
    assert_eq!(listing.path, "/api/users");
    assert_eq!(listing.bearer, token);
    assert_eq!(listing.xsrf, login.rotated_to);
}

#[tokio::test]
async fn token_rotated_on_a_failed_call_is_used_by_the_next_one() {
    let srv = TestServer::spawn().await;
    let desk = srv.signed_in(ADMIN).await;

    assert_eq!(desk.directory.lookup("9999").await.unwrap(), None);
    desk.directory.delete(UserId::new(1)).await.unwrap();

    let seen = srv.api.seen();
    let failed = seen.iter().position(|r| r.path == "/api/users/9999").unwrap();
    let next = &seen[failed + 1];
    assert_eq!(next.method, Method::DELETE);
    assert_eq!(next.xsrf, seen[failed].rotated_to);
    assert!(srv.api.user(1).is_none());
}

#[tokio::test]
async fn api_error_message_is_propagated() {
    let srv = TestServer::spawn().await;
    let desk = srv.signed_in(READER).await;

    let filters = userdesk_core::FilterCriteria::new(None, None, Some("explode".into()));
    let err = desk.directory.apply_filters(filters).await.unwrap_err();

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn signed_out_listing_is_rejected_by_the_api() {
    let srv = TestServer::spawn().await;
    let (desk, _) = srv.client();

    let err = desk.directory.refresh().await.unwrap_err();

    assert!(matches!(err, ClientError::Server { status, .. } if status == StatusCode::UNAUTHORIZED));
    assert_eq!(srv.api.last().bearer, None);
}

#[tokio::test]
async fn cookie_rotated_by_a_missing_record_is_echoed_on_the_next_lookup() {
    let srv = TestServer::spawn().await;
    let desk = srv.signed_in(READER).await;

    assert_eq!(desk.directory.lookup("9999").await.unwrap(), None);
    assert!(desk.directory.lookup("2").await.unwrap().is_some());

    let seen = srv.api.seen();
    let missing = &seen[seen.len() - 2];
    assert_eq!(missing.path, "/api/users/9999");
    assert!(srv.api.last().xsrf.is_some());
    assert_eq!(srv.api.last().xsrf, missing.rotated_to);
}
