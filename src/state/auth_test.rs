use super::*;
use crate::state::test_helpers::{Reply, ScriptedAuth};

const TTL: Duration = Duration::from_secs(5);

fn context(auth: &Arc<ScriptedAuth>, ttl: Duration) -> AuthContext {
    AuthContext::new(Arc::clone(auth) as Arc<dyn AuthApi>, ttl)
}

// =========================================================================
// init
// =========================================================================

#[test]
fn starts_loading_and_signed_out() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Anonymous));
    let ctx = context(&auth, TTL);
    assert_eq!(ctx.snapshot(), AuthState { loading: true, is_authenticated: false, username: None });
}

#[tokio::test]
async fn init_publishes_authenticated_user() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Authenticated("ada")));
    let ctx = context(&auth, TTL);

    let state = ctx.init().await;
    assert_eq!(state, AuthState { loading: false, is_authenticated: true, username: Some("ada".to_owned()) });
    assert_eq!(auth.calls(), 1);
}

#[tokio::test]
async fn init_negative_result_clears_loading() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Anonymous));
    let ctx = context(&auth, TTL);

    let state = ctx.init().await;
    assert!(!state.loading);
    assert!(!state.is_authenticated);
}

#[tokio::test]
async fn init_failure_resets_and_clears_loading() {
    let auth = Arc::new(ScriptedAuth::new(vec![Reply::Authenticated("ada"), Reply::Fail]));
    let ctx = context(&auth, TTL);
    ctx.init().await;

    let state = ctx.init().await;
    assert_eq!(state, AuthState { loading: false, is_authenticated: false, username: None });
}

#[tokio::test]
async fn try_init_hands_back_unauthorized() {
    let auth = Arc::new(ScriptedAuth::new(vec![Reply::Authenticated("ada"), Reply::Unauthorized]));
    let ctx = context(&auth, TTL);
    assert!(ctx.try_init().await.unwrap().is_authenticated);

    let err = ctx.try_init().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(ctx.snapshot(), AuthState { loading: false, is_authenticated: false, username: None });
}

#[tokio::test]
async fn init_dropped_midway_still_clears_loading() {
    struct Hang;

    #[async_trait::async_trait]
    impl AuthApi for Hang {
        async fn me(&self) -> Result<AuthStatus, ApiError> {
            std::future::pending().await
        }
    }

    let ctx = AuthContext::new(Arc::new(Hang), TTL);
    let timed_out = tokio::time::timeout(Duration::from_millis(20), ctx.init()).await;
    assert!(timed_out.is_err());
    assert!(!ctx.snapshot().loading);
}

// =========================================================================
// logout_local
// =========================================================================

#[tokio::test]
async fn logout_local_resets_without_network() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Authenticated("ada")));
    let ctx = context(&auth, TTL);
    ctx.init().await;

    ctx.logout_local();
    let state = ctx.snapshot();
    assert!(!state.is_authenticated);
    assert_eq!(state.username, None);
    assert!(!state.loading);
    assert_eq!(auth.calls(), 1);
}

// =========================================================================
// status cache
// =========================================================================

#[tokio::test]
async fn status_is_reused_within_ttl() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Authenticated("ada")));
    let ctx = context(&auth, TTL);
    let t0 = Instant::now();

    ctx.status_at(t0).await.unwrap();
    let cached = ctx.status_at(t0 + Duration::from_secs(4)).await.unwrap();
    assert_eq!(cached, AuthStatus::authenticated("ada"));
    assert_eq!(auth.calls(), 1);

    ctx.status_at(t0 + TTL).await.unwrap();
    assert_eq!(auth.calls(), 2);
}

#[tokio::test]
async fn zero_ttl_always_refetches() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Anonymous));
    let ctx = context(&auth, Duration::ZERO);

    for _ in 0..3 {
        ctx.status().await.unwrap();
    }
    assert_eq!(auth.calls(), 3);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let auth = Arc::new(ScriptedAuth::new(vec![Reply::Fail, Reply::Authenticated("ada")]));
    let ctx = context(&auth, TTL);

    assert!(ctx.status().await.is_err());
    assert_eq!(ctx.status().await.unwrap(), AuthStatus::authenticated("ada"));
    assert_eq!(auth.calls(), 2);
}

#[tokio::test]
async fn invalidate_forces_refetch() {
    let auth = Arc::new(ScriptedAuth::new(vec![Reply::Anonymous, Reply::Authenticated("ada")]));
    let ctx = context(&auth, TTL);

    assert!(!ctx.status().await.unwrap().is_authenticated);
    ctx.invalidate();
    assert!(ctx.status().await.unwrap().is_authenticated);
    assert_eq!(ctx.snapshot().username.as_deref(), Some("ada"));
}

#[tokio::test]
async fn status_after_init_uses_init_result() {
    let auth = Arc::new(ScriptedAuth::always(Reply::Authenticated("ada")));
    let ctx = context(&auth, TTL);

    ctx.init().await;
    ctx.status().await.unwrap();
    assert_eq!(auth.calls(), 1);
}
