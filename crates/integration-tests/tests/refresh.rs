//! Credential refresh and retry against the in-memory backend.

#![allow(clippy::unwrap_used)]

use giftshop_core::Price;
use giftshop_integration_tests::{TestContext, product};
use giftshop_storefront::ApiError;
use giftshop_storefront::auth::REFRESH_PATH;
use reqwest::Method;

#[tokio::test]
async fn test_expired_access_refreshes_once_and_retries() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_cart(&[("sku-1", 1), ("sku-2", 1), ("sku-3", 1)]);
    ctx.backend.expire_access();

    let summary = ctx.storefront.cart().fetch_light().await;

    assert_eq!(summary.count, 3);
    assert_eq!(summary.total_amount, Price::from_units(450));
    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(ctx.backend.count(&Method::GET, "/api/cart/count"), 2);
    assert!(ctx.storefront.session().is_active());
}

#[tokio::test]
async fn test_second_unauthorized_is_not_refreshed_again() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.reject_all_access();

    let result = ctx.storefront.cart().client().try_fetch_light().await;

    assert!(matches!(result, Err(ApiError::Unauthenticated)));
    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(ctx.backend.count(&Method::GET, "/api/cart/count"), 2);
    assert!(!ctx.storefront.session().is_active());
}

#[tokio::test]
async fn test_concurrent_unauthorized_calls_share_one_refresh() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_cart(&[("sku-1", 2)]);
    ctx.backend.seed_favorites(&["sku-2", "sku-3"]);
    ctx.backend.expire_access();

    let cart = ctx.storefront.cart().client();
    let favorites = ctx.storefront.favorites().client();
    let (a, b, c, d, e) = tokio::join!(
        cart.try_fetch_light(),
        favorites.try_fetch_light(),
        cart.try_fetch_full(),
        favorites.try_fetch_full(),
        cart.try_fetch_light(),
    );

    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(a.unwrap().count, 1);
    assert_eq!(b.unwrap().count, 2);
    assert_eq!(c.unwrap().items().len(), 1);
    assert_eq!(d.unwrap().items().len(), 2);
    assert_eq!(e.unwrap().total_amount, Price::from_units(300));
}

#[tokio::test]
async fn test_many_concurrent_calls_share_one_refresh() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.expire_access();

    let client = ctx.storefront.favorites().client();
    let results =
        futures::future::join_all((0..8).map(|_| client.try_fetch_light())).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(ctx.backend.count(&Method::GET, "/api/favorites/count"), 16);
}

#[tokio::test]
async fn test_refresh_failure_ends_session_and_clears_stores() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_cart(&[("sku-1", 1)]);
    ctx.backend.seed_favorites(&["sku-2"]);
    ctx.storefront.cart().fetch_full().await;
    ctx.storefront.favorites().fetch_full().await;
    assert_eq!(ctx.storefront.cart().summary().count, 1);

    ctx.backend.expire_access();
    ctx.backend.revoke_refresh();
    let summary = ctx.storefront.cart().fetch_light().await;

    assert_eq!(summary.count, 0);
    assert!(ctx.storefront.session().identity().is_none());
    assert!(ctx.storefront.cart().snapshot().is_empty());
    assert!(ctx.storefront.favorites().snapshot().is_empty());
    assert!(!ctx.storefront.api().session().gateway().jar().has_credentials());

    // Nothing authenticated is attempted once the session is gone.
    ctx.backend.clear_log();
    let err = ctx.storefront.cart().add(&product("sku-3"), None).await.unwrap_err();
    assert!(err.requires_login());
    assert!(ctx.backend.requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_refresh_keeps_session() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.expire_access();
    ctx.backend.drop_next(Method::POST, REFRESH_PATH);

    let result = ctx.storefront.cart().client().try_fetch_light().await;

    assert!(matches!(result, Err(ApiError::Network(_))));
    assert!(ctx.storefront.session().is_active());

    // The next call refreshes normally.
    assert!(ctx.storefront.cart().client().try_fetch_light().await.is_ok());
    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 2);
}

#[tokio::test]
async fn test_refresh_sends_refresh_cookie_without_bearer() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.expire_access();

    ctx.storefront.favorites().fetch_light().await;

    let refresh = ctx
        .backend
        .requests()
        .into_iter()
        .find(|r| r.path == REFRESH_PATH)
        .unwrap();
    assert!(refresh.bearer.is_none());
    assert!(refresh.cookie.unwrap().contains("refresh_token=refresh-1"));
}

#[tokio::test]
async fn test_rejected_refresh_is_not_repeated_by_late_callers() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.expire_access();
    ctx.backend.revoke_refresh();

    let client = ctx.storefront.cart().client();
    let results =
        futures::future::join_all((0..4).map(|_| client.try_fetch_light())).await;

    assert!(results.iter().all(|r| matches!(r, Err(ApiError::Unauthenticated))));
    assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(ctx.storefront.api().refresher().exchange_count(), 1);
    assert!(!ctx.storefront.session().is_active());
}
