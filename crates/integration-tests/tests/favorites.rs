//! Favorites store against the in-memory backend.

#![allow(clippy::unwrap_used)]

use giftshop_core::{LoadMode, ProductId};
use giftshop_integration_tests::{TestContext, date_added, product};
use reqwest::{Method, StatusCode};

#[tokio::test]
async fn test_toggle_adds_then_removes() {
    let ctx = TestContext::signed_in().await;
    let favorites = ctx.storefront.favorites();
    let oud = product("sku-2");

    assert!(favorites.toggle(&oud).await.unwrap());
    assert!(favorites.contains(&oud.product_id));
    assert_eq!(
        favorites.snapshot().get(&oud.product_id).unwrap().date_added,
        date_added()
    );

    assert!(!favorites.toggle(&oud).await.unwrap());
    assert!(!favorites.contains(&oud.product_id));
    assert_eq!(ctx.backend.count(&Method::POST, "/api/favorites"), 1);
    assert_eq!(ctx.backend.count(&Method::DELETE, "/api/favorites/sku-2"), 1);
}

#[tokio::test]
async fn test_fetch_ids_and_full() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_favorites(&["sku-1", "sku-3"]);
    let favorites = ctx.storefront.favorites();

    let ids = favorites.client().fetch_ids().await;
    assert_eq!(ids, vec![ProductId::new("sku-1"), ProductId::new("sku-3")]);

    let full = favorites.fetch_full().await;
    assert_eq!(full.mode(), LoadMode::Full);
    assert_eq!(full.summary().count, 2);
    assert_eq!(full.items()[1].name.en, "Greeting card");
    assert_eq!(full.items()[1].name.for_language("ar"), "بطاقة تهنئة");
}

#[tokio::test]
async fn test_ids_degrade_to_empty_without_session() {
    let ctx = TestContext::new();
    assert!(ctx.storefront.favorites().client().fetch_ids().await.is_empty());
    assert_eq!(ctx.storefront.favorites().fetch_light().await.count, 0);
    assert!(ctx.backend.requests().is_empty());
}

#[tokio::test]
async fn test_failed_clear_restores_favorites() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_favorites(&["sku-1", "sku-2"]);
    let favorites = ctx.storefront.favorites();
    let before = favorites.fetch_full().await;

    ctx.backend
        .fail_next(Method::DELETE, "/api/favorites", StatusCode::BAD_GATEWAY);
    let err = favorites.clear().await.unwrap_err();

    assert_eq!(err.user_message(), "Something went wrong, please try again");
    assert_eq!(favorites.snapshot(), before);

    favorites.clear().await.unwrap();
    assert!(favorites.snapshot().items().is_empty());
    assert_eq!(favorites.summary().count, 0);
}

#[tokio::test]
async fn test_remove_in_light_mode_adjusts_count() {
    let ctx = TestContext::signed_in().await;
    ctx.backend.seed_favorites(&["sku-1", "sku-2"]);
    let favorites = ctx.storefront.favorites();
    assert_eq!(favorites.fetch_light().await.count, 2);

    favorites.remove(&ProductId::new("sku-1")).await.unwrap();

    assert_eq!(favorites.summary().count, 1);
    assert!(favorites.snapshot().items().is_empty());
}
