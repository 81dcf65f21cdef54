//! Favorites commands.

use tracing::info;

use giftshop_core::ProductSnapshot;
use giftshop_storefront::Storefront;

/// Print the favorites count, or every favorite with `full`.
pub async fn show(storefront: &Storefront, full: bool) {
    let favorites = storefront.favorites();
    let summary = if full {
        let collection = favorites.fetch_full().await;
        for favorite in collection.items() {
            info!(
                product_id = %favorite.product_id,
                name = %favorite.name.en,
                price = %favorite.price,
                added = %favorite.date_added,
                "Favorite"
            );
        }
        collection.summary()
    } else {
        favorites.fetch_light().await
    };
    info!(count = summary.count, "Favorites");
}

/// Print favorite product ids.
pub async fn ids(storefront: &Storefront) {
    let ids = storefront.favorites().client().fetch_ids().await;
    for id in &ids {
        info!(product_id = %id, "Favorite id");
    }
    info!(count = ids.len(), "Favorite ids");
}

/// Add or remove a favorite.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn toggle(
    storefront: &Storefront,
    product: &ProductSnapshot,
) -> Result<(), Box<dyn std::error::Error>> {
    let favorites = storefront.favorites();
    favorites.fetch_full().await;
    let now_favorite = favorites.toggle(product).await?;
    info!(product_id = %product.product_id, favorite = now_favorite, "Favorite toggled");
    Ok(())
}

/// Remove every favorite.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn clear(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    storefront.favorites().clear().await?;
    info!("Favorites cleared");
    Ok(())
}
