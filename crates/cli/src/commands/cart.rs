//! Cart commands.

use tracing::info;

use giftshop_core::{ProductId, ProductSnapshot, Quantity};
use giftshop_storefront::Storefront;

/// Print the cart summary, or every line with `full`.
pub async fn show(storefront: &Storefront, full: bool) {
    let cart = storefront.cart();
    let summary = if full {
        let collection = cart.fetch_full().await;
        for line in collection.items() {
            info!(
                product_id = %line.product_id,
                name = %line.name.en,
                quantity = %line.quantity,
                price = %line.price,
                "Cart line"
            );
        }
        collection.summary()
    } else {
        cart.fetch_light().await
    };
    info!(count = summary.count, total = %summary.total_amount, "Cart");
}

/// Add a product.
///
/// # Errors
///
/// Returns an error if the quantity is zero or the request fails.
pub async fn add(
    storefront: &Storefront,
    product: &ProductSnapshot,
    quantity: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let quantity = quantity.map(Quantity::new).transpose()?;
    storefront.cart().add(product, quantity).await?;
    info!(product_id = %product.product_id, "Added to cart");
    Ok(())
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns an error if the quantity is zero or the request fails.
pub async fn update(
    storefront: &Storefront,
    product_id: &str,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let cart = storefront.cart();
    cart.fetch_full().await;
    cart.update(&ProductId::new(product_id), quantity).await?;
    info!(product_id, quantity, "Quantity updated");
    Ok(())
}

/// Take one off a line.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn decrement(
    storefront: &Storefront,
    product_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let cart = storefront.cart();
    cart.fetch_full().await;
    cart.decrement(&ProductId::new(product_id)).await?;
    info!(product_id, "Quantity decremented");
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn remove(
    storefront: &Storefront,
    product_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    storefront.cart().remove(&ProductId::new(product_id)).await?;
    info!(product_id, "Removed from cart");
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn clear(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    storefront.cart().clear().await?;
    info!("Cart cleared");
    Ok(())
}
