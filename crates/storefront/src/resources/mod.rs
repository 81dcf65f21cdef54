//! Typed clients for the cart and favorites resources.
//!
//! [`ResourceClient`] is generic over a [`Resource`] marker ([`Cart`] or
//! [`Favorites`]). Reads come in two modes:
//!
//! - `fetch_light` / `fetch_full` never fail; any error degrades to an empty
//!   summary or collection.
//! - `try_fetch_light` / `try_fetch_full` report the error, so callers that
//!   hold state can keep it instead of overwriting it with zeros.
//!
//! Mutations always propagate a typed error.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use giftshop_core::{
    CartItem, CollectionItem, FavoriteItem, Price, ProductId, Quantity, ResourceCollection,
    Summary,
};

use crate::auth::{ApiClient, AuthenticatedRequest};
use crate::error::{ApiError, ValidationError};
use crate::transport::ApiResponse;

/// A remote collection the client can read and mutate.
pub trait Resource: Send + Sync + 'static {
    /// Name used in logs.
    const NAME: &'static str;
    /// Full fetch (`GET`) and clear (`DELETE`).
    const COLLECTION_PATH: &'static str;
    /// Light fetch.
    const COUNT_PATH: &'static str;
    /// Add target (`POST`); item paths are `{ITEMS_PATH}/{id}`.
    const ITEMS_PATH: &'static str;

    type Item: CollectionItem + DeserializeOwned;

    /// Request body for adding a product.
    fn add_body(product_id: &ProductId, quantity: Quantity) -> serde_json::Value;
}

/// The shopping cart.
#[derive(Debug, Clone, Copy)]
pub enum Cart {}

impl Resource for Cart {
    const NAME: &'static str = "cart";
    const COLLECTION_PATH: &'static str = "/api/cart";
    const COUNT_PATH: &'static str = "/api/cart/count";
    const ITEMS_PATH: &'static str = "/api/cart/items";

    type Item = CartItem;

    fn add_body(product_id: &ProductId, quantity: Quantity) -> serde_json::Value {
        serde_json::json!({ "productId": product_id, "quantity": quantity })
    }
}

/// Saved favorites.
#[derive(Debug, Clone, Copy)]
pub enum Favorites {}

impl Resource for Favorites {
    const NAME: &'static str = "favorites";
    const COLLECTION_PATH: &'static str = "/api/favorites";
    const COUNT_PATH: &'static str = "/api/favorites/count";
    const ITEMS_PATH: &'static str = "/api/favorites";

    type Item = FavoriteItem;

    fn add_body(product_id: &ProductId, _quantity: Quantity) -> serde_json::Value {
        serde_json::json!({ "productId": product_id })
    }
}

const FAVORITE_IDS_PATH: &str = "/api/favorites/ids";

/// The server's view after a mutation.
///
/// Every field is optional; an empty or missing body is an empty receipt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "I: DeserializeOwned"))]
pub struct MutationReceipt<I> {
    /// Authoritative record of the affected item.
    #[serde(default)]
    pub item: Option<I>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default, alias = "total")]
    pub total_amount: Option<Price>,
}

impl<I> Default for MutationReceipt<I> {
    fn default() -> Self {
        Self {
            item: None,
            count: None,
            total_amount: None,
        }
    }
}

impl<I> MutationReceipt<I> {
    /// Collection summary, if the server reported a count.
    #[must_use]
    pub fn summary(&self) -> Option<Summary> {
        self.count.map(|count| Summary {
            count,
            total_amount: self.total_amount.unwrap_or(Price::ZERO),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "I: DeserializeOwned"))]
struct FullBody<I> {
    #[serde(default, alias = "favorites")]
    items: Vec<I>,
    #[serde(flatten)]
    summary: Summary,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdsBody {
    Wrapped { ids: Vec<ProductId> },
    Bare(Vec<ProductId>),
}

/// Typed CRUD against one resource.
pub struct ResourceClient<R> {
    api: Arc<ApiClient>,
    resource: PhantomData<fn() -> R>,
}

/// Cart client.
pub type CartClient = ResourceClient<Cart>;
/// Favorites client.
pub type FavoritesClient = ResourceClient<Favorites>;

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            resource: PhantomData,
        }
    }
}

impl<R: Resource> std::fmt::Debug for ResourceClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("resource", &R::NAME)
            .finish_non_exhaustive()
    }
}

impl<R: Resource> ResourceClient<R> {
    #[must_use]
    pub const fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            resource: PhantomData,
        }
    }

    fn item_path(product_id: &ProductId) -> String {
        format!("{}/{}", R::ITEMS_PATH, urlencoding::encode(product_id.as_str()))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Count and total only.
    ///
    /// # Errors
    ///
    /// Any request or decoding failure.
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn try_fetch_light(&self) -> Result<Summary, ApiError> {
        let response = self.api.execute(&AuthenticatedRequest::get(R::COUNT_PATH)).await?;
        let summary = response.json::<Option<Summary>>()?.unwrap_or_default();
        debug!(count = summary.count, "Light fetch");
        Ok(summary)
    }

    /// Count and total; zero on any failure.
    pub async fn fetch_light(&self) -> Summary {
        self.try_fetch_light()
            .await
            .unwrap_or_else(|e| degrade(R::NAME, &e))
    }

    /// The complete collection. Its summary is derived from the items.
    ///
    /// # Errors
    ///
    /// Any request or decoding failure.
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn try_fetch_full(&self) -> Result<ResourceCollection<R::Item>, ApiError> {
        let response = self
            .api
            .execute(&AuthenticatedRequest::get(R::COLLECTION_PATH))
            .await?;
        let Some(body) = response.json::<Option<FullBody<R::Item>>>()? else {
            return Ok(ResourceCollection::full(Vec::new()));
        };

        let collection = ResourceCollection::full(body.items);
        if body.summary.count != 0 && body.summary != collection.summary() {
            debug!(
                reported = body.summary.count,
                held = collection.summary().count,
                "Server summary disagrees with items"
            );
        }
        debug!(count = collection.summary().count, "Full fetch");
        Ok(collection)
    }

    /// The complete collection; empty on any failure.
    pub async fn fetch_full(&self) -> ResourceCollection<R::Item> {
        self.try_fetch_full()
            .await
            .unwrap_or_else(|e| degrade(R::NAME, &e))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    #[instrument(skip(self), fields(resource = R::NAME, product_id = %product_id))]
    pub async fn add(
        &self,
        product_id: &ProductId,
        quantity: Option<Quantity>,
    ) -> Result<MutationReceipt<R::Item>, ApiError> {
        let body = R::add_body(product_id, quantity.unwrap_or(Quantity::ONE));
        let request = AuthenticatedRequest::post(R::ITEMS_PATH).with_body(body);
        let response = self.api.execute(&request).await?;
        Ok(receipt(&response))
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    #[instrument(skip(self), fields(resource = R::NAME, product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<MutationReceipt<R::Item>, ApiError> {
        let request = AuthenticatedRequest::delete(Self::item_path(product_id));
        let response = self.api.execute(&request).await?;
        Ok(receipt(&response))
    }

    /// Remove everything.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    #[instrument(skip(self), fields(resource = R::NAME))]
    pub async fn clear(&self) -> Result<MutationReceipt<R::Item>, ApiError> {
        let response = self
            .api
            .execute(&AuthenticatedRequest::delete(R::COLLECTION_PATH))
            .await?;
        Ok(receipt(&response))
    }
}

impl ResourceClient<Cart> {
    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// `ApiError::ValidationRejected` for a quantity below one, before any
    /// request is made; otherwise propagates request failures.
    #[instrument(skip(self), fields(resource = Cart::NAME, product_id = %product_id))]
    pub async fn update(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<MutationReceipt<CartItem>, ApiError> {
        let quantity = Quantity::new(quantity).map_err(ValidationError::from)?;
        let request = AuthenticatedRequest::patch(Self::item_path(product_id))
            .with_body(serde_json::json!({ "quantity": quantity }));
        let response = self.api.execute(&request).await?;
        Ok(receipt(&response))
    }
}

impl ResourceClient<Favorites> {
    /// Ids of every favorited product; empty on any failure.
    #[instrument(skip(self))]
    pub async fn fetch_ids(&self) -> Vec<ProductId> {
        let result = async {
            let response = self
                .api
                .execute(&AuthenticatedRequest::get(FAVORITE_IDS_PATH))
                .await?;
            Ok::<_, ApiError>(match response.json::<Option<IdsBody>>()? {
                Some(IdsBody::Wrapped { ids } | IdsBody::Bare(ids)) => ids,
                None => Vec::new(),
            })
        }
        .await;

        result.unwrap_or_else(|e| degrade(Favorites::NAME, &e))
    }
}

/// Decode a mutation body leniently: the call already succeeded.
fn receipt<I: DeserializeOwned>(response: &ApiResponse) -> MutationReceipt<I> {
    response
        .json::<Option<MutationReceipt<I>>>()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable mutation response");
            None
        })
        .unwrap_or_default()
}

fn degrade<T: Default>(resource: &'static str, error: &ApiError) -> T {
    if error.requires_login() {
        debug!(resource, "Read skipped without a session");
    } else if error.is_retryable_read() {
        warn!(resource, error = %error, "Read failed; showing empty until the next fetch");
    } else {
        warn!(resource, error = %error, "Read failed; showing empty");
    }
    T::default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use giftshop_core::LoadMode;

    use super::*;

    #[test]
    fn test_item_paths_are_encoded() {
        assert_eq!(
            CartClient::item_path(&ProductId::new("gift box/red")),
            "/api/cart/items/gift%20box%2Fred"
        );
        assert_eq!(
            FavoritesClient::item_path(&ProductId::new("sku-1")),
            "/api/favorites/sku-1"
        );
    }

    #[test]
    fn test_add_bodies() {
        let quantity = Quantity::new(2).unwrap();
        assert_eq!(
            Cart::add_body(&ProductId::new("sku-1"), quantity),
            serde_json::json!({ "productId": "sku-1", "quantity": 2 })
        );
        assert_eq!(
            Favorites::add_body(&ProductId::new("sku-1"), quantity),
            serde_json::json!({ "productId": "sku-1" })
        );
    }

    #[test]
    fn test_receipt_tolerates_missing_fields() {
        let empty: MutationReceipt<CartItem> =
            receipt(&ApiResponse::new(reqwest::StatusCode::NO_CONTENT, ""));
        assert_eq!(empty, MutationReceipt::default());

        let garbage: MutationReceipt<CartItem> =
            receipt(&ApiResponse::new(reqwest::StatusCode::OK, "<html>"));
        assert!(garbage.item.is_none());

        let counted: MutationReceipt<CartItem> = receipt(&ApiResponse::new(
            reqwest::StatusCode::OK,
            r#"{"count":3,"totalAmount":"450"}"#,
        ));
        let summary = counted.summary().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.total_amount, Price::from_units(450));
    }

    #[test]
    fn test_full_body_shape() {
        let body: FullBody<FavoriteItem> = serde_json::from_str(
            r#"{"favorites":[{"productId":"sku-1","nameEn":"Rose","nameAr":"وردة","price":"10"}],"count":1}"#,
        )
        .unwrap();
        let collection = ResourceCollection::full(body.items);
        assert_eq!(collection.mode(), LoadMode::Full);
        assert_eq!(collection.summary().count, 1);
        assert_eq!(body.summary.total_amount, Price::ZERO);
    }

    #[test]
    fn test_ids_body_shapes() {
        let wrapped: IdsBody = serde_json::from_str(r#"{"ids":["a","b"]}"#).unwrap();
        let bare: IdsBody = serde_json::from_str(r#"["a"]"#).unwrap();
        assert!(matches!(wrapped, IdsBody::Wrapped { ids } if ids.len() == 2));
        assert!(matches!(bare, IdsBody::Bare(ids) if ids.len() == 1));
    }
}
