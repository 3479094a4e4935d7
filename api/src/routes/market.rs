//! Marketplace listings paid for with access units

use agro_core::{
    AgroError, FieldBrief, NewProduct, Page, Product, ProductFilter, ProductListing,
    UpdateProduct, Validator,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_field, load_owned_field};
use crate::{
    auth::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

/// Product with a short description of its field
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub field: Option<FieldBrief>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    pub field_id: Option<i64>,
    pub created_by: Option<i64>,
    /// Only the caller's listings, including those not on sale
    pub mine: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductQuery {
    fn page(&self) -> Page {
        let default = Page::default();
        Page {
            limit: self.limit.unwrap_or(default.limit),
            offset: self.offset.unwrap_or(default.offset),
        }
    }
}

async fn view(state: &AppState, product: Product) -> agro_core::Result<ProductView> {
    let field = match product.field_id {
        Some(field_id) => state.store.get_field(field_id).await?.map(|f| f.brief()),
        None => None,
    };
    Ok(ProductView { product, field })
}

pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Vec<ProductView>> {
    let page = query.page();
    let filter = if query.mine {
        ProductFilter {
            field_id: query.field_id,
            created_by: Some(user.id()),
            include_off_sale: true,
        }
    } else {
        ProductFilter {
            field_id: query.field_id,
            created_by: query.created_by,
            include_off_sale: false,
        }
    };

    let products = state
        .store
        .list_products(filter, page)
        .await?;
    let mut views = Vec::with_capacity(products.len());
    for product in products {
        views.push(view(&state, product).await?);
    }
    Ok(ApiResponse::ok(views, "products"))
}

/// Price the listing, then debit and insert atomically
async fn list_for_sale(
    state: &AppState,
    user: &AuthUser,
    product: NewProduct,
) -> agro_core::Result<ProductListing> {
    Validator::validate_new_product(&product)?;
    if let Some(field_id) = product.field_id {
        load_owned_field(state, user, field_id).await?;
    }

    let cost = state.pricing.cost(product.unit, product.quantity)?;
    let listing = state
        .store
        .create_product_with_debit(user.id(), product, cost)
        .await?;

    info!(
        product_id = listing.product.id,
        owner = user.id(),
        cost = %listing.cost,
        remaining = %listing.remaining_access_units,
        "Product listed"
    );
    Ok(listing)
}

pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(product): ApiJson<NewProduct>,
) -> ApiResult<ProductListing> {
    let listing = list_for_sale(&state, &user, product).await?;
    Ok(ApiResponse::created(listing, "product created"))
}

pub async fn create_field_product(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(field_id): ApiPath<i64>,
    ApiJson(mut product): ApiJson<NewProduct>,
) -> ApiResult<ProductListing> {
    load_field(&state, field_id).await?;
    product.field_id = Some(field_id);
    let listing = list_for_sale(&state, &user, product).await?;
    Ok(ApiResponse::created(listing, "product created"))
}

/// Off-sale listings are only visible to their owner
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ProductView> {
    let product = state
        .store
        .get_product(id)
        .await?
        .filter(|p| p.on_sale || p.created_by == user.id() || user.0.is_admin)
        .ok_or_else(|| AgroError::not_found("product", id))?;
    Ok(ApiResponse::ok(view(&state, product).await?, "product"))
}

async fn load_owned_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> agro_core::Result<Product> {
    let product = state
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| AgroError::not_found("product", id))?;
    user.ensure_owner(product.created_by, "product")?;
    Ok(product)
}

pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(updates): ApiJson<UpdateProduct>,
) -> ApiResult<ProductView> {
    load_owned_product(&state, &user, id).await?;
    Validator::validate_update_product(&updates)?;
    let product = state.store.update_product(id, updates).await?;
    Ok(ApiResponse::ok(view(&state, product).await?, "product updated"))
}

pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    load_owned_product(&state, &user, id).await?;
    state.store.soft_delete_product(id).await?;
    Ok(ApiResponse::ok((), "product deleted"))
}
