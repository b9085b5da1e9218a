use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;

use crate::{
    audit::log_audit,
    entity::catalog_items::{
        ActiveModel, Column, Entity as CatalogItems, Model as CatalogItemModel,
    },
    error::{CoreError, CoreResult},
    models::CatalogItem,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
}

pub async fn create_item(
    state: &AppState,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
) -> CoreResult<CatalogItem> {
    validate_price(price)?;
    validate_stock(stock)?;

    let item = ActiveModel {
        id: NotSet,
        name: Set(name),
        description: Set(description),
        price: Set(price),
        stock: Set(stock),
        deleted_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "item_create",
        Some("catalog_items"),
        Some(serde_json::json!({ "item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(item_from_entity(item))
}

pub async fn get_item(state: &AppState, id: i64) -> CoreResult<CatalogItem> {
    let item = CatalogItems::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(&state.orm)
        .await?;
    match item {
        Some(i) => Ok(item_from_entity(i)),
        None => Err(CoreError::NotFound),
    }
}

pub async fn update_item(state: &AppState, id: i64, payload: UpdateItem) -> CoreResult<CatalogItem> {
    if let Some(price) = payload.price {
        validate_price(price)?;
    }
    if let Some(stock) = payload.stock {
        validate_stock(stock)?;
    }

    let existing = CatalogItems::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(i) => i,
        None => return Err(CoreError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }

    let item = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "item_update",
        Some("catalog_items"),
        Some(serde_json::json!({ "item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(item_from_entity(item))
}

/// Soft delete. Items stay on disk so historical order lines keep a valid reference;
/// they just stop being purchasable.
pub async fn delete_item(state: &AppState, id: i64) -> CoreResult<()> {
    let result = CatalogItems::update_many()
        .col_expr(Column::DeletedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(id))
        .filter(Column::DeletedAt.is_null())
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(CoreError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "item_delete",
        Some("catalog_items"),
        Some(serde_json::json!({ "item_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(())
}

pub async fn list_low_stock(state: &AppState, threshold: i32) -> CoreResult<Vec<CatalogItem>> {
    let items = CatalogItems::find()
        .filter(Column::Stock.lte(threshold))
        .filter(Column::DeletedAt.is_null())
        .order_by_asc(Column::Stock)
        .all(&state.orm)
        .await?;

    Ok(items.into_iter().map(item_from_entity).collect())
}

fn validate_price(price: i64) -> CoreResult<()> {
    if price < 0 {
        return Err(CoreError::Validation("price must not be negative".into()));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> CoreResult<()> {
    if stock < 0 {
        return Err(CoreError::Validation("stock must not be negative".into()));
    }
    Ok(())
}

fn item_from_entity(model: CatalogItemModel) -> CatalogItem {
    CatalogItem {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        deleted_at: model.deleted_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
