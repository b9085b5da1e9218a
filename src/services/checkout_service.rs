use chrono::{DateTime, TimeZone, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::{
    audit::log_audit,
    cart::Cart,
    entity::{
        catalog_items::{Column as ItemCol, Entity as CatalogItems},
        customers::{Entity as Customers, Model as CustomerModel},
        order_lines::{
            ActiveModel as OrderLineActive, Column as OrderLineCol, Entity as OrderLines,
            Model as OrderLineModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{CoreError, CoreResult},
    models::{Customer, Order, OrderLine},
    state::AppState,
};

/// Converts a cart into a persisted order: header insert, line inserts, and the
/// authoritative stock decrement for every line, all in one transaction. Either all
/// of it commits or none of it does. The caller's cart is cleared only after commit.
///
/// Not idempotent: two calls with the same cart produce two orders. Single-submission
/// guards belong to the caller.
pub async fn checkout(
    state: &AppState,
    customer_id: i64,
    cart: &mut Cart,
    shipping_address: Option<String>,
) -> CoreResult<Order> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    // Sessions go stale; re-resolve the customer from storage before trusting it.
    let customer = find_customer(state, customer_id).await?;

    let mut order = Order::create(&customer, cart, shipping_address)?;

    let txn = state.orm.begin().await?;

    let header = OrderActive {
        id: NotSet,
        customer_id: Set(order.customer_id),
        reference: Set(order.reference.clone()),
        total_amount: Set(order.total_amount),
        shipping_address: Set(order.shipping_address.clone()),
        created_at: Set(order.created_at.into()),
    }
    .insert(&txn)
    .await?;
    order.assign_id(header.id)?;

    for line in &order.lines {
        let item = CatalogItems::find_by_id(line.item_id)
            .filter(ItemCol::DeletedAt.is_null())
            .one(&txn)
            .await?;
        if item.is_none() {
            return Err(CoreError::ItemVanished(line.item_id));
        }

        OrderLineActive {
            id: NotSet,
            order_id: Set(header.id),
            item_id: Set(line.item_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    for line in &order.lines {
        // The WHERE clause re-checks stock atomically with the write. Zero affected
        // rows means a concurrent checkout consumed it first; dropping the
        // transaction rolls back the header and lines already written.
        let result = CatalogItems::update_many()
            .col_expr(ItemCol::Stock, Expr::col(ItemCol::Stock).sub(line.quantity))
            .filter(ItemCol::Id.eq(line.item_id))
            .filter(ItemCol::Stock.gte(line.quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(CoreError::InsufficientStock {
                item_id: line.item_id,
            });
        }
    }

    txn.commit().await?;

    cart.clear();

    tracing::info!(
        order_id = header.id,
        customer_id,
        total = order.total_amount,
        "checkout committed"
    );

    if let Err(err) = log_audit(
        &state.pool,
        Some(customer_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": header.id, "reference": order.reference })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(order)
}

pub async fn find_customer(state: &AppState, customer_id: i64) -> CoreResult<Customer> {
    let customer = Customers::find_by_id(customer_id).one(&state.orm).await?;
    match customer {
        Some(c) => Ok(customer_from_entity(c)),
        None => Err(CoreError::CustomerNotFound),
    }
}

pub async fn get_order(state: &AppState, customer_id: i64, order_id: i64) -> CoreResult<Order> {
    let header = Orders::find()
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::CustomerId.eq(customer_id))
        .one(&state.orm)
        .await?;
    let header = match header {
        Some(h) => h,
        None => return Err(CoreError::NotFound),
    };

    let lines = load_lines(&state.orm, header.id).await?;
    Ok(order_from_snapshot(header, lines))
}

pub async fn list_orders_for_customer(state: &AppState, customer_id: i64) -> CoreResult<Vec<Order>> {
    let headers = Orders::find()
        .filter(OrderCol::CustomerId.eq(customer_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut orders = Vec::with_capacity(headers.len());
    for header in headers {
        let lines = load_lines(&state.orm, header.id).await?;
        orders.push(order_from_snapshot(header, lines));
    }
    Ok(orders)
}

/// Orders created within one calendar month, oldest first.
pub async fn list_orders_for_month(
    state: &AppState,
    year: i32,
    month: u32,
) -> CoreResult<Vec<Order>> {
    let start = month_start(year, month)?;
    let end = if month == 12 {
        month_start(year + 1, 1)?
    } else {
        month_start(year, month + 1)?
    };

    let headers = Orders::find()
        .filter(OrderCol::CreatedAt.gte(start))
        .filter(OrderCol::CreatedAt.lt(end))
        .order_by_asc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut orders = Vec::with_capacity(headers.len());
    for header in headers {
        let lines = load_lines(&state.orm, header.id).await?;
        orders.push(order_from_snapshot(header, lines));
    }
    Ok(orders)
}

fn month_start(year: i32, month: u32) -> CoreResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| CoreError::Validation(format!("invalid month: {year}-{month:02}")))
}

async fn load_lines<C: ConnectionTrait>(conn: &C, order_id: i64) -> CoreResult<Vec<OrderLineModel>> {
    let lines = OrderLines::find()
        .filter(OrderLineCol::OrderId.eq(order_id))
        .order_by_asc(OrderLineCol::Id)
        .all(conn)
        .await?;
    Ok(lines)
}

fn order_from_snapshot(header: OrderModel, lines: Vec<OrderLineModel>) -> Order {
    let lines = lines
        .into_iter()
        .map(|l| OrderLine {
            item_id: l.item_id,
            quantity: l.quantity,
            unit_price: l.unit_price,
        })
        .collect();

    Order::from_snapshot(
        header.id,
        header.customer_id,
        header.reference,
        header.total_amount,
        header.shipping_address,
        header.created_at.with_timezone(&Utc),
        lines,
    )
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        email: model.email,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
