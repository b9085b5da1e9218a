use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::{
    audit::log_audit,
    entity::{
        reservations::{ActiveModel as ReservationActive, Model as ReservationModel},
        time_slots::{Column as SlotCol, Entity as TimeSlots, Model as SlotModel},
    },
    error::{CoreError, CoreResult},
    models::{Reservation, SlotStatus, TimeSlot},
    state::AppState,
};

/// Books a time slot for a customer. The conditional status flip is the sole
/// exclusivity mechanism: of any number of concurrent attempts, the database lets
/// exactly one move the slot from available to booked, and the reservation row only
/// exists if that flip committed with it.
pub async fn reserve(
    state: &AppState,
    customer_id: i64,
    slot: &mut TimeSlot,
) -> CoreResult<Reservation> {
    // Advisory fast path; the caller's slot may be stale, but an already-booked one
    // is not worth a transaction.
    if !slot.is_available() {
        return Err(CoreError::SlotUnavailable);
    }

    let txn = state.orm.begin().await?;

    let result = TimeSlots::update_many()
        .col_expr(SlotCol::Status, Expr::value(SlotStatus::Booked.as_str()))
        .filter(SlotCol::Id.eq(slot.id))
        .filter(SlotCol::Status.eq(SlotStatus::Available.as_str()))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        // A concurrent reservation won; rollback on drop undoes nothing observable.
        return Err(CoreError::SlotAlreadyBooked);
    }

    let row = ReservationActive {
        id: NotSet,
        customer_id: Set(customer_id),
        time_slot_id: Set(slot.id),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    // Bring the caller's copy in line with storage; no re-read needed.
    slot.book()?;

    tracing::info!(
        reservation_id = row.id,
        customer_id,
        time_slot_id = slot.id,
        "reservation committed"
    );

    if let Err(err) = log_audit(
        &state.pool,
        Some(customer_id),
        "reserve",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": row.id, "time_slot_id": slot.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(reservation_from_entity(row))
}

pub async fn get_slot(state: &AppState, slot_id: i64) -> CoreResult<TimeSlot> {
    let slot = TimeSlots::find_by_id(slot_id).one(&state.orm).await?;
    match slot {
        Some(s) => slot_from_entity(s),
        None => Err(CoreError::NotFound),
    }
}

/// Upcoming slots still open for booking, soonest first.
pub async fn list_available_slots(
    state: &AppState,
    from: DateTime<Utc>,
) -> CoreResult<Vec<TimeSlot>> {
    let slots = TimeSlots::find()
        .filter(SlotCol::Status.eq(SlotStatus::Available.as_str()))
        .filter(SlotCol::StartsAt.gte(from))
        .order_by_asc(SlotCol::StartsAt)
        .all(&state.orm)
        .await?;

    slots.into_iter().map(slot_from_entity).collect()
}

fn slot_from_entity(model: SlotModel) -> CoreResult<TimeSlot> {
    Ok(TimeSlot {
        id: model.id,
        starts_at: model.starts_at.with_timezone(&Utc),
        status: SlotStatus::parse(&model.status)?,
    })
}

fn reservation_from_entity(model: ReservationModel) -> Reservation {
    Reservation {
        id: model.id,
        customer_id: model.customer_id,
        time_slot_id: model.time_slot_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
