use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Catalog item {0} no longer exists")]
    ItemVanished(i64),

    #[error("Insufficient stock for catalog item {item_id}")]
    InsufficientStock { item_id: i64 },

    #[error("Time slot is not available")]
    SlotUnavailable,

    #[error("Time slot was booked by a concurrent reservation")]
    SlotAlreadyBooked,

    #[error("Invalid slot transition: slot is already booked")]
    InvalidTransition,

    #[error("Order identity has already been assigned")]
    IdentityAlreadySet,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    #[error("Database error")]
    Db(#[from] sqlx::Error),

    #[error("ORM error")]
    Orm(#[from] sea_orm::DbErr),

    #[error("Internal error")]
    Unexpected(#[from] anyhow::Error),
}

impl CoreError {
    /// Race-lost failures roll back cleanly and are safe to retry with fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientStock { .. } | CoreError::SlotAlreadyBooked
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
