//! Lifecycle error taxonomy.

use common::{OrderId, UserId};
use domain::{DomainError, OrderStatus};
use store::{ORDER_NUMBER_CONSTRAINT, StoreError};
use thiserror::Error;

/// Stable classification of lifecycle errors, exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    InvalidStatusTransition,
    InsufficientStock,
    Conflict,
    Database,
    NotAssignedDeliveryPerson,
    AlreadyAssigned,
    InvalidOrderState,
}

impl ErrorKind {
    /// Returns the snake_case code of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidStatusTransition => "invalid_status_transition",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Database => "database",
            ErrorKind::NotAssignedDeliveryPerson => "not_assigned_delivery_person",
            ErrorKind::AlreadyAssigned => "already_assigned",
            ErrorKind::InvalidOrderState => "invalid_order_state",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor may not perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User {actor_id} is not the assigned delivery person for order {order_id}")]
    NotAssignedDeliveryPerson { order_id: OrderId, actor_id: UserId },

    #[error("Order {order_id} already has an active delivery assignment")]
    AlreadyAssigned { order_id: OrderId },

    /// The order is not in a status that allows the operation.
    #[error("Order {order_id} is {status}; expected one of: {expected}")]
    InvalidOrderState {
        order_id: OrderId,
        status: OrderStatus,
        expected: String,
    },

    /// A concurrent writer won, or the retry budget ran out.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The generated order number is already taken.
    #[error("Order number already exists")]
    OrderNumberCollision,

    /// The attachment store rejected or failed the upload.
    #[error("Attachment store error: {0}")]
    Attachment(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LifecycleError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LifecycleError::Forbidden(message.into())
    }

    /// Classifies this error for clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Domain(DomainError::InvalidStatusTransition { .. }) => {
                ErrorKind::InvalidStatusTransition
            }
            LifecycleError::Domain(DomainError::InsufficientStock { .. }) => {
                ErrorKind::InsufficientStock
            }
            LifecycleError::Domain(_) => ErrorKind::Validation,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::Forbidden(_) => ErrorKind::Forbidden,
            LifecycleError::NotAssignedDeliveryPerson { .. } => {
                ErrorKind::NotAssignedDeliveryPerson
            }
            LifecycleError::AlreadyAssigned { .. } => ErrorKind::AlreadyAssigned,
            LifecycleError::InvalidOrderState { .. } => ErrorKind::InvalidOrderState,
            LifecycleError::Conflict(_) | LifecycleError::OrderNumberCollision => {
                ErrorKind::Conflict
            }
            LifecycleError::Attachment(_) | LifecycleError::Store(_) => ErrorKind::Database,
        }
    }

    /// Returns true when the whole transaction may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Conflict(_) | LifecycleError::OrderNumberCollision
        )
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            return LifecycleError::Conflict(err.to_string());
        }
        if err.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT) {
            return LifecycleError::OrderNumberCollision;
        }
        match err {
            StoreError::NotFound { entity, id } => LifecycleError::NotFound { entity, id },
            other => LifecycleError::Store(other),
        }
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;
