use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid status transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: EntityId,
        from: String,
        to: String,
    },

    #[error("A validation run is already in progress for calculation {calculation_id}")]
    ConcurrentRunConflict { calculation_id: EntityId },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable, machine-checkable error code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::ConcurrentRunConflict { .. } => "CONCURRENT_RUN_CONFLICT",
            CoreError::Cancelled(_) => "CANCELLED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may wait and resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ConcurrentRunConflict { .. } | CoreError::Cancelled(_)
        )
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::not_found("ValidationRule", "gl-001").code(), "NOT_FOUND");
        assert_eq!(
            CoreError::InvalidArgument("x".into()).code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(
            CoreError::ConcurrentRunConflict {
                calculation_id: "calc-001".into()
            }
            .code(),
            "CONCURRENT_RUN_CONFLICT"
        );
    }

    #[test]
    fn only_conflicts_and_cancellations_are_retryable() {
        assert!(CoreError::ConcurrentRunConflict {
            calculation_id: "calc-001".into()
        }
        .is_retryable());
        assert!(CoreError::Cancelled("shutdown".into()).is_retryable());
        assert!(!CoreError::not_found("RebateCalculation", "calc-404").is_retryable());
        assert!(!CoreError::Internal("db down".into()).is_retryable());
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = CoreError::not_found("RebateCalculation", "calc-404");
        assert_eq!(
            err.to_string(),
            "Entity not found: RebateCalculation with id calc-404"
        );
    }

    #[test]
    fn transition_message_names_both_states() {
        let err = CoreError::InvalidTransition {
            entity: "RebateCalculation",
            id: "calc-001".into(),
            from: "pending".into(),
            to: "paid".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition for RebateCalculation calc-001: pending -> paid"
        );
    }
}
