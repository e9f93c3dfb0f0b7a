//! The order status transition table and the role policy attached to it.
//!
//! | From \ To | paid   | shipped       | delivered     | cancelled               |
//! |-----------|--------|---------------|---------------|-------------------------|
//! | pending   | system | admin         | Err           | admin, customer, system |
//! | paid      | Err    | admin, system | Err           | admin, system           |
//! | shipped   | Err    | Err           | admin, system | admin                   |
//! | delivered | Err    | Err           | Err           | Err                     |
//! | cancelled | Err    | Err           | Err           | Err                     |
//!
//! `paid` is only reachable by the system-internal payment pathway; an admin marking an
//! order as paid by hand is rejected outright. Cash-on-delivery orders can be shipped
//! straight from `pending` since they have no online payment step.

use crate::{
    db_types::{ActorRole, OrderStatusType},
    traits::OrderFlowError,
};

/// Checks that `(from, to)` is a legal transition and that `actor` is allowed to make it.
pub fn validate_transition(
    from: OrderStatusType,
    to: OrderStatusType,
    actor: ActorRole,
) -> Result<(), OrderFlowError> {
    use ActorRole::*;
    use OrderStatusType::*;
    let allowed_roles: &[ActorRole] = match (from, to) {
        (Pending, Paid) => &[System],
        (Pending, Shipped) => &[Admin],
        (Pending, Cancelled) => &[Admin, Customer, System],
        (Paid, Shipped) => &[Admin, System],
        (Paid, Cancelled) => &[Admin, System],
        (Shipped, Delivered) => &[Admin, System],
        (Shipped, Cancelled) => &[Admin],
        (_, _) => return Err(OrderFlowError::InvalidTransition { from, to }),
    };
    if !allowed_roles.contains(&actor) {
        return Err(OrderFlowError::Forbidden { role: actor, from, to });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert!(validate_transition(OrderStatusType::Pending, OrderStatusType::Paid, ActorRole::System).is_ok());
        assert!(validate_transition(OrderStatusType::Paid, OrderStatusType::Shipped, ActorRole::Admin).is_ok());
        assert!(validate_transition(OrderStatusType::Shipped, OrderStatusType::Delivered, ActorRole::System).is_ok());
        assert!(
            validate_transition(OrderStatusType::Pending, OrderStatusType::Cancelled, ActorRole::Customer).is_ok()
        );
    }

    #[test]
    fn admin_cannot_mark_paid() {
        let err = validate_transition(OrderStatusType::Pending, OrderStatusType::Paid, ActorRole::Admin).unwrap_err();
        assert!(matches!(err, OrderFlowError::Forbidden { .. }));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for to in [
            OrderStatusType::Pending,
            OrderStatusType::Paid,
            OrderStatusType::Shipped,
            OrderStatusType::Delivered,
            OrderStatusType::Cancelled,
        ] {
            let err =
                validate_transition(OrderStatusType::Delivered, to, ActorRole::Admin).unwrap_err();
            assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));
            let err =
                validate_transition(OrderStatusType::Cancelled, to, ActorRole::System).unwrap_err();
            assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn customer_cannot_cancel_after_payment() {
        let err =
            validate_transition(OrderStatusType::Paid, OrderStatusType::Cancelled, ActorRole::Customer).unwrap_err();
        assert!(matches!(err, OrderFlowError::Forbidden { .. }));
    }

    #[test]
    fn backwards_transitions_are_invalid() {
        let err = validate_transition(OrderStatusType::Shipped, OrderStatusType::Paid, ActorRole::Admin).unwrap_err();
        assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));
    }
}
