//! Entity lifecycles.
//!
//! Tools that move an entity between statuses go through [`Lifecycle::check`];
//! any `(from, to)` pair not listed in the table is rejected.

use crate::core::error::{ToolError, ToolResult};
use crate::core::validate::require_enum;

/// Allowed status transitions for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    pub entity: &'static str,
    pub transitions: &'static [(&'static str, &'static [&'static str])],
}

impl Lifecycle {
    /// Every status in declaration order.
    pub fn states(&self) -> Vec<&'static str> {
        self.transitions.iter().map(|(from, _)| *from).collect()
    }

    pub fn targets(&self, from: &str) -> &'static [&'static str] {
        self.transitions
            .iter()
            .find(|(state, _)| *state == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.targets(state).is_empty()
    }

    /// Validate `from -> to`.
    ///
    /// Unknown targets are `InvalidEnum`; `from == to` is `AlreadyApplied`;
    /// unlisted pairs are `PreconditionFailed` naming both ends.
    pub fn check(&self, from: &str, to: &str) -> ToolResult<()> {
        require_enum(to, &self.states(), "status")?;
        if from == to {
            return Err(ToolError::already_applied(format!(
                "{} is already {to}",
                self.entity
            )));
        }
        if self.targets(from).contains(&to) {
            return Ok(());
        }
        Err(ToolError::precondition(format!(
            "Illegal {} status transition: {from} -> {to}",
            self.entity.to_lowercase()
        )))
    }
}

pub const ACCOUNT: Lifecycle = Lifecycle {
    entity: "Account",
    transitions: &[
        ("open", &["frozen", "closed"]),
        ("frozen", &["open", "closed"]),
        ("closed", &[]),
    ],
};

pub const LOAN: Lifecycle = Lifecycle {
    entity: "Loan",
    transitions: &[
        ("active", &["paid_off", "defaulted", "suspended"]),
        ("suspended", &["active", "defaulted"]),
        ("defaulted", &["active"]),
        ("paid_off", &[]),
    ],
};

pub const VIRTUAL_CARD: Lifecycle = Lifecycle {
    entity: "Virtual card",
    transitions: &[
        ("active", &["frozen", "cancelled"]),
        ("frozen", &["active", "cancelled"]),
        ("cancelled", &[]),
    ],
};

pub const SALES_ORDER: Lifecycle = Lifecycle {
    entity: "Sales order",
    transitions: &[
        ("Pending", &["Shipped", "Cancelled"]),
        ("Shipped", &["Delivered"]),
        ("Delivered", &[]),
        ("Cancelled", &[]),
    ],
};

pub const SHIPMENT: Lifecycle = Lifecycle {
    entity: "Shipment",
    transitions: &[
        ("Preparing", &["In Transit"]),
        ("In Transit", &["Delivered"]),
        ("Delivered", &[]),
    ],
};

pub const PURCHASE_ORDER: Lifecycle = Lifecycle {
    entity: "Purchase order",
    transitions: &[
        ("Pending", &["Received", "Cancelled"]),
        ("Received", &[]),
        ("Cancelled", &[]),
    ],
};

pub const INCIDENT: Lifecycle = Lifecycle {
    entity: "Incident",
    transitions: &[
        ("open", &["in_progress"]),
        ("in_progress", &["resolved"]),
        ("resolved", &["closed", "in_progress"]),
        ("closed", &[]),
    ],
};

pub const COMMITMENT: Lifecycle = Lifecycle {
    entity: "Commitment",
    transitions: &[
        ("pending", &["approved", "fulfilled", "rejected"]),
        ("approved", &["fulfilled"]),
        ("fulfilled", &[]),
        ("rejected", &[]),
    ],
};

pub const SUBSCRIPTION: Lifecycle = Lifecycle {
    entity: "Subscription",
    transitions: COMMITMENT.transitions,
};

pub const TRADE: Lifecycle = Lifecycle {
    entity: "Trade",
    transitions: &[
        ("pending", &["executed", "failed"]),
        ("executed", &[]),
        ("failed", &[]),
    ],
};

pub const RESERVATION: Lifecycle = Lifecycle {
    entity: "Reservation",
    transitions: &[("confirmed", &["cancelled"]), ("cancelled", &[])],
};

pub const FLIGHT: Lifecycle = Lifecycle {
    entity: "Flight",
    transitions: &[
        ("available", &["delayed", "cancelled", "landed"]),
        ("delayed", &["available", "cancelled", "landed"]),
        ("cancelled", &[]),
        ("landed", &[]),
    ],
};

pub const PAYROLL: Lifecycle = Lifecycle {
    entity: "Payroll record",
    transitions: &[
        ("draft", &["approved"]),
        ("approved", &["paid"]),
        ("paid", &[]),
    ],
};

pub const EMPLOYEE: Lifecycle = Lifecycle {
    entity: "Employee",
    transitions: &[
        ("active", &["on_leave", "terminated"]),
        ("on_leave", &["active", "terminated"]),
        ("terminated", &[]),
    ],
};

/// Every lifecycle table, for exhaustive checks.
pub const ALL: &[Lifecycle] = &[
    ACCOUNT,
    LOAN,
    VIRTUAL_CARD,
    SALES_ORDER,
    SHIPMENT,
    PURCHASE_ORDER,
    INCIDENT,
    COMMITMENT,
    SUBSCRIPTION,
    TRADE,
    RESERVATION,
    FLIGHT,
    PAYROLL,
    EMPLOYEE,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn account_table() {
        assert!(ACCOUNT.check("open", "frozen").is_ok());
        assert!(ACCOUNT.check("frozen", "open").is_ok());
        assert!(ACCOUNT.check("frozen", "closed").is_ok());
        let err = ACCOUNT.check("closed", "open").expect_err("terminal");
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);
        assert_eq!(err.message, "Illegal account status transition: closed -> open");
    }

    #[test]
    fn unknown_target_is_invalid_enum() {
        let err = LOAN.check("active", "archived").expect_err("unknown");
        assert_eq!(err.kind, ErrorKind::InvalidEnum);
    }

    #[test]
    fn same_state_is_already_applied() {
        let err = COMMITMENT.check("fulfilled", "fulfilled").expect_err("noop");
        assert_eq!(err.kind, ErrorKind::AlreadyApplied);
        assert_eq!(err.message, "Commitment is already fulfilled");
    }

    #[test]
    fn incident_reopen_only_from_resolved() {
        assert!(INCIDENT.check("resolved", "in_progress").is_ok());
        assert!(INCIDENT.check("closed", "in_progress").is_err());
        assert!(INCIDENT.check("open", "resolved").is_err());
    }

    #[test]
    fn every_target_is_a_declared_state() {
        for lifecycle in ALL {
            let states = lifecycle.states();
            for (from, targets) in lifecycle.transitions {
                for target in *targets {
                    assert!(
                        states.contains(target),
                        "{}: {from} -> {target} targets undeclared state",
                        lifecycle.entity
                    );
                }
            }
        }
    }
}
