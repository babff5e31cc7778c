//! Status machines for orders, order items, deliveries and payments.
//!
//! Every status is a closed enum whose legal successors come from an
//! exhaustive `match`, so adding a status without deciding its transitions
//! does not compile.

mod delivery;
mod item;
mod order;
mod payment;

use std::collections::VecDeque;
use std::fmt;

pub use delivery::DeliveryStatus;
pub use item::OrderItemStatus;
pub use order::OrderStatus;
pub use payment::PaymentStatus;

use crate::DomainError;

/// A status with an explicit transition table.
pub trait StatusMachine: Copy + Eq + fmt::Display + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Statuses reachable in a single step.
    fn allowed_next(&self) -> &'static [Self];

    /// Returns true if `next` is reachable in a single step.
    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns true if there are no outgoing transitions.
    fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Validates a single-step transition, returning the new status.
    fn transition_to(&self, next: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidStatusTransition {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
                allowed: self.allowed_next().iter().map(ToString::to_string).collect(),
            })
        }
    }

    /// Shortest forward path from `self` to `target`, excluding `self`.
    ///
    /// Returns an empty path when already at `target` and None when the
    /// target is unreachable.
    fn path_to(&self, target: Self) -> Option<Vec<Self>> {
        if *self == target {
            return Some(Vec::new());
        }

        let mut visited: Vec<Self> = vec![*self];
        let mut queue: VecDeque<Vec<Self>> = VecDeque::from([vec![*self]]);

        while let Some(path) = queue.pop_front() {
            let last = *path.last()?;
            for &next in last.allowed_next() {
                if visited.contains(&next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(next);
                if next == target {
                    extended.remove(0);
                    return Some(extended);
                }
                visited.push(next);
                queue.push_back(extended);
            }
        }

        None
    }
}

/// Generates `as_str`, `Display` and `FromStr` for a snake_case status enum.
macro_rules! status_strings {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the status name as a string.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::DomainError::Validation(format!(
                        "unknown {} status: {}",
                        <$name as $crate::status::StatusMachine>::ENTITY,
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use status_strings;
