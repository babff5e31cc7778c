//! Delivery assignment embedded in an order.

use chrono::{DateTime, Utc};
use common::{AttachmentId, UserId};
use serde::{Deserialize, Serialize};

use crate::DomainError;
use crate::status::{DeliveryStatus, StatusMachine};

/// A note left by the delivery person alongside a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub status: DeliveryStatus,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Kind of proof-of-delivery attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Photo,
    Signature,
    Document,
}

impl ProofKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofKind::Photo => "photo",
            ProofKind::Signature => "signature",
            ProofKind::Document => "document",
        }
    }
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProofKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(ProofKind::Photo),
            "signature" => Ok(ProofKind::Signature),
            "document" => Ok(ProofKind::Document),
            other => Err(DomainError::Validation(format!("unknown proof kind: {other}"))),
        }
    }
}

/// Reference to a stored proof-of-delivery file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfDelivery {
    pub attachment_id: AttachmentId,
    pub kind: ProofKind,
    /// Location returned by the attachment store.
    pub location: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// Binding of a delivery person to an order and the progress of that delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    delivery_person_id: Option<UserId>,
    status: DeliveryStatus,
    assigned_at: Option<DateTime<Utc>>,
    picked_up_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    notes: Vec<DeliveryNote>,
    #[serde(default)]
    proofs: Vec<ProofOfDelivery>,
}

impl DeliveryAssignment {
    pub fn delivery_person_id(&self) -> Option<UserId> {
        self.delivery_person_id
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn picked_up_at(&self) -> Option<DateTime<Utc>> {
        self.picked_up_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn notes(&self) -> &[DeliveryNote] {
        &self.notes
    }

    pub fn proofs(&self) -> &[ProofOfDelivery] {
        &self.proofs
    }

    /// Returns true while a delivery person is actively bound.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if `user` is the bound delivery person.
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.delivery_person_id == Some(user)
    }

    /// Binds a delivery person, starting a fresh assignment.
    ///
    /// A previous assignment that ended as returned or cancelled is replaced;
    /// an active one is not (the caller checks `is_active` first).
    pub fn assign(&mut self, delivery_person_id: UserId, at: DateTime<Utc>) {
        *self = DeliveryAssignment {
            delivery_person_id: Some(delivery_person_id),
            status: DeliveryStatus::Assigned,
            assigned_at: Some(at),
            notes: std::mem::take(&mut self.notes),
            proofs: std::mem::take(&mut self.proofs),
            ..DeliveryAssignment::default()
        };
    }

    /// Applies a single-step status change and stamps its timestamp.
    /// Returns the previous status.
    pub fn advance(
        &mut self,
        next: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<DeliveryStatus, DomainError> {
        let previous = self.status;
        previous.transition_to(next)?;

        match next {
            DeliveryStatus::PickedUp => self.picked_up_at = Some(at),
            DeliveryStatus::Delivered => self.stamp_delivered(at),
            DeliveryStatus::Returned => self.returned_at = Some(at),
            _ => {}
        }
        self.status = next;
        Ok(previous)
    }

    /// Cancels an assignment that has not been picked up yet.
    ///
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.status.can_transition_to(DeliveryStatus::Cancelled) {
            self.status = DeliveryStatus::Cancelled;
            true
        } else {
            false
        }
    }

    /// Records the delivery time unless one is already recorded.
    pub fn stamp_delivered(&mut self, at: DateTime<Utc>) {
        self.delivered_at.get_or_insert(at);
    }

    pub fn add_note(&mut self, note: impl Into<String>, at: DateTime<Utc>) {
        let note = note.into();
        if note.trim().is_empty() {
            return;
        }
        self.notes.push(DeliveryNote {
            status: self.status,
            note,
            at,
        });
    }

    pub fn add_proof(&mut self, proof: ProofOfDelivery) {
        self.proofs.push(proof);
    }
}
