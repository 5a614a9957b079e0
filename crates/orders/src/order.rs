use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promisekit_core::{CouponId, Entity, KitId, OrderId};

/// Customer-facing order number: positive, unique, assigned as
/// `max(existing) + 1` at commit time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationNumber(u64);

impl ConfirmationNumber {
    pub const FIRST: ConfirmationNumber = ConfirmationNumber(1);

    /// `None` for values that are not positive.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Next number given the current maximum (`None` when no orders exist).
    pub fn next_after(max: Option<ConfirmationNumber>) -> Self {
        match max {
            Some(ConfirmationNumber(n)) => Self(n + 1),
            None => Self::FIRST,
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Zero-padded to six digits: `42` -> `"000042"`.
    pub fn formatted(&self) -> String {
        format!("{:06}", self.0)
    }
}

impl core::fmt::Display for ConfirmationNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Validated contact and shipping data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    /// Two-letter USPS code.
    pub state: String,
    /// Five digits or ZIP+4.
    pub zip: String,
    /// Exactly ten digits.
    pub phone: String,
    pub email: String,
    pub description: Option<String>,
}

impl ShippingDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// `"4155551234"` -> `"(415) 555-1234"`. Anything that is not ten ASCII
    /// digits is returned unchanged.
    pub fn formatted_phone(&self) -> String {
        let p = &self.phone;
        if p.len() != 10 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return p.clone();
        }
        format!("({}) {}-{}", &p[0..3], &p[3..6], &p[6..10])
    }

    /// Postal block: address1, address2 when present, then `"City, ST ZIP"`.
    pub fn full_address(&self) -> String {
        let last_line = format!("{}, {} {}", self.city, self.state, self.zip);
        let mut lines = vec![self.address1.as_str()];
        if let Some(address2) = self.address2.as_deref() {
            lines.push(address2);
        }
        lines.push(last_line.as_str());
        lines.join("\n")
    }
}

/// An order ready to be committed; the store assigns the confirmation number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub kit_id: KitId,
    pub coupon_id: CouponId,
    pub details: ShippingDetails,
    pub created_at: DateTime<Utc>,
}

/// A placed order. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    kit_id: KitId,
    coupon_id: CouponId,
    confirmation: ConfirmationNumber,
    details: ShippingDetails,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a committed order.
    pub fn placed(new: NewOrder, confirmation: ConfirmationNumber) -> Self {
        Self {
            id: new.id,
            kit_id: new.kit_id,
            coupon_id: new.coupon_id,
            confirmation,
            details: new.details,
            created_at: new.created_at,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn kit_id(&self) -> KitId {
        self.kit_id
    }

    pub fn coupon_id(&self) -> CouponId {
        self.coupon_id
    }

    pub fn confirmation(&self) -> ConfirmationNumber {
        self.confirmation
    }

    pub fn details(&self) -> &ShippingDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn formatted_confirmation(&self) -> String {
        self.confirmation.formatted()
    }

    pub fn full_name(&self) -> String {
        self.details.full_name()
    }

    pub fn formatted_phone(&self) -> String {
        self.details.formatted_phone()
    }

    pub fn full_address(&self) -> String {
        self.details.full_address()
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
