use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promisekit_core::{CouponId, DomainError, DomainResult, Entity, ValueObject};

/// Normalized coupon code: trimmed and uppercased.
///
/// Lookups and uniqueness are case-insensitive because every code is stored in
/// this form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Lookup key for caller-supplied input.
    pub fn normalize(raw: &str) -> String {
        raw.to_uppercase().trim().to_string()
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let code = Self::normalize(raw);
        if code.is_empty() {
            return Err(DomainError::validation("code can't be blank"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for CouponCode {}

impl core::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coupon lifecycle: `Unused -> Used`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Unused,
    Used,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Unused => "unused",
            CouponStatus::Used => "used",
        }
    }
}

impl FromStr for CouponStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unused" => Ok(CouponStatus::Unused),
            "used" => Ok(CouponStatus::Used),
            other => Err(DomainError::validation(format!(
                "unknown coupon status '{other}'"
            ))),
        }
    }
}

impl core::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use redemption code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    id: CouponId,
    code: CouponCode,
    status: CouponStatus,
    created_at: DateTime<Utc>,
}

impl Coupon {
    /// Issue a fresh, unused coupon.
    pub fn issue(id: CouponId, raw_code: &str, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            code: CouponCode::parse(raw_code)?,
            status: CouponStatus::Unused,
            created_at,
        })
    }

    /// Rebuild a coupon from persisted columns.
    pub fn restore(
        id: CouponId,
        code: &str,
        status: CouponStatus,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            code: CouponCode::parse(code)?,
            status,
            created_at,
        })
    }

    pub fn id_typed(&self) -> CouponId {
        self.id
    }

    pub fn code(&self) -> &CouponCode {
        &self.code
    }

    pub fn status(&self) -> CouponStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_used(&self) -> bool {
        self.status == CouponStatus::Used
    }

    pub fn is_unused(&self) -> bool {
        self.status == CouponStatus::Unused
    }

    /// Consume the coupon.
    ///
    /// Only the order-commit unit may call this, and the caller must persist
    /// the result in the same transaction as the order insert.
    pub fn mark_used(&mut self) -> DomainResult<()> {
        if self.is_used() {
            return Err(DomainError::invalid_state(format!(
                "coupon {} has already been used",
                self.code
            )));
        }
        self.status = CouponStatus::Used;
        Ok(())
    }
}

impl Entity for Coupon {
    type Id = CouponId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-12-29T21:21:59Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(CouponCode::normalize("  welcome2024 "), "WELCOME2024");
        let coupon = Coupon::issue(CouponId::new(), " test123\n", test_time()).unwrap();
        assert_eq!(coupon.code().as_str(), "TEST123");
        assert!(coupon.is_unused());
    }

    #[test]
    fn blank_code_is_rejected() {
        let err = Coupon::issue(CouponId::new(), "   ", test_time()).unwrap_err();
        assert_eq!(err, DomainError::validation("code can't be blank"));
    }

    #[test]
    fn mark_used_transitions_once() {
        let mut coupon = Coupon::issue(CouponId::new(), "FITNESS50", test_time()).unwrap();

        coupon.mark_used().unwrap();
        assert!(coupon.is_used());

        let err = coupon.mark_used().unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(coupon.status(), CouponStatus::Used);
    }

    #[test]
    fn status_round_trips_through_its_column_form() {
        for status in [CouponStatus::Unused, CouponStatus::Used] {
            assert_eq!(status.as_str().parse::<CouponStatus>().unwrap(), status);
        }
        assert!("spent".parse::<CouponStatus>().is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: normalization is idempotent and case-insensitive.
            #[test]
            fn normalize_is_idempotent(raw in "[ \t]{0,3}[A-Za-z0-9]{1,16}[ \t]{0,3}") {
                let once = CouponCode::normalize(&raw);
                prop_assert_eq!(CouponCode::normalize(&once), once.clone());
                prop_assert_eq!(CouponCode::normalize(&raw.to_lowercase()), once);
            }
        }
    }
}
