//! Field validation rule set for order forms.
//!
//! Every rule runs; violations are collected rather than short-circuited.
//! Presence and format rules are independent, so a blank zip reports both
//! `can't be blank` and `must be 5 digits or ZIP+4`.

use once_cell::sync::Lazy;
use regex::Regex;

use promisekit_core::FieldErrors;

use crate::form::OrderForm;
use crate::order::ShippingDetails;

/// USPS codes for the 50 states plus DC.
pub const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

/// Field keys used in [`FieldErrors`].
pub mod fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const ADDRESS1: &str = "address1";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const ZIP: &str = "zip";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const COUPON_CODE: &str = "coupon_code";
}

pub mod messages {
    pub const BLANK: &str = "can't be blank";
    pub const STATE_INVALID: &str = "must be a valid US state";
    pub const ZIP_FORMAT: &str = "must be 5 digits or ZIP+4";
    pub const PHONE_LENGTH: &str = "must be exactly 10 digits";
    pub const PHONE_DIGITS: &str = "must contain only digits";
    pub const EMAIL_FORMAT: &str = "must be a valid email";
    pub const COUPON_USED: &str = "has already been used";
}

static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("zip pattern compiles"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("phone pattern compiles"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

pub fn is_us_state(code: &str) -> bool {
    US_STATES.contains(&code)
}

pub fn is_zip(zip: &str) -> bool {
    ZIP_RE.is_match(zip)
}

/// Exactly ten ASCII digits and nothing else.
pub fn is_ten_digits(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn is_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl OrderForm {
    /// Check every rule against the (already normalized) form.
    pub fn violations(&self) -> FieldErrors {
        use fields::*;
        use messages::*;

        let mut errors = FieldErrors::new();

        for (field, value) in [
            (FIRST_NAME, &self.first_name),
            (LAST_NAME, &self.last_name),
            (ADDRESS1, &self.address1),
            (CITY, &self.city),
            (STATE, &self.state),
            (ZIP, &self.zip),
            (PHONE, &self.phone),
            (EMAIL, &self.email),
        ] {
            if is_blank(value) {
                errors.add(field, BLANK);
            }
        }

        // Format rules run on blank values too; presence is not a gate.
        if !is_us_state(&self.state) {
            errors.add(STATE, STATE_INVALID);
        }
        if !is_zip(&self.zip) {
            errors.add(ZIP, ZIP_FORMAT);
        }
        if self.phone.chars().count() != 10 {
            errors.add(PHONE, PHONE_LENGTH);
        }
        if !is_ten_digits(&self.phone) {
            errors.add(PHONE, PHONE_DIGITS);
        }
        if !is_email(&self.email) {
            errors.add(EMAIL, EMAIL_FORMAT);
        }

        errors
    }

    /// Turn a normalized form into validated shipping details.
    pub fn validate(&self) -> Result<ShippingDetails, FieldErrors> {
        self.violations().into_result()?;

        Ok(ShippingDetails {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            address1: self.address1.trim().to_string(),
            address2: optional(&self.address2),
            city: self.city.trim().to_string(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            description: optional(&self.description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fields::*;
    use super::messages::*;

    fn valid_form() -> OrderForm {
        OrderForm {
            first_name: "John".into(),
            last_name: "Doe".into(),
            address1: "123 Main St".into(),
            address2: String::new(),
            city: "San Francisco".into(),
            state: "CA".into(),
            zip: "94102".into(),
            phone: "415-555-1234".into(),
            email: "john@example.com".into(),
            description: String::new(),
        }
        .normalized()
    }

    #[test]
    fn valid_form_produces_details() {
        let details = valid_form().validate().unwrap();
        assert_eq!(details.phone, "4155551234");
        assert_eq!(details.address2, None);
        assert_eq!(details.description, None);
    }

    #[test]
    fn missing_first_name_is_blank() {
        let form = OrderForm {
            first_name: String::new(),
            ..valid_form()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.on(FIRST_NAME), vec![BLANK]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn collects_all_violations_at_once() {
        let form = OrderForm::default().normalized();
        let errors = form.validate().unwrap_err();

        for field in [FIRST_NAME, LAST_NAME, ADDRESS1, CITY] {
            assert_eq!(errors.on(field), vec![BLANK], "field {field}");
        }
        assert_eq!(errors.on(STATE), vec![BLANK, STATE_INVALID]);
        assert_eq!(errors.on(ZIP), vec![BLANK, ZIP_FORMAT]);
        assert_eq!(errors.on(PHONE), vec![BLANK, PHONE_LENGTH, PHONE_DIGITS]);
        assert_eq!(errors.on(EMAIL), vec![BLANK, EMAIL_FORMAT]);
        assert_eq!(errors.len(), 13);
    }

    #[test]
    fn state_must_be_a_usps_code() {
        let bad = OrderForm {
            state: "XX".into(),
            ..valid_form()
        };
        assert_eq!(bad.violations().on(STATE), vec![STATE_INVALID]);

        let dc = OrderForm {
            state: "dc".into(),
            ..valid_form()
        }
        .normalized();
        assert!(dc.violations().is_empty());
    }

    #[test]
    fn zip_formats() {
        for bad in ["1234", "123456", "ABCDE", "94102-12", "94102 1234"] {
            let form = OrderForm {
                zip: bad.into(),
                ..valid_form()
            };
            assert_eq!(form.violations().on(ZIP), vec![ZIP_FORMAT], "zip {bad:?}");
        }
        for good in ["94102", "94102-1234", "02134"] {
            let form = OrderForm {
                zip: good.into(),
                ..valid_form()
            };
            assert!(form.violations().is_empty(), "zip {good:?}");
        }
    }

    #[test]
    fn wrong_digit_count_breaks_both_phone_rules() {
        for raw in ["555-1234", "+1 415 555 1234", "123456789"] {
            let form = OrderForm {
                phone: raw.into(),
                ..valid_form()
            }
            .normalized();
            assert_eq!(
                form.violations().on(PHONE),
                vec![PHONE_LENGTH, PHONE_DIGITS],
                "phone {raw:?}"
            );
        }
    }

    #[test]
    fn phone_with_letters_reports_digits_rule_after_normalization() {
        let form = OrderForm {
            phone: "415555abcd".into(),
            ..valid_form()
        }
        .normalized();
        assert_eq!(form.phone, "415555");
        assert_eq!(form.violations().on(PHONE), vec![PHONE_LENGTH, PHONE_DIGITS]);
    }

    #[test]
    fn letters_only_phone_is_blank_after_normalization() {
        let form = OrderForm {
            phone: "call me".into(),
            ..valid_form()
        }
        .normalized();
        assert_eq!(
            form.violations().on(PHONE),
            vec![BLANK, PHONE_LENGTH, PHONE_DIGITS]
        );
    }

    #[test]
    fn ten_digit_phone_passes_both_rules() {
        assert!(is_ten_digits("4155551234"));
        assert!(!is_ten_digits("415555123x"));
        assert!(!is_ten_digits("41555512345"));
        assert!(valid_form().violations().is_empty());
    }

    #[test]
    fn email_shapes() {
        for bad in ["invalid-email", "john@", "@example.com", "john doe@example.com", "john@-example.com"] {
            assert!(!is_email(bad), "{bad:?}");
        }
        for good in ["john@example.com", "first.last+tag@sub.example.co", "x@localhost"] {
            assert!(is_email(good), "{good:?}");
        }
    }

    #[test]
    fn optional_fields_are_trimmed_and_blank_becomes_none() {
        let form = OrderForm {
            address2: "  Apt 5 ".into(),
            description: "   ".into(),
            ..valid_form()
        };
        let details = form.validate().unwrap();
        assert_eq!(details.address2.as_deref(), Some("Apt 5"));
        assert_eq!(details.description, None);
    }

    #[test]
    fn all_fifty_one_jurisdictions_are_accepted() {
        assert_eq!(US_STATES.len(), 51);
        for code in US_STATES {
            assert!(is_us_state(code));
        }
        assert!(!is_us_state("PR"));
    }
}
