//! Order intake domain module.
//!
//! Holds the submitted order form, its normalization and validation rules, the
//! placed-order record with its presentation helpers, and the structured
//! rejection returned when a submission cannot be placed. Pure logic only: the
//! atomic commit lives behind the infra crate's `OrderStore`.

pub mod form;
pub mod order;
pub mod outcome;
pub mod validation;

pub use form::OrderForm;
pub use order::{ConfirmationNumber, NewOrder, Order, ShippingDetails};
pub use outcome::{Rejection, RejectionReason, SubmissionStage};
pub use validation::{US_STATES, fields, messages};
