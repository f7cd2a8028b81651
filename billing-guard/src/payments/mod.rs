//! Failed-payment tracking and grace-period bookkeeping.
//!
//! The store keeps two scalars per organization: how many consecutive
//! payment attempts failed and when the last attempt happened. Everything
//! else ([`GraceStatus`]) is derived on demand and never stored.

pub mod grace;
pub mod source;

pub use grace::{FailedPaymentRecord, FailedPaymentState, GracePolicy, GraceStatus};
pub use source::{FailedPaymentSource, StaticFailedPaymentSource, resolve_failed_payments};
