//! Subscription state for the active organization.
//!
//! The hosted store holds one billing row per organization. This module
//! models that row ([`SubscriptionRecord`]), its parsed form
//! ([`SubscriptionState`]), and the collaborator trait that fetches it
//! ([`SubscriptionSource`]).
//!
//! Unresolved fields stay `None`. They are never defaulted to `false`,
//! because the guard treats `None` as "still loading" and `false` as a
//! negative determination.

pub mod source;
pub mod state;

pub use source::{StaticSubscriptionSource, SubscriptionSource, resolve_subscription};
pub use state::{OrganizationId, SubscriptionRecord, SubscriptionSnapshot, SubscriptionState};
