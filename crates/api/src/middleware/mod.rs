//! Request-scoped extractors.
//!
//! - [`actor::Actor`]: the acting user from the `x-actor-id` header.

pub mod actor;
