//! Domain module
//!
//! Money primitives, the interest policy and pure domain errors.

pub mod amount;
pub mod error;
pub mod policy;

pub use amount::{Amount, AmountError, Balance};
pub use error::DomainError;
pub use policy::InterestPolicy;
