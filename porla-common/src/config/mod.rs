//! Configuration types shared across the porla crates.
//!
//! - [`timeouts`]: per-stage deadlines for outbound webhook deliveries

pub mod timeouts;

pub use timeouts::DeliveryTimeouts;
