//! CoreBank Pricing Engine
//!
//! Issues, stores, and redeems FX/fee quotes against a configured rate
//! table. Quotes are single-use: redemption checks exact equality with the
//! stored quote and can happen at most once.

pub mod engine;
pub mod quote;

pub use engine::{PricingConfig, PricingEngine, RateEntry};
pub use quote::{Fee, Quote};
