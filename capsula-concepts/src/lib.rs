#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
//! This crate encapsulates concepts which govern the mechanical capsule model specified by
//! [capsula](https://docs.rs/capsula).
//!
//! Concrete implementations live in `capsula-building-blocks` while the numerical engine which
//! drives them is contained in `capsula-core`.

mod cycle;
mod errors;
mod mechanics;

pub use cycle::*;
pub use errors::*;
pub use mechanics::*;
