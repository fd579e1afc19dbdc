//! greendns - a rule-driven DNS relay.
//!
//! Answers A queries for listed domains with a sentinel address and
//! forwards everything else to an upstream resolver.

pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;

pub use error::{Error, Result};
