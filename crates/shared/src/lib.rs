//! Shared wire types for the SurveilX gate session protocol.

pub mod error;
pub mod protocol;

pub use error::*;
pub use protocol::*;
