//! Configuration for sift.
//!
//! - [load]: finding, parsing and generating sift.toml ([Config]).
//! - [general]: listing defaults and the script shell ([InternalGeneral]).
//! - [input]: user and built-in key bindings.

pub mod general;
pub mod input;
pub mod load;

pub(crate) use general::General;
pub use general::InternalGeneral;
pub use load::Config;
