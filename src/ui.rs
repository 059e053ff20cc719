//! Terminal UI for sift.
//!
//! - [render]: draws the listing, header and status lines, and column hit-testing for the mouse.
//! - [overlays]: the warning banner and help menu stacked over the listing.

pub mod overlays;
pub mod render;

pub use render::{column_at, render};
