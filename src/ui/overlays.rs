//! Overlay stack for blocking popups drawn over the listing.
//!
//! Warnings and the help menu are both dismissed by the next key press; the topmost one is
//! drawn and dismissed first.

use std::slice;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Overlay {
    Warning { text: String },
    Help,
}

#[derive(Debug, Default)]
pub struct OverlayStack {
    overlays: Vec<Overlay>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
    }

    pub fn pop(&mut self) -> Option<Overlay> {
        self.overlays.pop()
    }

    pub fn top(&self) -> Option<&Overlay> {
        self.overlays.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Overlay> {
        self.overlays.iter()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
