//! Application state and command handling for sift.
//!
//! - [state]: [BrowserState], the listing, cursor, selection and settings.
//! - [nav]: populating listings and moving the cursor and scroll window.
//! - [history]: back/forward navigation history.
//! - [keymap]: the binding table and key names.
//! - [session]: [Session], which owns the state and runs bindings and scripts.
//! - [commands]: the command interpreter behind [Session::execute].

pub mod commands;
pub mod history;
pub mod keymap;
pub mod nav;
pub mod session;
pub mod state;

pub use keymap::Keymap;
pub use nav::Target;
pub use session::Session;
pub use state::BrowserState;
