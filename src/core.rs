//! Core engine of sift.
//!
//! Everything here works without drawing anything:
//! - [cache]: the entry arena and its fingerprint buckets.
//! - [glob] and [sort]: building and ordering a listing.
//! - [input]: the terminal byte decoder and double-click tracking.
//! - [jobs] and [signals]: running scripts in the foreground and cleaning up on signals.
//! - [terminal]: raw/cooked mode switching and the event loop.
//! - [cmdfile]: the side channel scripts use to queue commands.
//! - [formatter]: text for each listing column.

pub mod cache;
pub mod cmdfile;
pub mod formatter;
pub mod glob;
pub mod input;
pub mod jobs;
pub mod signals;
pub mod sort;
pub mod terminal;

pub use cache::{Entry, EntryCache, EntryId, Lookup};
pub use cmdfile::CommandFile;
pub use input::{InputEvent, MouseButton, MouseEvent, MouseKind};
pub use jobs::{Job, JobOutcome, JobState, JobTable, ScriptInvocation};
pub use sort::{SortField, SortKey, SortSpec};
pub use terminal::{ModeState, TermMode, run_terminal};
