// crates/core/src/lib.rs
pub mod allocation;
pub mod board;
pub mod clustering;
pub mod error;
pub mod grouping;
pub mod habits;
pub mod optimistic;
pub mod preferences;
pub mod trend;
pub mod types;

pub use error::*;
pub use types::*;
pub use board::{build_board, BoardGroup, MediaBoard};
pub use optimistic::{optimistic_mutation, KeyedMutationQueue, Optimistic, RecordCache};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
