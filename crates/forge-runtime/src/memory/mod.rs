//! Session memory and the budget-triggered compactor (§4.3).

pub mod compactor;
pub mod long_term;
pub mod session_store;

pub use compactor::Compactor;
pub use long_term::{KeywordIndex, LongTermMemory, ScoredSnippet};
pub use session_store::SessionStore;
