//! Storage of tracked time is organized through [history_store::HistoryStore].
//! The basic idea is:
//!  - Time is accumulated per day and per [category::Category], never decremented.
//!  - [history_store::JsonHistoryStore] keeps the whole history in one json document.
//!  - [memory::MemoryHistoryStore] keeps it in memory.

pub mod category;
pub mod entities;
pub mod history_store;
pub mod memory;
