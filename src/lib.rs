//! Engines behind a small desktop companion: a mood state machine reacting to clicks, drags,
//! idleness, the time of day and CPU load, and a work session tracker that stores tracked time per
//! day and preset.
//!
//! Both engines are driven from a single event queue, see [companion].

pub mod activity;
pub mod cli;
pub mod companion;
pub mod mood;
pub mod schedule;
pub mod storage;
pub mod tracker;
pub mod utils;
pub mod window_api;
