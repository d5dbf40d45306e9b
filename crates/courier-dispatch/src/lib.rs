//! `courier-dispatch` — sends one job's body and media to each of its
//! recipients with per-recipient failure isolation.

pub mod engine;

pub use engine::DispatchEngine;
