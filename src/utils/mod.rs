//! Process-level helpers around the sync engine

pub mod interrupt;
#[cfg(unix)]
pub mod terminal;

pub use interrupt::{setup_signal_handlers, CancelFlag};

// vim: ts=4
