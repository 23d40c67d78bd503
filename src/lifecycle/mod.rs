//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop watches → unsubscribe → exit
//! ```

pub mod signals;

pub use signals::shutdown_signal;
