//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() or Ctrl+C → server stops accepting → in-flight requests drain → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
