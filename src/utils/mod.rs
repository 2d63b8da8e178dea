pub mod command;
pub mod locker;

// Trait-based abstraction for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use command::{CommandError, CommandOutput};
pub use executor::{CommandExecutor, RealExecutor};
