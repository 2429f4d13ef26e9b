//! Tool engines wrapped by `crate::runtime::tools` behind the flat `Tool`
//! contract.
//!
//! - **Calculator**: scientific calculator (arithmetic, trigonometric,
//!   logarithmic, and statistical functions), stateless and thread-safe.
//! - **Memory**: TTL-aware key-value store with automatic background
//!   expiration, thread-safe with full async support.

pub mod calculator;
pub mod memory;

pub use calculator::{Calculator, CalculatorError, CalculatorResult};
pub use memory::{Memory, MemoryMetadata};
