//! Context window management: what part of the history each agent step sees.

pub mod token;
pub mod window;

pub use window::{ContextWindow, WindowBudget};
