//! Context window trimming.
//!
//! Keeps the most recent part of a conversation that fits a budget, always
//! starting on a human message, with exactly one system message in front.

use agentwire_config::{BudgetUnit, WorkflowConfig};
use agentwire_core::message::{Message, Role};
use tracing::debug;

use super::token::estimate_message_tokens;

/// How much history a prompt may carry. The system message is exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBudget {
    Messages(usize),
    Tokens(usize),
}

impl Default for WindowBudget {
    fn default() -> Self {
        Self::Messages(50)
    }
}

impl WindowBudget {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        match config.budget_unit {
            BudgetUnit::Messages => Self::Messages(config.context_budget),
            BudgetUnit::Tokens => Self::Tokens(config.context_budget),
        }
    }

    /// Index of the first message of the longest suffix that fits.
    fn suffix_start(&self, messages: &[&Message]) -> usize {
        match *self {
            Self::Messages(max) => messages.len().saturating_sub(max),
            Self::Tokens(max) => {
                let mut used = 0;
                let mut start = messages.len();
                for (i, msg) in messages.iter().enumerate().rev() {
                    used += estimate_message_tokens(msg);
                    if used > max {
                        break;
                    }
                    start = i;
                }
                start
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    budget: WindowBudget,
}

impl ContextWindow {
    pub fn new(budget: WindowBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> WindowBudget {
        self.budget
    }

    /// Build the prompt for one agent step from the full history.
    pub fn apply(&self, history: &[Message], system_prompt: &str) -> Vec<Message> {
        let messages: Vec<&Message> = history.iter().filter(|m| m.role != Role::System).collect();

        let cut = self.budget.suffix_start(&messages);
        let start = match messages[cut..].iter().position(|m| m.is_human()) {
            Some(offset) => cut + offset,
            // Nothing human inside the budget: reach back to the nearest
            // human message so the prompt still opens with one.
            None => messages[..cut].iter().rposition(|m| m.is_human()).unwrap_or(cut),
        };
        if start < cut {
            debug!(
                kept = messages.len() - start,
                budget = ?self.budget,
                "Window extended past budget to reach a human message"
            );
        }

        let mut window = Vec::with_capacity(messages.len() - start + 1);
        window.push(Message::system(system_prompt));
        window.extend(messages[start..].iter().map(|m| Message {
            cache_hint: false,
            ..(*m).clone()
        }));
        mark_cache_points(&mut window);
        window
    }
}

/// Hint the final message and the second-to-last human message.
fn mark_cache_points(window: &mut [Message]) {
    if window.len() < 2 {
        return;
    }
    if let Some(last) = window.last_mut() {
        last.cache_hint = true;
    }
    if let Some(idx) = window
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_human())
        .map(|(i, _)| i)
        .rev()
        .nth(1)
    {
        window[idx].cache_hint = true;
    }
}
