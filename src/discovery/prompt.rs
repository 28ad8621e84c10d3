// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator input for instance selection.
//!
//! Discovery only ever needs one thing from the operator: a line of text
//! answering "which instance?". Validating that answer is left to the caller,
//! so the selection loop can be exercised without a terminal.

use inquire::Text;
use std::collections::VecDeque;

/// Source of operator answers.
pub trait InstancePrompt {
    /// Ask the operator a question and return their raw answer.
    fn ask(&mut self, message: &str) -> Result<String>;
}

/// Prompt the operator on the interactive terminal.
///
/// Requires a real TTY. Piped stdin (`echo 2 | moonraker-installer discover`)
/// is rejected by [`inquire`], as is the operator pressing Esc or Ctrl-C.
/// Either case fails with [`PromptError::Inquire`], which ends instance
/// selection even though bad answers are otherwise re-asked forever. Use
/// [`ScriptedPrompt`] (the `--select` flag) for non-interactive runs.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompt;

impl InquirePrompt {
    /// Construct new terminal prompt.
    pub fn new() -> Self {
        Self
    }
}

impl InstancePrompt for InquirePrompt {
    fn ask(&mut self, message: &str) -> Result<String> {
        Ok(Text::new(message).prompt()?)
    }
}

/// Prompt that replays a fixed list of answers.
///
/// Handy for non-interactive runs where the answer is known up front. Runs
/// out with [`PromptError::Exhausted`] once every answer has been handed out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: usize,
}

impl ScriptedPrompt {
    /// Construct new scripted prompt.
    pub fn new(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: 0,
        }
    }

    /// Number of times the prompt has been asked.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

impl InstancePrompt for ScriptedPrompt {
    fn ask(&mut self, _message: &str) -> Result<String> {
        self.asked += 1;
        self.answers.pop_front().ok_or(PromptError::Exhausted)
    }
}

/// Instance prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal prompt fails or is cancelled by the operator.
    #[error(transparent)]
    Inquire(#[from] inquire::InquireError),

    /// Scripted prompt has no answers left.
    #[error("no more answers available for instance selection")]
    Exhausted,
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
