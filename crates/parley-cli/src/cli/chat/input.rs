//! Async line input for the REPL.
//!
//! Wraps `rustyline_async::Readline`. Because the terminal stays in raw
//! mode, Ctrl+C arrives here as [`InputEvent::Interrupted`] rather than as
//! a signal, including while a turn is running. Lines submitted while a
//! turn is running are queued and handed out by the next
//! [`ChatInput::read_line`].

use std::collections::VecDeque;

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// What the user did at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// A submitted line, trimmed.
    Line(String),
    /// Ctrl+D.
    Eof,
    /// Ctrl+C.
    Interrupted,
}

/// Lines waiting to be evaluated, oldest first.
#[derive(Debug, Default)]
pub struct LineQueue {
    lines: VecDeque<String>,
}

impl LineQueue {
    /// Empty lines are dropped.
    pub fn push(&mut self, line: String) {
        if !line.is_empty() {
            self.lines.push_back(line);
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub struct ChatInput {
    rl: Readline,
    queued: LineQueue,
}

impl ChatInput {
    /// Returns the input handler and a writer that prints above the prompt.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt)?;
        Ok((
            Self {
                rl,
                queued: LineQueue::default(),
            },
            stdout,
        ))
    }

    pub fn update_prompt(&mut self, prompt: &str) {
        let _ = self.rl.update_prompt(prompt);
    }

    /// The oldest queued line, or the next event from the terminal.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.queued.pop() {
            Some(line) => InputEvent::Line(line),
            None => self.read_live().await,
        }
    }

    /// The next event from the terminal, skipping the queue.
    pub async fn read_live(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    self.rl.add_history_entry(line.clone());
                }
                InputEvent::Line(line)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(_) => InputEvent::Eof,
        }
    }

    /// Read lines as typed, untrimmed and kept out of the history, until a
    /// line holding only `.` or Ctrl+D. Ctrl+C aborts with `None`.
    pub async fn read_block(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        loop {
            match self.rl.readline().await {
                Ok(ReadlineEvent::Line(line)) if ends_block(&line) => break,
                Ok(ReadlineEvent::Line(line)) => lines.push(line),
                Ok(ReadlineEvent::Eof) | Err(_) => break,
                Ok(ReadlineEvent::Interrupted) => return None,
            }
        }
        Some(lines.join("\n"))
    }

    /// Keep a line for a later [`ChatInput::read_line`].
    pub fn queue(&mut self, line: String) {
        self.queued.push(line);
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Restore the terminal before exiting.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}

fn ends_block(line: &str) -> bool {
    line.trim() == "."
}
