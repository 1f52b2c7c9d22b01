//! Operator prompt/response I/O

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::error::GraphError;
use crate::transform::{parse_coordinates, WorldPoint};

/// The human on the other side of the prompts.
pub trait Operator {
    /// Show `prompt` and return the operator's answer with surrounding whitespace trimmed.
    ///
    /// Fails with [`GraphError::InputClosed`] once no more input can arrive.
    fn ask(&mut self, prompt: &str) -> Result<String, GraphError>;

    /// Show an informational line.
    fn tell(&mut self, message: &str) -> Result<(), GraphError>;
}

/// Line-oriented operator over any reader/writer pair (stdin/stdout in the tool).
pub struct LineOperator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the writer, e.g. to inspect what was shown.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Operator for LineOperator<R, W> {
    fn ask(&mut self, prompt: &str) -> Result<String, GraphError> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(GraphError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    fn tell(&mut self, message: &str) -> Result<(), GraphError> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}

/// Operator that replays canned answers; records everything it was shown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub messages: Vec<String>,
}

impl ScriptedOperator {
    /// Operator that answers with `answers`, in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    /// Whether any prompt so far contained `needle`.
    pub fn was_asked(&self, needle: &str) -> bool {
        self.prompts.iter().any(|p| p.contains(needle))
    }

    /// Whether any message so far contained `needle`.
    pub fn was_told(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl Operator for ScriptedOperator {
    fn ask(&mut self, prompt: &str) -> Result<String, GraphError> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .map(|a| a.trim().to_string())
            .ok_or(GraphError::InputClosed)
    }

    fn tell(&mut self, message: &str) -> Result<(), GraphError> {
        self.messages.push(message.to_string());
        Ok(())
    }
}

/// Interpret a yes/no style answer. `None` for anything unrecognized, including empty.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// Keep asking until the operator types a well-formed `lat, lon` pair.
pub fn ask_coordinates<O: Operator + ?Sized>(
    operator: &mut O,
    prompt: &str,
) -> Result<WorldPoint, GraphError> {
    loop {
        let answer = operator.ask(prompt)?;
        match parse_coordinates(&answer) {
            Ok(point) => return Ok(point),
            Err(e) => operator.tell(&e.to_string())?,
        }
    }
}

/// Keep asking until the answer is non-empty.
pub fn ask_non_empty<O: Operator + ?Sized>(
    operator: &mut O,
    prompt: &str,
) -> Result<String, GraphError> {
    loop {
        let answer = operator.ask(prompt)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}
