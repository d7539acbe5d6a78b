//! The person at the terminal: numbered menus, free text, yes/no questions,
//! and plain output.

use crate::utils::logging::LoggingState;
use async_trait::async_trait;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

const INVALID_CHOICE_MSG: &str = "Invalid choice";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    /// Input reached end of file.
    Closed,
    /// The answer could not be understood.
    Invalid(String),
    Io(String),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::Closed => write!(f, "input closed"),
            OperatorError::Invalid(message) => write!(f, "{message}"),
            OperatorError::Io(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for OperatorError {}

/// Interaction surface used by the session loop and the sampling bridge.
///
/// Calls may come from concurrent tasks; implementations keep each prompt
/// and its answer together.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Returns the index of the chosen entry.
    async fn select(&self, message: &str, choices: &[String]) -> Result<usize, OperatorError>;

    async fn input(&self, message: &str) -> Result<String, OperatorError>;

    async fn confirm(&self, message: &str, default: bool) -> Result<bool, OperatorError>;

    fn show(&self, text: &str);

    /// Shows `text` and asks `question` about it as one exchange, so nothing
    /// else is printed between the two.
    async fn review(&self, text: &str, question: &str, default: bool) -> Result<bool, OperatorError> {
        self.show(text);
        self.confirm(question, default).await
    }
}

/// Parses a 1-based menu answer into an index.
pub fn parse_selection(input: &str, count: usize) -> Result<usize, OperatorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(OperatorError::Invalid("Selection cannot be empty".to_string()));
    }

    let choice: usize = trimmed
        .parse()
        .map_err(|_| OperatorError::Invalid(INVALID_CHOICE_MSG.to_string()))?;

    if choice == 0 || choice > count {
        return Err(OperatorError::Invalid(INVALID_CHOICE_MSG.to_string()));
    }
    Ok(choice - 1)
}

/// An empty answer takes the default.
pub fn parse_confirmation(input: &str, default: bool) -> Result<bool, OperatorError> {
    match input.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(OperatorError::Invalid(
            "Invalid confirmation response".to_string(),
        )),
    }
}

/// Reads from stdin and writes to stdout, mirroring the exchange into the
/// transcript when one is configured.
pub struct TerminalOperator {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    transcript: StdMutex<LoggingState>,
}

impl TerminalOperator {
    pub fn new(transcript: LoggingState) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            transcript: StdMutex::new(transcript),
        }
    }

    fn record(&self, content: &str) {
        let Ok(transcript) = self.transcript.lock() else {
            return;
        };
        if let Err(err) = transcript.log_message(content) {
            warn!(error = %err, "Failed to write transcript");
        }
    }

    fn write_prompt(text: &str) -> Result<(), OperatorError> {
        let mut stdout = io::stdout();
        write!(stdout, "{text}")
            .and_then(|_| stdout.flush())
            .map_err(|err| OperatorError::Io(err.to_string()))
    }

    async fn confirm_after(
        &self,
        preface: Option<&str>,
        message: &str,
        default: bool,
    ) -> Result<bool, OperatorError> {
        let hint = if default { "Y/n" } else { "y/N" };
        let confirmed = self
            .ask(preface, &format!("{message} ({hint}): "), |answer| {
                parse_confirmation(answer, default)
            })
            .await?;
        self.record(&format!(
            "{message}: {}",
            if confirmed { "yes" } else { "no" }
        ));
        Ok(confirmed)
    }

    /// Returns the line exactly as typed, minus its terminator.
    async fn read_answer<R: AsyncBufRead + Unpin>(
        lines: &mut Lines<R>,
    ) -> Result<String, OperatorError> {
        match lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(OperatorError::Closed),
            Err(err) => Err(OperatorError::Io(err.to_string())),
        }
    }

    /// Asks until `parse` accepts the answer; the prompt lock is held for
    /// the whole exchange, including the optional `preface`.
    async fn ask<T>(
        &self,
        preface: Option<&str>,
        prompt: &str,
        parse: impl Fn(&str) -> Result<T, OperatorError>,
    ) -> Result<T, OperatorError> {
        let mut lines = self.lines.lock().await;
        if let Some(preface) = preface {
            self.show(preface);
        }
        loop {
            Self::write_prompt(prompt)?;
            let answer = Self::read_answer(&mut lines).await?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(OperatorError::Invalid(message)) => println!("{message}"),
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn select(&self, message: &str, choices: &[String]) -> Result<usize, OperatorError> {
        if choices.is_empty() {
            return Err(OperatorError::Invalid(INVALID_CHOICE_MSG.to_string()));
        }
        let mut menu = format!("{message}\n");
        for (index, choice) in choices.iter().enumerate() {
            menu.push_str(&format!("  {}. {}\n", index + 1, choice));
        }
        menu.push_str(&format!("Select an option (1-{}): ", choices.len()));

        let index = self
            .ask(None, &menu, |answer| parse_selection(answer, choices.len()))
            .await?;
        self.record(&format!("{message} {}", choices[index]));
        Ok(index)
    }

    async fn input(&self, message: &str) -> Result<String, OperatorError> {
        let answer = self
            .ask(None, &format!("{message}: "), |answer| Ok(answer.to_string()))
            .await?;
        self.record(&format!("{message}: {answer}"));
        Ok(answer)
    }

    async fn confirm(&self, message: &str, default: bool) -> Result<bool, OperatorError> {
        self.confirm_after(None, message, default).await
    }

    async fn review(&self, text: &str, question: &str, default: bool) -> Result<bool, OperatorError> {
        self.confirm_after(Some(text), question, default).await
    }

    fn show(&self, text: &str) {
        println!("{text}");
        self.record(text);
    }
}
