//! Status/message accumulator returned by every pipeline stage.
//!
//! Stages never throw partial failures past their boundary. They return an
//! [`Outcome`] carrying the data they managed to produce, an overall
//! [`Status`], and an ordered log of messages. Outcomes from sub-stages are
//! folded together with [`Outcome::combine`] or [`Outcome::absorb`].

use serde::{Deserialize, Serialize};

/// Severity levels for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Overall status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Success,
    Failed,
}

impl Status {
    /// Logical AND of two statuses.
    pub fn and(self, other: Status) -> Status {
        match (self, other) {
            (Status::Success, Status::Success) => Status::Success,
            _ => Status::Failed,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

/// Data produced by a stage plus its status and message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub status: Status,
    pub messages: Vec<Message>,
    pub data: T,
}

impl<T: Default> Default for Outcome<T> {
    fn default() -> Self {
        Self::success(T::default())
    }
}

impl<T> Outcome<T> {
    /// A successful outcome with no messages.
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            messages: Vec::new(),
            data,
        }
    }

    /// A failed outcome carrying a single error message.
    pub fn failure(data: T, text: impl Into<String>) -> Self {
        let mut outcome = Self::success(data);
        outcome.error(text);
        outcome
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(Message::new(Severity::Info, text));
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.push(Message::new(Severity::Warning, text));
    }

    /// Records an error. Errors mark the outcome as failed.
    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Message::new(Severity::Error, text));
    }

    /// Appends a message, updating the status for errors.
    pub fn push(&mut self, message: Message) {
        if message.severity == Severity::Error {
            self.status = Status::Failed;
        }
        self.messages.push(message);
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Merge another outcome's status and messages into this one and hand
    /// back its data.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.status = self.status.and(other.status);
        self.messages.extend(other.messages);
        other.data
    }

    /// Combine two outcomes: status is ANDed, messages are concatenated in
    /// order (self first), data is joined with `f`.
    pub fn combine<U, V>(self, other: Outcome<U>, f: impl FnOnce(T, U) -> V) -> Outcome<V> {
        let mut messages = self.messages;
        messages.extend(other.messages);
        Outcome {
            status: self.status.and(other.status),
            messages,
            data: f(self.data, other.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            status: self.status,
            messages: self.messages,
            data: f(self.data),
        }
    }

    /// Number of messages at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    /// Newline-joined message texts.
    pub fn message_log(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and() {
        assert_eq!(Status::Success.and(Status::Success), Status::Success);
        assert_eq!(Status::Success.and(Status::Failed), Status::Failed);
        assert_eq!(Status::Failed.and(Status::Success), Status::Failed);
    }

    #[test]
    fn test_warning_keeps_success() {
        let mut outcome = Outcome::success(());
        outcome.warn("skipped a row");
        outcome.info("read 3 files");
        assert!(outcome.is_success());
        assert_eq!(outcome.count(Severity::Warning), 1);
    }

    #[test]
    fn test_error_fails() {
        let mut outcome = Outcome::success(1);
        outcome.error("chunk 2 failed");
        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(outcome.message_log(), "chunk 2 failed");
    }

    #[test]
    fn test_combine_preserves_order() {
        let mut a = Outcome::success(vec![1]);
        a.info("first");
        let mut b = Outcome::success(vec![2, 3]);
        b.error("second");

        let combined = a.combine(b, |mut x, y| {
            x.extend(y);
            x
        });

        assert_eq!(combined.data, vec![1, 2, 3]);
        assert_eq!(combined.status, Status::Failed);
        assert_eq!(combined.message_log(), "first\nsecond");
    }

    #[test]
    fn test_absorb_returns_data() {
        let mut parent: Outcome<Vec<i32>> = Outcome::success(Vec::new());
        let mut child = Outcome::success(vec![7]);
        child.warn("degraded");
        let data = parent.absorb(child);
        parent.data.extend(data);
        assert_eq!(parent.data, vec![7]);
        assert_eq!(parent.messages.len(), 1);
        assert!(parent.is_success());
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }
}
