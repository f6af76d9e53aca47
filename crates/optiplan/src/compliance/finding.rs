use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warn,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation made by an agent during one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Name of the agent that produced it.
    pub agent: String,
    pub message: String,
    /// Index into `Order::parts` when the finding concerns one part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_index: Option<usize>,
}

impl Finding {
    pub fn new(severity: Severity, agent: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            agent: agent.to_string(),
            message: message.into(),
            part_index: None,
        }
    }

    pub fn error(agent: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, agent, message)
    }

    pub fn warn(agent: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, agent, message)
    }

    pub fn info(agent: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, agent, message)
    }

    pub fn at_part(mut self, index: usize) -> Self {
        self.part_index = Some(index);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part_index {
            Some(i) => write!(f, "[{}] {} (part {}): {}", self.severity, self.agent, i, self.message),
            None => write!(f, "[{}] {}: {}", self.severity, self.agent, self.message),
        }
    }
}
