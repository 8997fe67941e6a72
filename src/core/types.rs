use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(tag)
    }
}

/// 核心流程产生的日志事件，由调用方决定如何展示
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub at: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// 交给控制台显示的一行，带上事件发生的时间
    pub fn line(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// 正确答案的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Api,
    Dom,
    Missing,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub located: usize,
    pub emitted: usize,
    pub answers_from_api: usize,
    pub answers_from_dom: usize,
    pub answers_missing: usize,
    pub images_assigned: usize,
    pub images_failed: usize,
}

impl RunStats {
    pub fn add_answer(&mut self, source: AnswerSource) {
        match source {
            AnswerSource::Api => self.answers_from_api += 1,
            AnswerSource::Dom => self.answers_from_dom += 1,
            AnswerSource::Missing => self.answers_missing += 1,
        }
    }
}
