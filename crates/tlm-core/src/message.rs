//! Severity-tagged message queue.
//!
//! Systems, factories and schedulers push messages here; the host drains
//! them after (or during) a run. One handler belongs to one session, so
//! independent sessions never share a queue. Every message is also emitted
//! through `tracing` at the matching level.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Default upper bound on queued messages. The oldest message is dropped
/// when a new one arrives at capacity.
pub const DEFAULT_MAX_QUEUE: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoreMessage {
    pub severity: Severity,
    pub text: String,
    /// Short machine-readable tag, e.g. `"log-alloc"` or `"config"`.
    pub tag: String,
}

impl fmt::Display for CoreMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "[{}] {}", self.severity, self.text)
        } else {
            write!(f, "[{}:{}] {}", self.severity, self.tag, self.text)
        }
    }
}

/// Number of messages of each severity currently queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SeverityCounts {
    pub debug: usize,
    pub info: usize,
    pub warning: usize,
    pub error: usize,
    pub fatal: usize,
}

impl SeverityCounts {
    fn slot(&mut self, severity: Severity) -> &mut usize {
        match severity {
            Severity::Debug => &mut self.debug,
            Severity::Info => &mut self.info,
            Severity::Warning => &mut self.warning,
            Severity::Error => &mut self.error,
            Severity::Fatal => &mut self.fatal,
        }
    }
}

#[derive(Debug, Default)]
struct Queue {
    messages: VecDeque<CoreMessage>,
    counts: SeverityCounts,
}

#[derive(Debug)]
pub struct MessageHandler {
    queue: Mutex<Queue>,
    max_queue: usize,
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_QUEUE)
    }
}

impl MessageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that keeps at most `max_queue` messages (at least one).
    pub fn with_capacity(max_queue: usize) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            max_queue: max_queue.max(1),
        }
    }

    pub fn add(&self, severity: Severity, tag: &str, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Debug => tracing::debug!(tag, "{text}"),
            Severity::Info => tracing::info!(tag, "{text}"),
            Severity::Warning => tracing::warn!(tag, "{text}"),
            Severity::Error | Severity::Fatal => tracing::error!(tag, %severity, "{text}"),
        }

        let mut q = self.lock();
        if q.messages.len() >= self.max_queue {
            if let Some(dropped) = q.messages.pop_front() {
                let slot = q.counts.slot(dropped.severity);
                *slot = slot.saturating_sub(1);
            }
        }
        *q.counts.slot(severity) += 1;
        q.messages.push_back(CoreMessage {
            severity,
            text,
            tag: tag.to_string(),
        });
    }

    pub fn add_debug(&self, tag: &str, text: impl Into<String>) {
        self.add(Severity::Debug, tag, text);
    }

    pub fn add_info(&self, tag: &str, text: impl Into<String>) {
        self.add(Severity::Info, tag, text);
    }

    pub fn add_warning(&self, tag: &str, text: impl Into<String>) {
        self.add(Severity::Warning, tag, text);
    }

    pub fn add_error(&self, tag: &str, text: impl Into<String>) {
        self.add(Severity::Error, tag, text);
    }

    pub fn add_fatal(&self, tag: &str, text: impl Into<String>) {
        self.add(Severity::Fatal, tag, text);
    }

    /// Oldest queued message, removing it.
    pub fn pop(&self) -> Option<CoreMessage> {
        let mut q = self.lock();
        let msg = q.messages.pop_front()?;
        let slot = q.counts.slot(msg.severity);
        *slot = slot.saturating_sub(1);
        Some(msg)
    }

    /// Drain every queued message in arrival order.
    pub fn take_all(&self) -> Vec<CoreMessage> {
        let mut q = self.lock();
        q.counts = SeverityCounts::default();
        q.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> SeverityCounts {
        self.lock().counts
    }

    pub fn clear(&self) {
        let mut q = self.lock();
        q.messages.clear();
        q.counts = SeverityCounts::default();
    }

    // A poisoned queue still holds valid messages; keep using it.
    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_queue_contents() {
        let h = MessageHandler::new();
        h.add_info("run", "started");
        h.add_warning("log-alloc", "logging disabled for node 3");
        h.add_error("config", "unknown port");

        let c = h.counts();
        assert_eq!((c.info, c.warning, c.error), (1, 1, 1));

        let first = h.pop().unwrap();
        assert_eq!(first.severity, Severity::Info);
        assert_eq!(h.counts().info, 0);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn bounded_queue_drops_oldest() {
        let h = MessageHandler::with_capacity(3);
        for i in 0..5 {
            h.add_debug("", format!("msg {i}"));
        }
        let all = h.take_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text, "msg 2");
        assert_eq!(h.counts(), SeverityCounts::default());
        assert!(h.is_empty());
    }

    #[test]
    fn display_includes_tag() {
        let m = CoreMessage {
            severity: Severity::Fatal,
            text: "boom".into(),
            tag: "step".into(),
        };
        assert_eq!(m.to_string(), "[fatal:step] boom");
    }
}
