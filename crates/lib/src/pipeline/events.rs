//! Structured progress events emitted by stages.

use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
  Info,
  Success,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
  pub level: EventLevel,
  pub message: String,
}

impl StageEvent {
  pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
    Self {
      level,
      message: message.into(),
    }
  }
}

/// Called for every event as it is recorded.
pub type EventSink = Arc<dyn Fn(&StageEvent) + Send + Sync>;

/// Append-only event record for one pipeline run.
///
/// Stages write into the log they are handed; the engine returns the whole
/// log whether the run succeeded or not.
#[derive(Default)]
pub struct EventLog {
  events: Vec<StageEvent>,
  sink: Option<EventSink>,
}

impl std::fmt::Debug for EventLog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventLog")
      .field("events", &self.events)
      .field("sink", &self.sink.is_some())
      .finish()
  }
}

impl EventLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// A log that also forwards each event to `sink` as it arrives.
  pub fn with_sink(sink: EventSink) -> Self {
    Self {
      events: Vec::new(),
      sink: Some(sink),
    }
  }

  pub fn push(&mut self, event: StageEvent) {
    if let Some(sink) = &self.sink {
      sink(&event);
    }
    self.events.push(event);
  }

  pub fn info(&mut self, message: impl Into<String>) {
    self.push(StageEvent::new(EventLevel::Info, message));
  }

  pub fn success(&mut self, message: impl Into<String>) {
    self.push(StageEvent::new(EventLevel::Success, message));
  }

  pub fn warning(&mut self, message: impl Into<String>) {
    self.push(StageEvent::new(EventLevel::Warning, message));
  }

  pub fn error(&mut self, message: impl Into<String>) {
    self.push(StageEvent::new(EventLevel::Error, message));
  }

  /// Append every event of `other`, in order.
  pub fn append(&mut self, other: EventLog) {
    for event in other.events {
      self.push(event);
    }
  }

  pub fn events(&self) -> &[StageEvent] {
    &self.events
  }

  pub fn into_events(self) -> Vec<StageEvent> {
    self.events
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }
}
