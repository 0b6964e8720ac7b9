// src/events.rs

//! Explicit notification channel for things callers may want to react to
//! (achievement toasts, dashboards). Passed into the service layer instead
//! of a process-wide bus.

use crate::achievements::Achievement;
use crate::models::Quality;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NexusEvent {
    CardReviewed {
        flashcard_id: i64,
        quality: Quality,
        next_review: DateTime<Utc>,
    },
    ModuleCompleted {
        module_id: i64,
    },
    ProjectCompleted {
        project_id: i64,
    },
    AchievementUnlocked {
        achievement: Achievement,
        unlocked_at: DateTime<Utc>,
    },
}

pub trait EventSink {
    fn emit(&self, event: NexusEvent);
}

/// Forwards events over an mpsc channel.
pub struct ChannelSink {
    tx: Mutex<Sender<NexusEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<NexusEvent>) {
        let (tx, rx) = channel();
        (ChannelSink { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: NexusEvent) {
        let tx = match self.tx.lock() {
            Ok(tx) => tx,
            Err(poisoned) => poisoned.into_inner(),
        };
        if tx.send(event).is_err() {
            warn!("[Events] Receiver dropped, event lost");
        }
    }
}

/// Keeps everything it receives. Handy for tests and batch callers.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NexusEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<NexusEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: NexusEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(NexusEvent::ModuleCompleted { module_id: 3 });
        assert_eq!(rx.recv().unwrap(), NexusEvent::ModuleCompleted { module_id: 3 });
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(NexusEvent::ProjectCompleted { project_id: 1 });
    }

    #[test]
    fn test_recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.emit(NexusEvent::ModuleCompleted { module_id: 1 });
        sink.emit(NexusEvent::ProjectCompleted { project_id: 2 });
        assert_eq!(sink.take().len(), 2);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(NexusEvent::ModuleCompleted { module_id: 7 }).unwrap();
        assert_eq!(json["type"], "moduleCompleted");
        assert_eq!(json["module_id"], 7);
    }
}
