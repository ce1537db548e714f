//! Event system for progress operations
//!
//! Services emit an event after a write has been persisted. Listeners never
//! see changes that were discarded by a conflict or timeout.

use progress_engine::{LessonId, Transition, UnitId, Username};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Events emitted by services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    // Progress events
    ProgressSaved {
        username: Username,
        revision: u64,
    },
    TutorialCompleted {
        username: Username,
    },
    LessonUnlocked {
        username: Username,
        unit: UnitId,
        lesson: LessonId,
    },
    LessonCompleted {
        username: Username,
        unit: UnitId,
        lesson: LessonId,
    },
    UnitCompleted {
        username: Username,
        unit: UnitId,
    },
    ProgressReset {
        username: Username,
        scope: ResetScope,
    },

    // Account events
    UserCreated {
        username: Username,
        role: String,
    },
    ClassroomCreated {
        code: String,
        teacher: Username,
    },
    ClassroomDeleted {
        code: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Tutorial,
    Lesson { unit: UnitId, lesson: LessonId },
    Document,
}

impl ProgressEvent {
    /// Map a merge transition onto the event for `username`.
    pub fn from_transition(username: &Username, transition: &Transition) -> Self {
        let username = username.clone();
        match *transition {
            Transition::TutorialCompleted => ProgressEvent::TutorialCompleted { username },
            Transition::LessonUnlocked { unit, lesson } => ProgressEvent::LessonUnlocked {
                username,
                unit,
                lesson,
            },
            Transition::LessonCompleted { unit, lesson } => ProgressEvent::LessonCompleted {
                username,
                unit,
                lesson,
            },
            Transition::UnitCompleted { unit } => ProgressEvent::UnitCompleted { username, unit },
        }
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Event bus for broadcasting progress events
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: ProgressEvent) {
        trace!(event = ?event, "Emitting progress event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::TutorialCompleted { username } => {
                info!(username = %username, "Tutorial completed");
            }
            ProgressEvent::UnitCompleted { username, unit } => {
                info!(username = %username, unit = %unit, "Unit completed");
            }
            ProgressEvent::LessonUnlocked {
                username,
                unit,
                lesson,
            } => {
                debug!(username = %username, unit = %unit, lesson = %lesson, "Lesson unlocked");
            }
            ProgressEvent::ProgressReset { username, scope } => {
                info!(username = %username, scope = ?scope, "Progress reset");
            }
            ProgressEvent::UserCreated { username, role } => {
                info!(username = %username, role = %role, "User created");
            }
            _ => {
                trace!(event = ?event, "Progress event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let username = Username::parse("ana").unwrap();

        bus.emit(ProgressEvent::from_transition(
            &username,
            &Transition::UnitCompleted { unit: UnitId::new(2) },
        ));

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(
            event,
            ProgressEvent::UnitCompleted {
                username,
                unit: UnitId::new(2)
            }
        );
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(ProgressEvent::ClassroomDeleted { code: "A1".into() });
    }
}
