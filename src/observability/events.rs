//! Countdown lifecycle notifications.
//!
//! Every countdown that starts is followed by exactly one `Finish` or
//! `Cancel` and then a `Close`. The core only publishes; it never waits on
//! or branches on what listeners do with an event.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::countdown::CountdownId;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A lifecycle notification for one countdown.
///
/// Tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// The countdown was registered and its task scheduled.
    Start {
        /// Countdown identifier.
        countdown_id: CountdownId,
        /// When the countdown was registered.
        timestamp: DateTime<Utc>,
    },

    /// Every phase ran out.
    Finish {
        /// Countdown identifier.
        countdown_id: CountdownId,
        /// The instant also handed to the completion callback.
        timestamp: DateTime<Utc>,
    },

    /// The countdown was cancelled before finishing.
    Cancel {
        /// Countdown identifier.
        countdown_id: CountdownId,
        /// When the cancellation was processed.
        timestamp: DateTime<Utc>,
    },

    /// The countdown left the registry; always the last event for it.
    Close {
        /// Countdown identifier.
        countdown_id: CountdownId,
        /// When the countdown was closed.
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Builds a `Start` event stamped now.
    #[must_use]
    pub fn start(countdown_id: CountdownId) -> Self {
        Self::Start {
            countdown_id,
            timestamp: Utc::now(),
        }
    }

    /// Builds a `Finish` event for the given completion instant.
    #[must_use]
    pub const fn finish(countdown_id: CountdownId, timestamp: DateTime<Utc>) -> Self {
        Self::Finish {
            countdown_id,
            timestamp,
        }
    }

    /// Builds a `Cancel` event stamped now.
    #[must_use]
    pub fn cancel(countdown_id: CountdownId) -> Self {
        Self::Cancel {
            countdown_id,
            timestamp: Utc::now(),
        }
    }

    /// Builds a `Close` event stamped now.
    #[must_use]
    pub fn close(countdown_id: CountdownId) -> Self {
        Self::Close {
            countdown_id,
            timestamp: Utc::now(),
        }
    }

    /// Returns the countdown this event belongs to.
    #[must_use]
    pub const fn countdown_id(&self) -> &CountdownId {
        match self {
            Self::Start { countdown_id, .. }
            | Self::Finish { countdown_id, .. }
            | Self::Cancel { countdown_id, .. }
            | Self::Close { countdown_id, .. } => countdown_id,
        }
    }

    /// Returns the variant name, matching the serialized `"type"` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "Start",
            Self::Finish { .. } => "Finish",
            Self::Cancel { .. } => "Cancel",
            Self::Close { .. } => "Close",
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Destination for lifecycle notifications.
///
/// `publish` is fire-and-forget: implementations must not block for long
/// and must not fail.
pub trait NotificationBus: Send + Sync + 'static {
    /// Delivers one event.
    fn publish(&self, event: LifecycleEvent);
}

impl<F> NotificationBus for F
where
    F: Fn(LifecycleEvent) + Send + Sync + 'static,
{
    fn publish(&self, event: LifecycleEvent) {
        self(event);
    }
}

/// Fan-out bus backed by a Tokio broadcast channel.
///
/// Publishing with no subscribers drops the event. Slow subscribers see
/// `RecvError::Lagged` rather than slowing down countdowns.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastBus {
    /// Creates a bus retaining up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationBus for BroadcastBus {
    fn publish(&self, event: LifecycleEvent) {
        let _ = self.sender.send(event);
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps a [`LifecycleEvent`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: LifecycleEvent,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that writes to stderr.
    ///
    /// The binary's default, keeping stdout free for alert output.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: LifecycleEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl NotificationBus for EventEmitter {
    fn publish(&self, event: LifecycleEvent) {
        self.emit(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
