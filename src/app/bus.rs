//! Typed event bus between event sources and the runtime.
//!
//! Every source (user shell, marker tracker) registers exactly once and gets an
//! [`EventSender`]. Registration is tracked per source so a second
//! registration is refused, and [`EventBus::close_all`] revokes every sender on
//! shutdown: sends through a revoked sender fail and messages already queued
//! from it are dropped on receipt. Each message carries the flag of the
//! registration that sent it, so a source that registers again never inherits
//! what its revoked sender left in the queue.

use super::handler::Event;
use crate::domain::{ArCanvasError, RawDetection, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Who is allowed to publish onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Interactive commands from the user.
    UserInput,
    /// Detections from the vendor marker tracker.
    MarkerTracker,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserInput => f.write_str("user-input"),
            Self::MarkerTracker => f.write_str("marker-tracker"),
        }
    }
}

/// Payload carried on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Command(Event),
    Detection(RawDetection),
}

#[derive(Debug)]
struct Envelope {
    source: EventSource,
    registration: Arc<AtomicBool>,
    message: BusMessage,
}

impl Envelope {
    fn is_live(&self) -> bool {
        self.registration.load(Ordering::SeqCst)
    }
}

/// Publishing half handed to a registered source.
#[derive(Debug, Clone)]
pub struct EventSender {
    source: EventSource,
    active: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    /// Publishes a message.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled` once the registration has been revoked or the bus is
    /// gone.
    pub fn send(&self, message: BusMessage) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(ArCanvasError::ServiceDisabled("event bus registration revoked"));
        }
        self.tx
            .send(Envelope {
                source: self.source,
                registration: Arc::clone(&self.active),
                message,
            })
            .map_err(|_| ArCanvasError::ServiceDisabled("event bus closed"))
    }

    /// Shorthand for a [`BusMessage::Command`].
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub fn command(&self, event: Event) -> Result<()> {
        self.send(BusMessage::Command(event))
    }

    /// Shorthand for a [`BusMessage::Detection`].
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub fn detection(&self, detection: RawDetection) -> Result<()> {
        self.send(BusMessage::Detection(detection))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn source(&self) -> EventSource {
        self.source
    }
}

/// Receiving half, owned by the runtime.
#[derive(Debug)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    registrations: HashMap<EventSource, Arc<AtomicBool>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            registrations: HashMap::new(),
        }
    }

    /// Registers a source and returns its sender.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` when the source holds a live registration.
    pub fn register(&mut self, source: EventSource) -> Result<EventSender> {
        if self.is_registered(source) {
            return Err(ArCanvasError::AlreadyRegistered(source.to_string()));
        }
        let active = Arc::new(AtomicBool::new(true));
        self.registrations.insert(source, Arc::clone(&active));
        tracing::debug!(source = %source, "event source registered");
        Ok(EventSender {
            source,
            active,
            tx: self.tx.clone(),
        })
    }

    #[must_use]
    pub fn is_registered(&self, source: EventSource) -> bool {
        self.registrations
            .get(&source)
            .is_some_and(|active| active.load(Ordering::SeqCst))
    }

    /// Revokes a single registration.
    pub fn unregister(&mut self, source: EventSource) {
        if let Some(active) = self.registrations.remove(&source) {
            active.store(false, Ordering::SeqCst);
            tracing::debug!(source = %source, "event source unregistered");
        }
    }

    /// Revokes every registration.
    pub fn close_all(&mut self) {
        for (source, active) in self.registrations.drain() {
            active.store(false, Ordering::SeqCst);
            tracing::debug!(source = %source, "event source unregistered");
        }
    }

    /// Waits for the next message from a live registration.
    ///
    /// Messages queued through a registration that has since been revoked are
    /// skipped, even when the same source has registered again.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let envelope = self.rx.recv().await?;
            if envelope.is_live() {
                return Some(envelope.message);
            }
            tracing::trace!(source = %envelope.source, "message from revoked registration dropped");
        }
    }

    /// Returns the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        while let Ok(envelope) = self.rx.try_recv() {
            if envelope.is_live() {
                return Some(envelope.message);
            }
            tracing::trace!(source = %envelope.source, "message from revoked registration dropped");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_registration_is_refused() {
        let mut bus = EventBus::new();
        let _first = bus.register(EventSource::UserInput).unwrap();
        assert!(matches!(
            bus.register(EventSource::UserInput),
            Err(ArCanvasError::AlreadyRegistered(_))
        ));
        assert!(bus.register(EventSource::MarkerTracker).is_ok());
    }

    #[test]
    fn source_can_register_again_after_unregister() {
        let mut bus = EventBus::new();
        let old = bus.register(EventSource::MarkerTracker).unwrap();
        bus.unregister(EventSource::MarkerTracker);
        assert!(!old.is_active());
        assert!(bus.register(EventSource::MarkerTracker).is_ok());
    }

    #[test]
    fn queue_left_by_a_revoked_sender_is_not_inherited_on_reregister() {
        let mut bus = EventBus::new();
        let old = bus.register(EventSource::MarkerTracker).unwrap();
        old.command(Event::CaptureRequested).unwrap();

        bus.unregister(EventSource::MarkerTracker);
        let new = bus.register(EventSource::MarkerTracker).unwrap();
        assert_eq!(bus.try_recv(), None);

        new.command(Event::UseImageRequested).unwrap();
        assert!(old.command(Event::CaptureRequested).is_err());
        assert_eq!(bus.try_recv(), Some(BusMessage::Command(Event::UseImageRequested)));
    }

    #[tokio::test]
    async fn messages_are_delivered_in_order() {
        let mut bus = EventBus::new();
        let sender = bus.register(EventSource::UserInput).unwrap();
        sender.command(Event::CaptureRequested).unwrap();
        sender.command(Event::UseImageRequested).unwrap();

        assert_eq!(bus.recv().await, Some(BusMessage::Command(Event::CaptureRequested)));
        assert_eq!(bus.recv().await, Some(BusMessage::Command(Event::UseImageRequested)));
    }

    #[test]
    fn close_all_revokes_senders_and_drops_queued_messages() {
        let mut bus = EventBus::new();
        let sender = bus.register(EventSource::UserInput).unwrap();
        sender.command(Event::CaptureRequested).unwrap();

        bus.close_all();
        assert!(sender.command(Event::QuitRequested).is_err());
        assert_eq!(bus.try_recv(), None);
    }
}
