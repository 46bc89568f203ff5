//! Headless, typed, channel-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Channels
//!
//! Traffic is partitioned into one lane per [`Channel`]:
//!
//! | Channel | Topic | Payload |
//! |---|---|---|
//! | [`Channel::Temperature`] | `/temp` | current and simulated temperature |
//! | [`Channel::AmmoniaLevel`] | `/ammonia` | analog ammonia level |
//! | [`Channel::AmmoniaAlert`] | `/ammonia_alert` | critical ammonia alert text |
//!
//! Every publish is also mirrored into a tap that yields `(Channel, Event)`
//! pairs, for consumers such as the rosbridge endpoint that follow several
//! channels at once.

use sensorbridge_types::{BridgeError, Channel, Event};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    temperature: broadcast::Sender<Event>,
    ammonia_level: broadcast::Sender<Event>,
    ammonia_alert: broadcast::Sender<Event>,
    tap: broadcast::Sender<(Channel, Event)>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every lane and to the tap independently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a Tokio broadcast requirement).
    pub fn new(capacity: usize) -> Self {
        let (temperature, _) = broadcast::channel(capacity);
        let (ammonia_level, _) = broadcast::channel(capacity);
        let (ammonia_alert, _) = broadcast::channel(capacity);
        let (tap, _) = broadcast::channel(capacity);
        Self {
            temperature,
            ammonia_level,
            ammonia_alert,
            tap,
        }
    }

    /// Publish `event` to the given [`Channel`].
    ///
    /// Returns the number of receivers that were handed the event, counting
    /// both lane subscribers and tap subscribers.  Returns `Ok(0)` when
    /// nobody is listening; that is a normal condition, not an error.
    pub fn publish_to(&self, channel: Channel, event: Event) -> Result<usize, BridgeError> {
        // A send error only means there are no receivers right now.
        let tapped = self.tap.send((channel, event.clone())).unwrap_or(0);
        let delivered = self.channel_sender(channel).send(event).unwrap_or(0);
        Ok(delivered + tapped)
    }

    /// Subscribe to a single [`Channel`].
    pub fn subscribe_to(&self, channel: Channel) -> ChannelReceiver {
        ChannelReceiver {
            channel,
            receiver: self.channel_sender(channel).subscribe(),
        }
    }

    /// Subscribe to every channel at once through the mirror tap.
    pub fn subscribe_all(&self) -> broadcast::Receiver<(Channel, Event)> {
        self.tap.subscribe()
    }

    /// Number of subscribers currently attached to `channel`'s lane.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channel_sender(channel).receiver_count()
    }

    fn channel_sender(&self, channel: Channel) -> &broadcast::Sender<Event> {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::AmmoniaLevel => &self.ammonia_level,
            Channel::AmmoniaAlert => &self.ammonia_alert,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Channel`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct ChannelReceiver {
    channel: Channel,
    receiver: broadcast::Receiver<Event>,
}

impl ChannelReceiver {
    /// Wait for the next event on this channel.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for synchronous callers and tests.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Channel`] this receiver is bound to.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}
