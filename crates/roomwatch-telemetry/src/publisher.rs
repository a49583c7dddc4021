//! Publisher actor: a single Tokio task that owns the room table, both
//! timers and the set of subscribers.
//!
//! Everything that touches the rooms goes through this task's command
//! channel, so there is no shared mutable state and no lock around the
//! table. Subscribers get events over their own unbounded channel; the
//! actor never waits on a subscriber.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use roomwatch_protocol::{Room, ServerEvent};
use roomwatch_tick::TickScheduler;
use tokio::sync::{mpsc, oneshot};

use crate::{RandomSource, RoomTable, TelemetryConfig, TelemetryError};

/// Sending half of a subscriber's event channel.
///
/// The queue is unbounded per subscriber: a socket that stays open but
/// never reads keeps accumulating events until it closes.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half of a subscriber's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Identifies one subscriber within a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Counters describing a running publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherInfo {
    pub rooms: usize,
    pub subscribers: usize,
    pub power_ticks: u64,
    pub status_ticks: u64,
}

enum PublisherCommand {
    Subscribe {
        sender: EventSender,
        reply: oneshot::Sender<SubscriberId>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Room>>,
    },
    Info {
        reply: oneshot::Sender<PublisherInfo>,
    },
    Shutdown,
}

/// Handle to a running publisher. Cheap to clone.
#[derive(Clone)]
pub struct PublisherHandle {
    sender: mpsc::Sender<PublisherCommand>,
}

impl PublisherHandle {
    /// Joins the broadcast set.
    ///
    /// The returned receiver yields `initial_data` first, then every
    /// timer event from this point on.
    pub async fn subscribe(
        &self,
    ) -> Result<(SubscriberId, EventReceiver), TelemetryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(PublisherCommand::Subscribe {
                sender: tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TelemetryError::Unavailable)?;
        let id = reply_rx.await.map_err(|_| TelemetryError::Unavailable)?;
        Ok((id, rx))
    }

    /// Leaves the broadcast set. Unknown ids are ignored.
    pub async fn unsubscribe(
        &self,
        id: SubscriberId,
    ) -> Result<(), TelemetryError> {
        self.sender
            .send(PublisherCommand::Unsubscribe { id })
            .await
            .map_err(|_| TelemetryError::Unavailable)
    }

    /// Current room list.
    pub async fn snapshot(&self) -> Result<Vec<Room>, TelemetryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(PublisherCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| TelemetryError::Unavailable)?;
        reply_rx.await.map_err(|_| TelemetryError::Unavailable)
    }

    pub async fn info(&self) -> Result<PublisherInfo, TelemetryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(PublisherCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| TelemetryError::Unavailable)?;
        reply_rx.await.map_err(|_| TelemetryError::Unavailable)
    }

    /// Stops the publisher task. Subscribers see their channel close.
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        self.sender
            .send(PublisherCommand::Shutdown)
            .await
            .map_err(|_| TelemetryError::Unavailable)
    }
}

struct PublisherActor {
    table: RoomTable,
    random: Box<dyn RandomSource>,
    power_timer: TickScheduler,
    status_timer: TickScheduler,
    max_draw: f64,
    draw_decimals: u32,
    subscribers: HashMap<SubscriberId, EventSender>,
    next_subscriber: u64,
    receiver: mpsc::Receiver<PublisherCommand>,
}

impl PublisherActor {
    async fn run(mut self) {
        tracing::info!(rooms = self.table.len(), "telemetry publisher started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                _ = self.power_timer.wait_for_tick() => self.on_power_tick(),
                _ = self.status_timer.wait_for_tick() => self.on_status_tick(),
            }
        }

        tracing::info!("telemetry publisher stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: PublisherCommand) -> bool {
        match cmd {
            PublisherCommand::Subscribe { sender, reply } => {
                let id = SubscriberId(self.next_subscriber);
                self.next_subscriber += 1;

                // Queued before joining the set, so the snapshot is always
                // the first thing this subscriber sees.
                let snapshot = ServerEvent::InitialData(self.table.snapshot());
                if sender.send(snapshot).is_ok() {
                    self.subscribers.insert(id, sender);
                    tracing::debug!(
                        %id,
                        subscribers = self.subscribers.len(),
                        "subscriber joined"
                    );
                }
                let _ = reply.send(id);
            }
            PublisherCommand::Unsubscribe { id } => {
                if self.subscribers.remove(&id).is_some() {
                    tracing::debug!(
                        %id,
                        subscribers = self.subscribers.len(),
                        "subscriber left"
                    );
                }
            }
            PublisherCommand::Snapshot { reply } => {
                let _ = reply.send(self.table.snapshot());
            }
            PublisherCommand::Info { reply } => {
                let _ = reply.send(PublisherInfo {
                    rooms: self.table.len(),
                    subscribers: self.subscribers.len(),
                    power_ticks: self.power_timer.tick_count(),
                    status_ticks: self.status_timer.tick_count(),
                });
            }
            PublisherCommand::Shutdown => {
                tracing::info!("telemetry publisher shutting down");
                return false;
            }
        }
        true
    }

    fn on_power_tick(&mut self) {
        let update = self.table.apply_power_reading(
            self.random.as_mut(),
            self.max_draw,
            self.draw_decimals,
            Utc::now(),
        );
        match update {
            Some(update) => {
                tracing::debug!(
                    room_id = %update.room_id,
                    current_draw = update.current_draw,
                    "power reading changed"
                );
                self.broadcast(ServerEvent::RoomPowerUpdate(update));
            }
            None => tracing::debug!("no rooms, power tick skipped"),
        }
    }

    fn on_status_tick(&mut self) {
        match self
            .table
            .apply_status_change(self.random.as_mut(), Utc::now())
        {
            Some(update) => {
                tracing::debug!(
                    room_id = %update.room_id,
                    status = %update.status,
                    "room status changed"
                );
                self.broadcast(ServerEvent::RoomStatusUpdate(update));
            }
            None => tracing::debug!("no rooms, status tick skipped"),
        }
    }

    /// Hands the same event to every subscriber. A closed channel only
    /// removes that subscriber.
    fn broadcast(&mut self, event: ServerEvent) {
        let kind = event.kind();
        self.subscribers.retain(|id, sender| {
            if sender.send(event.clone()).is_ok() {
                true
            } else {
                tracing::debug!(%id, %kind, "subscriber gone, dropping");
                false
            }
        });
    }
}

/// Validates `config`, builds the room table and spawns the publisher
/// task. Must be called from within a Tokio runtime.
///
/// # Errors
/// Configuration errors only; nothing after startup is fatal.
pub fn spawn_publisher(
    config: TelemetryConfig,
    random: impl RandomSource,
) -> Result<PublisherHandle, TelemetryError> {
    config.validate()?;
    let table = RoomTable::new(config.rooms)?;
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = PublisherActor {
        table,
        random: Box::new(random),
        power_timer: TickScheduler::new(config.power),
        status_timer: TickScheduler::new(config.status),
        max_draw: config.max_draw,
        draw_decimals: config.draw_decimals,
        subscribers: HashMap::new(),
        next_subscriber: 1,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    Ok(PublisherHandle { sender: tx })
}
