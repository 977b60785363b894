use super::{
    ingress::{Mailbox, Message},
    metrics, Config,
};
use crate::{
    host,
    router::{extract_id, owner, shard_of, Responder},
    types::EntityId,
    wire::{Envelope, Request},
};
use bytes::Bytes;
use commonware_codec::DecodeExt;
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::{channel::mpsc, StreamExt};
use std::{
    collections::HashMap,
    num::{NonZeroU32, NonZeroUsize},
};
use tracing::{debug, error, info, trace, warn};

/// Where requests for an entity currently go.
enum Slot {
    /// A host is running and accepting requests.
    Active {
        incarnation: u64,
        mailbox: host::Mailbox,
    },

    /// The host went idle and is releasing its state. Requests wait here until it stops.
    Passivating {
        incarnation: u64,
        buffer: Vec<host::Message>,
    },
}

/// Maps entity identifiers to hosts, starting hosts on demand and restarting them after
/// passivation.
///
/// All routing and lifecycle decisions for the entities of a region are made by this single task,
/// so there is never more than one live host per identifier.
pub struct Actor<E: Clock + Spawner + Metrics> {
    context: E,
    shards: NonZeroU32,
    index: usize,
    regions: NonZeroUsize,
    host: host::Config,

    mailbox: mpsc::Receiver<Message>,
    signal_sender: mpsc::UnboundedSender<host::Signal>,
    signals: mpsc::UnboundedReceiver<host::Signal>,

    slots: HashMap<EntityId, Slot>,
    next_incarnation: u64,

    metrics: metrics::Metrics,
}

impl<E: Clock + Spawner + Metrics> Actor<E> {
    /// Create a new region. Returns the actor and a mailbox for sending it requests.
    pub fn new(context: E, cfg: Config) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        let (signal_sender, signals) = mpsc::unbounded();
        let metrics = metrics::Metrics::init(context.clone());
        (
            Self {
                context,
                shards: cfg.shards,
                index: cfg.index,
                regions: cfg.regions,
                host: host::Config {
                    idle_timeout: cfg.idle_timeout,
                    mailbox_size: cfg.mailbox_size,
                },
                mailbox: receiver,
                signal_sender,
                signals,
                slots: HashMap::new(),
                next_incarnation: 0,
                metrics,
            },
            Mailbox::new(sender),
        )
    }

    pub fn start(self) -> Handle<()> {
        self.context.clone().spawn(|_| self.run())
    }

    async fn run(mut self) {
        info!(
            shards = self.shards.get(),
            index = self.index,
            regions = self.regions.get(),
            "region started"
        );
        loop {
            select! {
                signal = self.signals.next() => {
                    // We hold a sender, so the stream never ends
                    let Some(signal) = signal else {
                        break;
                    };
                    self.handle_signal(signal).await;
                },
                message = self.mailbox.next() => {
                    let Some(message) = message else {
                        info!("mailbox closed, stopping region");
                        break;
                    };
                    match message {
                        Message::Route { request, responder } => {
                            self.route(request, responder).await;
                        }
                        Message::Deliver { payload, responder } => {
                            self.deliver(payload, responder).await;
                        }
                    }
                },
            }
        }
    }

    /// Decode an envelope from another node and route it.
    async fn deliver(&mut self, payload: Bytes, responder: Responder) {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(?err, "failed to decode envelope");
                self.metrics.unroutable.inc();
                return;
            }
        };
        if extract_id(&envelope).is_none() {
            warn!(kind = envelope.kind(), "dropping unroutable envelope");
            self.metrics.unroutable.inc();
            return;
        }
        if let Some(request) = envelope.into_request() {
            self.route(request, responder).await;
        }
    }

    async fn route(&mut self, request: Request, responder: Responder) {
        let id = request.id().clone();
        let shard = shard_of(&id, self.shards);
        let owner = owner(shard, self.regions.get());
        if owner != self.index {
            warn!(%id, %shard, owner, "dropping request for shard owned by another region");
            self.metrics.misrouted.inc();
            return;
        }
        trace!(%id, %shard, kind = request.kind(), "routing");
        self.dispatch(id, host::Message { request, responder }).await;
    }

    /// Hand `message` to the host of `id`, starting one if there is none.
    async fn dispatch(&mut self, id: EntityId, message: host::Message) {
        if !self.slots.contains_key(&id) {
            self.activate(id.clone());
        }
        let mailbox = match self.slots.get_mut(&id) {
            Some(Slot::Active { mailbox, .. }) => mailbox,
            Some(Slot::Passivating {
                incarnation,
                buffer,
            }) => {
                trace!(%id, incarnation = *incarnation, "buffering");
                buffer.push(message);
                self.metrics.buffered.inc();
                return;
            }
            None => return,
        };

        // Hosts never block, so waiting for capacity cannot deadlock
        let host::Message { request, responder } = message;
        if mailbox.send(request, responder).await.is_err() {
            // The host task is gone and so is its state
            error!(%id, "host exited unexpectedly, dropping request");
            self.slots.remove(&id);
            self.metrics.hosts.set(self.slots.len() as i64);
        }
    }

    /// Start a new incarnation of the host for `id`.
    fn activate(&mut self, id: EntityId) {
        let incarnation = self.next_incarnation;
        self.next_incarnation += 1;
        let (actor, mailbox) = host::Actor::new(
            self.context.with_label("host"),
            self.host,
            id.clone(),
            incarnation,
            self.signal_sender.clone(),
        );
        actor.start();
        debug!(%id, incarnation, "activated");
        self.slots.insert(
            id,
            Slot::Active {
                incarnation,
                mailbox,
            },
        );
        self.metrics.activations.inc();
        self.metrics.hosts.set(self.slots.len() as i64);
    }

    async fn handle_signal(&mut self, signal: host::Signal) {
        match signal {
            host::Signal::Passivate { id, incarnation } => {
                let Some(slot) = self.slots.get_mut(&id) else {
                    debug!(%id, incarnation, "ignoring passivate for unknown host");
                    return;
                };
                let current = matches!(
                    slot,
                    Slot::Active { incarnation: active, .. } if *active == incarnation
                );
                if !current {
                    debug!(%id, incarnation, "ignoring stale passivate");
                    return;
                }

                // Dropping the mailbox lets the host drain and stop
                *slot = Slot::Passivating {
                    incarnation,
                    buffer: Vec::new(),
                };
                self.metrics.passivations.inc();
                debug!(%id, incarnation, "passivating");
            }
            host::Signal::Stopped {
                id,
                incarnation,
                undelivered,
            } => {
                let buffer = match self.slots.remove(&id) {
                    Some(Slot::Passivating {
                        incarnation: current,
                        buffer,
                    }) if current == incarnation => buffer,
                    Some(slot) => {
                        // Not ours to remove
                        self.slots.insert(id.clone(), slot);
                        if !undelivered.is_empty() {
                            warn!(%id, incarnation, dropped = undelivered.len(), "stale host stopped");
                        }
                        return;
                    }
                    None => {
                        if !undelivered.is_empty() {
                            warn!(%id, incarnation, dropped = undelivered.len(), "unknown host stopped");
                        }
                        return;
                    }
                };
                self.metrics.hosts.set(self.slots.len() as i64);
                debug!(
                    %id,
                    incarnation,
                    undelivered = undelivered.len(),
                    buffered = buffer.len(),
                    "host stopped"
                );

                // Anything the old host saw arrived before anything we buffered
                for message in undelivered.into_iter().chain(buffer) {
                    self.dispatch(id.clone(), message).await;
                }
            }
        }
    }
}
