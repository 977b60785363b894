use crate::{router::Responder, types::EntityId, wire::Request, Error};
use futures::{channel::mpsc, SinkExt};

/// A request waiting to be handled by a host, paired with where to send the reply.
pub struct Message {
    pub request: Request,
    pub responder: Responder,
}

/// Notification from a host to the region that spawned it.
pub enum Signal {
    /// The host went idle and discarded its state.
    ///
    /// The region should stop routing to this incarnation and drop its mailbox.
    Passivate { id: EntityId, incarnation: u64 },

    /// The host has exited.
    ///
    /// `undelivered` holds every request the host received after passivating, in arrival order.
    Stopped {
        id: EntityId,
        incarnation: u64,
        undelivered: Vec<Message>,
    },
}

/// Ingress mailbox for [Actor](super::Actor).
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Enqueue `request` for the host, waiting for capacity if the mailbox is full.
    ///
    /// Returns [Error::Closed] if the host has exited.
    pub async fn send(&mut self, request: Request, responder: Responder) -> Result<(), Error> {
        self.sender
            .send(Message { request, responder })
            .await
            .map_err(|_| Error::Closed)
    }
}
