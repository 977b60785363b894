use crate::{
    router::{check, Responder, Router},
    wire::Request,
    Error,
};
use bytes::Bytes;
use futures::{channel::mpsc, SinkExt};

/// Message types that can be sent to the `Mailbox`
pub enum Message {
    /// Route a decoded request to its entity host.
    Route {
        request: Request,
        responder: Responder,
    },

    /// Decode an encoded envelope received from another node and route it.
    Deliver { payload: Bytes, responder: Responder },
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

    /// Deliver an encoded envelope to the region.
    ///
    /// Envelopes that cannot be decoded or are not addressed to an entity are dropped by the
    /// region.
    pub async fn deliver(&mut self, payload: Bytes, responder: Responder) -> Result<(), Error> {
        self.sender
            .send(Message::Deliver { payload, responder })
            .await
            .map_err(|_| Error::Closed)
    }
}

impl Router for Mailbox {
    async fn route(&mut self, request: Request, responder: Responder) -> Result<(), Error> {
        check(&request)?;
        self.sender
            .send(Message::Route { request, responder })
            .await
            .map_err(|_| Error::Closed)
    }
}
