//! Mock implementations for testing.

use crate::{
    host::state::{Host, Transition},
    router::{self, Responder},
    wire::Request,
    Error,
};
use futures::channel::mpsc;

/// A [router::Router] that records every request it is asked to route.
///
/// If `reply` is set, each request is answered right away as if it were the first request ever
/// seen for its entity. Dropping the receiver closes the router.
#[derive(Clone)]
pub struct Router {
    requests: mpsc::UnboundedSender<(Request, Responder)>,
    reply: bool,
}

impl Router {
    pub fn new(reply: bool) -> (Self, mpsc::UnboundedReceiver<(Request, Responder)>) {
        let (requests, receiver) = mpsc::unbounded();
        (Self { requests, reply }, receiver)
    }
}

impl router::Router for Router {
    async fn route(&mut self, request: Request, mut responder: Responder) -> Result<(), Error> {
        router::check(&request)?;
        if self.reply {
            let mut host = Host::new(request.id().clone());
            if let Transition::Reply(ack) = host.handle(request.clone().into()) {
                let _ = responder.try_send(ack);
            }
        }
        self.requests
            .unbounded_send((request, responder))
            .map_err(|_| Error::Closed)
    }
}
