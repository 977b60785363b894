use super::{
    ingress::{Mailbox, Message, Signal},
    state::{Event, Host, Transition},
    Config,
};
use crate::types::EntityId;
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Spawner};
use futures::{channel::mpsc, StreamExt};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Owns a single entity and serializes every request addressed to it.
pub struct Actor<E: Clock + Spawner> {
    context: E,
    host: Host,
    incarnation: u64,
    idle_timeout: Duration,

    mailbox: mpsc::Receiver<Message>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl<E: Clock + Spawner> Actor<E> {
    /// Create a new host for `id`.
    ///
    /// `incarnation` distinguishes this host from earlier hosts of the same entity; it is echoed
    /// in every [Signal] sent on `signals`.
    pub fn new(
        context: E,
        cfg: Config,
        id: EntityId,
        incarnation: u64,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        (
            Self {
                context,
                host: Host::new(id),
                incarnation,
                idle_timeout: cfg.idle_timeout,
                mailbox: receiver,
                signals,
            },
            Mailbox::new(sender),
        )
    }

    pub fn start(self) -> Handle<()> {
        self.context.clone().spawn(|_| self.run())
    }

    async fn run(mut self) {
        info!(id = %self.host.id(), incarnation = self.incarnation, "start");
        let mut deadline = self.context.current() + self.idle_timeout;
        let mut undelivered = Vec::new();
        loop {
            // Once passivated, wait for the region to release the mailbox
            if self.host.is_passivating() {
                let Some(message) = self.mailbox.next().await else {
                    break;
                };
                self.handle(message, &mut undelivered);
                continue;
            }

            select! {
                _ = self.context.sleep_until(deadline) => {
                    if self.host.handle(Event::IdleTimeout) == Transition::Passivate {
                        debug!(id = %self.host.id(), incarnation = self.incarnation, "passivating");
                        let _ = self.signals.unbounded_send(Signal::Passivate {
                            id: self.host.id().clone(),
                            incarnation: self.incarnation,
                        });
                    }
                },
                message = self.mailbox.next() => {
                    let Some(message) = message else {
                        debug!(id = %self.host.id(), "mailbox closed");
                        break;
                    };
                    deadline = self.context.current() + self.idle_timeout;
                    self.handle(message, &mut undelivered);
                },
            }
        }

        info!(
            id = %self.host.id(),
            incarnation = self.incarnation,
            undelivered = undelivered.len(),
            "stop"
        );
        let _ = self.signals.unbounded_send(Signal::Stopped {
            id: self.host.id().clone(),
            incarnation: self.incarnation,
            undelivered,
        });
    }

    fn handle(&mut self, message: Message, undelivered: &mut Vec<Message>) {
        let Message {
            request,
            mut responder,
        } = message;
        trace!(id = %self.host.id(), kind = request.kind(), "handling");
        match self.host.handle(request.into()) {
            Transition::Reply(ack) => {
                // Never wait on the requester; it will time out if the reply is lost
                if let Err(err) = responder.try_send(ack) {
                    warn!(id = %self.host.id(), full = err.is_full(), "failed to send reply");
                }
            }
            Transition::Deferred(request) => {
                undelivered.push(Message { request, responder });
            }
            Transition::Passivate | Transition::Ignored => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        router::Responder,
        types::{Entity, Timestamp},
        wire::{Ack, Action, Command, Query, Request},
    };
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};

    const CONFIG: Config = Config {
        idle_timeout: Duration::from_secs(60),
        mailbox_size: 16,
    };

    fn command(at: u64, value: &str) -> Request {
        Request::Command(Command::new(
            Timestamp::from_nanos(at),
            Entity::new("E1", value),
        ))
    }

    fn query(at: u64) -> Request {
        Request::Query(Query::new(Timestamp::from_nanos(at), "E1".into()))
    }

    #[test_traced]
    fn test_replies_in_order() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let (signals, _signal_receiver) = mpsc::unbounded();
            let (actor, mut mailbox) =
                Actor::new(context.clone(), CONFIG, "E1".into(), 0, signals);
            actor.start();

            let (responder, mut acks): (Responder, _) = mpsc::channel(8);
            mailbox.send(command(1, "a"), responder.clone()).await.unwrap();
            mailbox.send(command(2, "b"), responder.clone()).await.unwrap();
            mailbox.send(query(3), responder).await.unwrap();

            let Some(Ack::Command(first)) = acks.next().await else {
                panic!("expected command ack");
            };
            assert_eq!(first.action, Action::Initialize);
            assert_eq!(first.entity, Entity::new("E1", "a"));
            let Some(Ack::Command(second)) = acks.next().await else {
                panic!("expected command ack");
            };
            assert_eq!(second.action, Action::Update);
            let Some(Ack::Query(read)) = acks.next().await else {
                panic!("expected query ack");
            };
            assert_eq!(read.query_issued_at, Timestamp::from_nanos(3));
            assert_eq!(read.entity, Entity::new("E1", "b"));
        });
    }

    #[test_traced]
    fn test_idle_passivation() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let (signals, mut signal_receiver) = mpsc::unbounded();
            let (actor, mut mailbox) =
                Actor::new(context.clone(), CONFIG, "E1".into(), 7, signals);
            actor.start();

            let (responder, mut acks) = mpsc::channel(8);
            mailbox.send(command(1, "a"), responder.clone()).await.unwrap();
            acks.next().await.unwrap();

            // Activity within the window keeps the host alive
            context.sleep(Duration::from_secs(45)).await;
            mailbox.send(query(2), responder.clone()).await.unwrap();
            acks.next().await.unwrap();
            context.sleep(Duration::from_secs(45)).await;
            assert!(signal_receiver.try_recv().is_err());

            // Idle for the full window
            let start = context.current();
            let Some(Signal::Passivate { id, incarnation }) = signal_receiver.next().await else {
                panic!("expected passivate");
            };
            assert_eq!(id.as_str(), "E1");
            assert_eq!(incarnation, 7);
            assert!(context.current().duration_since(start).unwrap() <= Duration::from_secs(15));

            // Requests received while passivating are returned once the mailbox is released
            mailbox.send(query(3), responder.clone()).await.unwrap();
            mailbox.send(command(4, "b"), responder).await.unwrap();
            drop(mailbox);
            let Some(Signal::Stopped {
                incarnation,
                undelivered,
                ..
            }) = signal_receiver.next().await
            else {
                panic!("expected stopped");
            };
            assert_eq!(incarnation, 7);
            let requests: Vec<_> = undelivered.into_iter().map(|m| m.request).collect();
            assert_eq!(requests, vec![query(3), command(4, "b")]);
            assert!(acks.try_recv().is_err());
        });
    }

    #[test_traced]
    fn test_closed_responder_does_not_block() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let (signals, _signal_receiver) = mpsc::unbounded();
            let (actor, mut mailbox) =
                Actor::new(context.clone(), CONFIG, "E1".into(), 0, signals);
            actor.start();

            // Nobody reads replies from this responder
            let (responder, acks) = mpsc::channel(1);
            drop(acks);
            for i in 0..10 {
                mailbox
                    .send(command(i, &i.to_string()), responder.clone())
                    .await
                    .unwrap();
            }

            // The host is still responsive
            let (responder, mut acks) = mpsc::channel(1);
            mailbox.send(query(100), responder).await.unwrap();
            let Some(Ack::Query(read)) = acks.next().await else {
                panic!("expected query ack");
            };
            assert_eq!(read.entity, Entity::new("E1", "9"));
        });
    }
}
