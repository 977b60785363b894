//! Route requests to the entity hosts of a node.
//!
//! # Overview
//!
//! A region is the hosting layer of a single node. It keeps a mapping from [EntityId] to the one
//! live [host::Actor] responsible for it:
//! - The first request for an identifier starts a host.
//! - Later requests go to the same host until it passivates.
//! - Requests that arrive while a host is passivating are buffered. Once the host has stopped,
//!   they are delivered (after anything the host had received but not applied) to a new
//!   incarnation.
//!
//! The [Mailbox] implements [crate::router::Router]. It also accepts encoded envelopes from other
//! nodes with [Mailbox::deliver]. Envelopes that are malformed or not addressed to an entity are
//! dropped and counted. So are requests for shards allocated to another region, whichever way
//! they arrive.
//!
//! [EntityId]: crate::types::EntityId
//! [host::Actor]: crate::host::Actor

use std::{
    num::{NonZeroU32, NonZeroUsize},
    time::Duration,
};

mod actor;
pub use actor::Actor;
mod ingress;
pub use ingress::{Mailbox, Message};
mod metrics;

/// Configuration for the [Actor].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of shards identifiers are partitioned into.
    pub shards: NonZeroU32,

    /// Index of this region among all regions. Only shards `s` with `s % regions == index` are
    /// hosted here.
    pub index: usize,

    /// Total number of regions the shards are allocated to.
    pub regions: NonZeroUsize,

    /// How long a host may go without a command or query before it passivates.
    pub idle_timeout: Duration,

    /// The maximum size of the region and host mailbox backlogs.
    pub mailbox_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        router::{Directory, Responder, Router},
        types::{Entity, EntityId, Timestamp, MAX_VALUE_LENGTH},
        wire::{
            Ack, Action, Command, CommandAck, Envelope, Query, QueryAck, QueryAckNotFound,
            Request,
        },
        Error,
    };
    use commonware_codec::Encode;
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Clock, Metrics, Runner};
    use futures::{channel::mpsc, StreamExt};

    const SHARDS: NonZeroU32 = match NonZeroU32::new(100) {
        Some(shards) => shards,
        None => unreachable!(),
    };

    const ONE: NonZeroUsize = match NonZeroUsize::new(1) {
        Some(regions) => regions,
        None => unreachable!(),
    };

    const THREE: NonZeroUsize = match NonZeroUsize::new(3) {
        Some(regions) => regions,
        None => unreachable!(),
    };

    const CONFIG: Config = Config {
        shards: SHARDS,
        index: 0,
        regions: ONE,
        idle_timeout: Duration::from_secs(60),
        mailbox_size: 16,
    };

    /// Issues requests through a router and reads back acks.
    struct Client<R: Router> {
        router: R,
        responder: Responder,
        acks: mpsc::Receiver<Ack>,
    }

    impl<R: Router> Client<R> {
        fn new(router: R) -> Self {
            let (responder, acks) = mpsc::channel(64);
            Self {
                router,
                responder,
                acks,
            }
        }

        async fn send_command(&mut self, at: u64, id: &str, value: &str) {
            let command = Command::new(Timestamp::from_nanos(at), Entity::new(id, value));
            self.router
                .route(Request::Command(command), self.responder.clone())
                .await
                .unwrap();
        }

        async fn send_query(&mut self, at: u64, id: &str) {
            let query = Query::new(Timestamp::from_nanos(at), id.into());
            self.router
                .route(Request::Query(query), self.responder.clone())
                .await
                .unwrap();
        }

        async fn command(&mut self, at: u64, id: &str, value: &str) -> Ack {
            self.send_command(at, id, value).await;
            self.acks.next().await.unwrap()
        }

        async fn query(&mut self, at: u64, id: &str) -> Ack {
            self.send_query(at, id).await;
            self.acks.next().await.unwrap()
        }
    }

    fn start_region(context: &deterministic::Context, label: &str) -> Mailbox {
        let (region, mailbox) = Actor::new(context.with_label(label), CONFIG);
        region.start();
        mailbox
    }

    /// Start the regions of `THREE` nodes, indexed by node.
    fn start_nodes(context: &deterministic::Context) -> Vec<Mailbox> {
        (0..THREE.get())
            .map(|index| {
                let cfg = Config {
                    index,
                    regions: THREE,
                    ..CONFIG
                };
                let (region, mailbox) =
                    Actor::new(context.with_label(&format!("node_{index}")), cfg);
                region.start();
                mailbox
            })
            .collect()
    }

    #[test_traced]
    fn test_create_update_read() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let mut client = Client::new(start_region(&context, "region"));

            assert_eq!(
                client.command(1, "E1", "a").await,
                Ack::Command(CommandAck {
                    command_issued_at: Timestamp::from_nanos(1),
                    action: Action::Initialize,
                    entity: Entity::new("E1", "a"),
                })
            );
            assert_eq!(
                client.command(2, "E1", "b").await,
                Ack::Command(CommandAck {
                    command_issued_at: Timestamp::from_nanos(2),
                    action: Action::Update,
                    entity: Entity::new("E1", "b"),
                })
            );
            assert_eq!(
                client.query(3, "E1").await,
                Ack::Query(QueryAck {
                    query_issued_at: Timestamp::from_nanos(3),
                    entity: Entity::new("E1", "b"),
                })
            );
            assert_eq!(
                client.query(4, "E2").await,
                Ack::NotFound(QueryAckNotFound {
                    query_issued_at: Timestamp::from_nanos(4),
                    id: EntityId::new("E2"),
                })
            );
        });
    }

    #[test_traced]
    fn test_passivation_discards_state() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let mut client = Client::new(start_region(&context, "region"));
            client.command(1, "E1", "a").await;

            // Idle for longer than the timeout
            context.sleep(Duration::from_secs(61)).await;
            assert!(matches!(
                client.query(2, "E1").await,
                Ack::NotFound(QueryAckNotFound { id, .. }) if id.as_str() == "E1"
            ));
            let Ack::Command(ack) = client.command(3, "E1", "c").await else {
                panic!("expected command ack");
            };
            assert_eq!(ack.action, Action::Initialize);

            let metrics = context.encode();
            assert!(metrics.contains("activations_total 2"), "{metrics}");
            assert!(metrics.contains("passivations_total 1"), "{metrics}");
        });
    }

    #[test_traced]
    fn test_requests_racing_passivation() {
        // Every interleaving of requests and passivation must answer every request, in order
        for seed in 0..25 {
            let executor = deterministic::Runner::seeded(seed);
            executor.start(|context| async move {
                let mut client = Client::new(start_region(&context, "region"));
                client.command(1, "E1", "a").await;

                context.sleep(Duration::from_secs(60)).await;
                client.send_query(2, "E1").await;
                client.send_query(3, "E1").await;
                client.send_command(4, "E1", "b").await;
                client.send_query(5, "E1").await;

                let mut issued = Vec::new();
                for _ in 0..4 {
                    issued.push(client.acks.next().await.unwrap());
                }
                let order: Vec<_> = issued.iter().map(|ack| ack.issued_at().as_nanos()).collect();
                assert_eq!(order, vec![2, 3, 4, 5]);
                assert_eq!(
                    issued[3],
                    Ack::Query(QueryAck {
                        query_issued_at: Timestamp::from_nanos(5),
                        entity: Entity::new("E1", "b"),
                    })
                );
            });
        }
    }

    #[test_traced]
    fn test_unroutable_dropped() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let mut region = start_region(&context, "region");
            let (responder, mut acks) = mpsc::channel(8);

            // An ack is not addressed to an entity
            let ack = Envelope::Ack(Ack::NotFound(QueryAckNotFound {
                query_issued_at: Timestamp::from_nanos(1),
                id: "E1".into(),
            }));
            region
                .deliver(ack.encode().into(), responder.clone())
                .await
                .unwrap();

            // Garbage is dropped too
            region
                .deliver(vec![9, 9, 9].into(), responder.clone())
                .await
                .unwrap();

            // The region keeps serving
            let query = Envelope::Query(Query::new(Timestamp::from_nanos(2), "E1".into()));
            region
                .deliver(query.encode().into(), responder)
                .await
                .unwrap();
            let Some(Ack::NotFound(ack)) = acks.next().await else {
                panic!("expected not found");
            };
            assert_eq!(ack.query_issued_at, Timestamp::from_nanos(2));
            assert!(acks.try_recv().is_err());

            let metrics = context.encode();
            assert!(metrics.contains("unroutable_total 2"), "{metrics}");
            assert!(metrics.contains("activations_total 1"), "{metrics}");
        });
    }

    #[test_traced]
    fn test_directory_single_owner() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let directory = Directory::new(SHARDS, start_nodes(&context)).unwrap();

            // Interleave many issuers sharing the same directory
            let mut first = Client::new(directory.clone());
            let mut second = Client::new(directory);
            for i in 1..=20 {
                let id = i.to_string();
                let Ack::Command(ack) = first.command(i, &id, "a").await else {
                    panic!("expected command ack");
                };
                assert_eq!(ack.action, Action::Initialize);
                let Ack::Command(ack) = second.command(i, &id, "b").await else {
                    panic!("expected command ack");
                };
                assert_eq!(ack.action, Action::Update);
            }
            for i in 1..=20 {
                let id = i.to_string();
                let Ack::Query(ack) = first.query(i, &id).await else {
                    panic!("expected query ack");
                };
                assert_eq!(ack.entity, Entity::new(id.as_str(), "b"));
            }

            let metrics = context.encode();
            assert!(metrics.contains("misrouted_total 0"), "{metrics}");
        });
    }

    #[test_traced]
    fn test_foreign_shard_dropped() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            // "E1" is on shard 79 (region 1) and "E2" on shard 90 (region 0)
            let mut regions = start_nodes(&context);
            let mut client = Client::new(regions[1].clone());
            client.send_query(1, "E2").await;

            let query = Envelope::Query(Query::new(Timestamp::from_nanos(2), "E2".into()));
            regions[1]
                .deliver(query.encode().into(), client.responder.clone())
                .await
                .unwrap();

            // Owned identifiers are still served
            let Ack::NotFound(ack) = client.query(3, "E1").await else {
                panic!("expected not found");
            };
            assert_eq!(ack.query_issued_at, Timestamp::from_nanos(3));
            assert!(client.acks.try_recv().is_err());

            let metrics = context.encode();
            assert!(metrics.contains("node_1_misrouted_total 2"), "{metrics}");
            assert!(metrics.contains("node_1_activations_total 1"), "{metrics}");
            assert!(metrics.contains("node_0_activations_total 0"), "{metrics}");
        });
    }

    #[test_traced]
    fn test_oversized_request_rejected() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let regions = start_nodes(&context);
            let directory = Directory::new(SHARDS, regions.clone()).unwrap();
            let oversized = "v".repeat(MAX_VALUE_LENGTH + 1);

            // Rejected before forwarding, both locally and across nodes
            let mut local = Client::new(regions[1].clone());
            let entity = Entity::new("E1", oversized.as_str());
            let command = Command::new(Timestamp::from_nanos(1), entity);
            assert!(matches!(
                local
                    .router
                    .route(Request::Command(command.clone()), local.responder.clone())
                    .await,
                Err(Error::TooLarge)
            ));
            let mut remote = Client::new(directory);
            assert!(matches!(
                remote
                    .router
                    .route(Request::Command(command), remote.responder.clone())
                    .await,
                Err(Error::TooLarge)
            ));

            // The limit itself is accepted on both paths
            let value = "v".repeat(MAX_VALUE_LENGTH);
            let Ack::Command(ack) = local.command(2, "E1", &value).await else {
                panic!("expected command ack");
            };
            assert_eq!(ack.action, Action::Initialize);
            let Ack::Command(ack) = remote.command(3, "E1", &value).await else {
                panic!("expected command ack");
            };
            assert_eq!(ack.action, Action::Update);
            assert!(local.acks.try_recv().is_err());
            assert!(remote.acks.try_recv().is_err());

            let metrics = context.encode();
            assert!(metrics.contains("node_1_unroutable_total 0"), "{metrics}");
            assert!(metrics.contains("node_1_activations_total 1"), "{metrics}");
        });
    }

    #[test]
    fn test_directory_requires_region() {
        assert!(matches!(
            Directory::new(SHARDS, Vec::new()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
