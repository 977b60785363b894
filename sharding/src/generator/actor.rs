use super::{
    metrics,
    state::{Flight, Receipt, Tick},
    workload::Workload,
    Config,
};
use crate::{
    router::{Responder, Router},
    types::Timestamp,
    wire::Ack,
    Error,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::{channel::mpsc, StreamExt};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Periodically issues requests through a [Router], keeping at most one in flight.
pub struct Actor<E: Clock + Rng + Spawner + Metrics, R: Router, W: Workload> {
    context: E,
    name: String,
    tick_interval: Duration,

    router: R,
    workload: W,
    flight: Flight,

    responder: Responder,
    acks: mpsc::Receiver<Ack>,

    metrics: metrics::Metrics,
}

impl<E: Clock + Rng + Spawner + Metrics, R: Router, W: Workload> Actor<E, R, W> {
    pub fn new(context: E, cfg: Config, router: R, workload: W) -> Self {
        let (responder, acks) = mpsc::channel(cfg.mailbox_size);
        let metrics = metrics::Metrics::init(context.clone());
        Self {
            context,
            name: cfg.name,
            tick_interval: cfg.tick_interval,
            router,
            workload,
            flight: Flight::new(),
            responder,
            acks,
            metrics,
        }
    }

    /// Start ticking. Aborting the returned handle stops the generator; nothing in flight is
    /// awaited.
    pub fn start(self) -> Handle<()> {
        self.context.clone().spawn(|_| self.run())
    }

    async fn run(mut self) {
        info!(name = %self.name, kind = self.workload.kind(), "start");

        // Ticks are scheduled at a fixed rate, starting immediately
        let mut next_tick = self.context.current();
        loop {
            select! {
                _ = self.context.sleep_until(next_tick) => {
                    next_tick += self.tick_interval;
                    if let Err(err) = self.tick().await {
                        warn!(name = %self.name, ?err, "router closed");
                        break;
                    }
                },
                ack = self.acks.next() => {
                    // We hold a sender, so the stream never ends
                    let Some(ack) = ack else {
                        break;
                    };
                    self.handle_ack(ack);
                },
            }
        }
        info!(name = %self.name, "stop");
    }

    async fn tick(&mut self) -> Result<(), Error> {
        let now = Timestamp::from(self.context.current());
        let workload = &mut self.workload;
        let rng = &mut self.context;
        match self.flight.tick(|| workload.next(rng, now)) {
            Tick::Issued(request) => {
                debug!(name = %self.name, id = %request.id(), issued_at = %now, "sending");
                match self.router.route(request, self.responder.clone()).await {
                    Ok(()) => {
                        self.metrics.sent.inc();
                    }
                    Err(Error::Closed) => return Err(Error::Closed),
                    // Left outstanding, so it times out on the next tick
                    Err(err) => warn!(name = %self.name, ?err, "failed to route"),
                }
            }
            Tick::TimedOut(outstanding) => {
                warn!(
                    name = %self.name,
                    id = %outstanding.target,
                    issued_at = %outstanding.issued_at,
                    "No response"
                );
                self.metrics.timeouts.inc();
            }
        }
        Ok(())
    }

    fn handle_ack(&mut self, ack: Ack) {
        if !self.workload.accepts(&ack) {
            warn!(name = %self.name, ?ack, "unexpected ack");
            self.metrics.rejected.inc();
            return;
        }
        let now = Timestamp::from(self.context.current());
        match self.flight.ack(ack.issued_at(), now) {
            Receipt::Completed { latency, .. } => {
                info!(name = %self.name, ?ack, ?latency, "Received");
                self.metrics.completed.inc();
                self.metrics.latency.observe(latency.as_secs_f64());
            }
            Receipt::Late => {
                warn!(name = %self.name, ?ack, "Received (late)");
                self.metrics.late.inc();
            }
        }
    }
}
