//! Run a sharded entity registry with several in-process nodes.
//!
//! Each node hosts a region (owning the shards allocated to it) and a pair of generators, one
//! issuing commands and one issuing queries, that route through a directory spanning all nodes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release -- --config sharding.yaml --nodes 3
//! ```

use clap::{value_parser, Arg, Command};
use commonware_runtime::{tokio, Metrics, Runner};
use commonware_sharding::{
    config::Config,
    generator::{
        self,
        workload::{Commands, Queries},
    },
    region,
    router::Directory,
};
use tracing::{error, info, warn};

fn main() {
    // Parse arguments
    let matches = Command::new("commonware-sharding")
        .about("route commands and queries to lazily created, self-passivating entities")
        .arg(
            Arg::new("config")
                .long("config")
                .required(false)
                .help("Path to a YAML configuration file"),
        )
        .arg(
            Arg::new("nodes")
                .long("nodes")
                .required(false)
                .value_parser(value_parser!(usize))
                .help("Number of in-process nodes (overrides the configuration file)"),
        )
        .get_matches();

    // Load config
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(path).expect("Could not load config file"),
        None => Config::default(),
    };
    if let Some(nodes) = matches.get_one::<usize>("nodes") {
        config.nodes = *nodes;
    }
    config.validate().expect("Invalid config");

    // Create logger
    let level = config.log_level().expect("Invalid log level");
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_line_number(true)
            .with_file(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(level).init();
    }
    info!(
        nodes = config.nodes,
        shards = config.shards,
        entities = config.entities,
        "loaded config"
    );

    // Start runtime
    let executor = tokio::Runner::default();
    executor.start(|context| async move {
        let shards = config.shards().expect("Invalid shard count");
        let entities = config.entities().expect("Invalid entity count");

        // Start a region on every node
        let mut regions = Vec::with_capacity(config.nodes);
        for i in 0..config.nodes {
            let region_cfg = config.region(i).expect("Invalid region config");
            let (region, mailbox) =
                region::Actor::new(context.with_label(&format!("node_{i}")), region_cfg);
            region.start();
            regions.push(mailbox);
        }
        let directory =
            Directory::new(shards, regions).expect("Could not create directory");

        // Start generators on every node
        let mut generators = Vec::with_capacity(config.nodes * 2);
        for i in 0..config.nodes {
            let node = context.with_label(&format!("node_{i}"));
            let name = format!("node_{i}_entityCommand");
            let commands = generator::Actor::new(
                node.with_label("commands"),
                config.generator(name.clone()),
                directory.clone(),
                Commands::new(name, entities),
            );
            generators.push(commands.start());
            let queries = generator::Actor::new(
                node.with_label("queries"),
                config.generator(format!("node_{i}_entityQuery")),
                directory.clone(),
                Queries::new(entities),
            );
            generators.push(queries.start());
            info!(node = i, "node started");
        }

        // Run until interrupted
        if let Err(err) = ::tokio::signal::ctrl_c().await {
            error!(?err, "failed to listen for shutdown signal");
        }
        warn!("coordinated shutdown");
        for generator in generators {
            generator.abort();
        }
    });
}
