//!
//! This example shows a handful of simulated sensors, each on its own
//! thread, writing readings into buffered channels that are all published by
//! the one process wide publish coordinator.
//!
//! Run with `RUST_LOG=debug` to see the coordinator being created and torn
//! down.
//!

#![deny(missing_docs)]

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam::channel::unbounded;
use tracing::info;
use tracing_subscriber::EnvFilter;

use publish_bridge::prelude::*;

pub mod sensor;
use sensor::{Reading, Sensor};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (tx, rx) = unbounded();
    ctrlc::set_handler(move || tx.send(true).expect("Could not send interrupt"))
        .expect("Error setting Ctrl-C handler");

    let coordinator = PublishCoordinator::instance().expect("Could not start the publish coordinator");

    let mut subscribers = Vec::new();
    let mut channels = Vec::new();
    for (name, policy) in [
        ("imu", BufferPolicy::Bounded(64)),
        ("odometry", BufferPolicy::Latest),
        ("battery", BufferPolicy::Latest),
    ] {
        let publisher = LocalPublisher::<Reading>::new();
        subscribers.push((name, publisher.subscribe()));
        channels.push(BufferedChannel::new(name, publisher, policy, coordinator.clone()));
    }
    // The channels keep the coordinator alive from here on
    drop(coordinator);

    let running = Arc::new(AtomicBool::new(true));
    let sensors: Vec<_> = channels
        .iter()
        .zip([Duration::from_millis(2), Duration::from_millis(20), Duration::from_millis(500)])
        .map(|(channel, period)| Sensor::new(channel.clone(), period).spawn(running.clone()))
        .collect();

    while rx.recv_timeout(Duration::from_millis(500)).is_err() {
        for (name, subscriber) in subscribers.iter_mut() {
            let received = subscriber.drain();
            if let Some(latest) = received.last() {
                info!(topic = %name, received = received.len(), seq = latest.seq, value = latest.value, "received");
            }
        }
    }

    running.store(false, Ordering::Release);
    for sensor in sensors {
        let written = sensor.join().expect("Sensor thread panicked");
        info!(written, "sensor stopped");
    }

    for channel in channels.iter() {
        info!(topic = channel.name(), dropped = channel.dropped(), "channel closed");
    }
    if let Some(coordinator) = channels.first().map(|channel| channel.coordinator().clone()) {
        let stats = coordinator.stats();
        info!(passes = stats.passes, published = stats.published, "publish coordinator stats");
    }
}
