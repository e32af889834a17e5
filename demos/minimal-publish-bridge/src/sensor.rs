//!
//! A simulated sensor that writes a noisy reading into its channel every
//! period.
//!

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use rand::random;

use publish_bridge::prelude::*;

/// A single reading of a sensor
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    /// The sequence number of the reading
    pub seq: u64,
    /// The measured value
    pub value: f64,
}

/// The channel a sensor writes into
pub type SensorChannel = Arc<BufferedChannel<LocalPublisher<Reading>>>;

/// A sensor sampling at a fixed period
pub struct Sensor {
    channel: SensorChannel,
    period: Duration,
}

impl Sensor {
    /// Create a new sensor
    pub fn new(channel: SensorChannel, period: Duration) -> Self {
        Self { channel, period }
    }

    /// Sample on a new thread until `running` is cleared.
    ///
    /// The thread returns the number of readings it wrote.
    pub fn spawn(self, running: Arc<AtomicBool>) -> JoinHandle<u64> {
        thread::spawn(move || {
            let mut seq = 0;
            while running.load(Ordering::Acquire) {
                self.channel.write(Reading {
                    seq,
                    value: random::<f64>() * 10.0,
                });
                seq += 1;
                thread::sleep(self.period);
            }
            seq
        })
    }
}
