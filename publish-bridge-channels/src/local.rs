//!
//! Local Publishers and Subscribers
//!
//! An in-process sink for buffered channels.  The local publisher fans data
//! out over crossbeam channels to every subscriber it has handed out.
//!

use std::{
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crossbeam::channel::{self, Receiver, Sender};

use publish_bridge_core::{Publisher, Subscriber};

/// Local Subscriber that receives data from a local publisher
pub struct LocalSubscriber<Data: Clone> {
    /// The receiver end of a crossbeam channel
    rx: Receiver<Data>,
    /// The current data stored in the local subscriber
    data: Option<Data>,
}

impl<Data: Clone> LocalSubscriber<Data> {
    /// Take every piece of data received since the last call, oldest first.
    ///
    /// Note: the most recent piece of data is also kept as the subscriber's
    /// current data.
    pub fn drain(&mut self) -> Vec<Data> {
        let received: Vec<Data> = self.rx.try_iter().collect();
        if let Some(data) = received.last() {
            self.data = Some(data.clone());
        }
        received
    }
}

impl<Data: Clone> Subscriber for LocalSubscriber<Data> {
    type Target = Option<Data>;

    fn get(&mut self) -> &Self::Target {
        if let Some(data) = self.rx.try_iter().last() {
            self.data = Some(data);
        }

        &self.data
    }
}

/// Local Publisher that sends every piece of data to each of its subscribers
pub struct LocalPublisher<Data: Clone> {
    /// The transmit pipes that are used to send data to the subscribers
    txs: Arc<Mutex<Vec<Sender<Data>>>>,
    /// The most recent data sent so new subscribers start with it
    data: Arc<Mutex<Option<Data>>>,
}

impl<Data: Clone> LocalPublisher<Data> {
    /// Create a new local publisher
    pub fn new() -> Self {
        Self {
            txs: Arc::new(Mutex::new(Vec::new())),
            data: Arc::new(Mutex::new(None)),
        }
    }

    fn txs(&self) -> MutexGuard<'_, Vec<Sender<Data>>> {
        self.txs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a local subscriber
    pub fn subscribe(&self) -> LocalSubscriber<Data> {
        let (tx, rx) = channel::unbounded();
        self.txs().push(tx);

        let data = self
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        LocalSubscriber { rx, data }
    }

    /// The number of subscribers that were still listening at the last publish
    pub fn subscribers(&self) -> usize {
        self.txs().len()
    }
}

impl<Data: Clone> Default for LocalPublisher<Data> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Data: Clone> Clone for LocalPublisher<Data> {
    fn clone(&self) -> Self {
        Self {
            txs: self.txs.clone(),
            data: self.data.clone(),
        }
    }
}

impl<Data: Clone> Publisher for LocalPublisher<Data> {
    type Data = Data;
    type Error = Infallible;

    fn publish(&mut self, data: Self::Data) -> Result<(), Self::Error> {
        // Subscribers that were dropped are forgotten
        self.txs().retain(|tx| tx.send(data.clone()).is_ok());
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }
}
