//! Typed channel for in-process trip egress
//!
//! Hands generated requests to another task over a bounded mpsc channel.
//! Never blocks: a full or closed channel is reported as an emission failure
//! rather than waited on.

use crate::domain::trip::TripRequest;
use crate::io::sink::{EmissionError, EmissionFailure, TripSink};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Sender side of the trip channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TripRequest>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TripRequest>) -> Self {
        Self { tx }
    }
}

impl TripSink for ChannelSink {
    fn emit(&mut self, request: TripRequest) -> Result<(), EmissionError> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(request) => EmissionError::new(&request, EmissionFailure::ChannelFull),
            TrySendError::Closed(request) => {
                EmissionError::new(&request, EmissionFailure::ChannelClosed)
            }
        })
    }
}

/// Create a new trip channel pair
///
/// Buffer size determines how many requests can be queued before emission
/// fails.
pub fn create_trip_channel(buffer_size: usize) -> (ChannelSink, mpsc::Receiver<TripRequest>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (ChannelSink::new(tx), rx)
}
