/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! One-way, ordered, reliable frame channels between processes.
//!
//! Both transports converge on mpsc-backed [`Tx`]/[`Rx`] endpoints: the
//! local transport wires sender to receiver directly, while the TCP
//! transport pumps frames through reader/writer tasks. Either way, a frame
//! posted on a `Tx` arrives on the paired `Rx` exactly once, in order, or
//! the link is dead.

pub mod local;
pub mod net;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::envelope::Envelope;

/// One message on the wire: matching metadata plus the payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Matching metadata.
    pub envelope: Envelope,
    /// Packed payload.
    pub payload: Bytes,
}

/// Transport-level failures.
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    /// The other end of the link is gone.
    #[error("channel closed")]
    Closed,

    /// An underlying socket failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A frame failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] Box<bincode::ErrorKind>),

    /// An inbound frame announced a length over the configured limit.
    #[error("frame of {got} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Announced length.
        got: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Could not establish a connection within the retry budget.
    #[error("could not connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        /// Peer address.
        addr: std::net::SocketAddr,
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        #[source]
        source: std::io::Error,
    },
}

/// The sending end of a link. Cheap to clone; posting never blocks.
#[derive(Debug, Clone)]
pub struct Tx {
    sender: mpsc::UnboundedSender<Frame>,
}

impl Tx {
    /// Enqueue a frame for delivery. Fails only when the link is dead.
    pub fn post(&self, frame: Frame) -> Result<(), ChannelError> {
        self.sender.send(frame).map_err(|_| ChannelError::Closed)
    }
}

/// The receiving end of a link.
#[derive(Debug)]
pub struct Rx {
    receiver: mpsc::UnboundedReceiver<Frame>,
}

impl Rx {
    /// Wait for the next frame.
    pub async fn recv(&mut self) -> Result<Frame, ChannelError> {
        self.receiver.recv().await.ok_or(ChannelError::Closed)
    }

    /// Take the next frame if one has already arrived.
    pub fn poll(&mut self) -> Result<Option<Frame>, ChannelError> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }
}

/// A fresh unbounded endpoint pair.
pub(crate) fn pair() -> (Tx, Rx) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Tx { sender }, Rx { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::BaseType;

    fn frame(tag: i32) -> Frame {
        Frame {
            envelope: Envelope {
                tag,
                context_id: 0,
                buffered: false,
                base: BaseType::Byte,
                count: 2,
            },
            payload: Bytes::from_static(b"hi"),
        }
    }

    #[tokio::test]
    async fn post_then_recv_in_order() {
        let (tx, mut rx) = pair();
        tx.post(frame(1)).unwrap();
        tx.post(frame(2)).unwrap();
        assert_eq!(rx.recv().await.unwrap().envelope.tag, 1);
        assert_eq!(rx.recv().await.unwrap().envelope.tag, 2);
        assert!(rx.poll().unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_tx_closes_rx() {
        let (tx, mut rx) = pair();
        drop(tx);
        assert!(matches!(rx.recv().await, Err(ChannelError::Closed)));
    }
}
