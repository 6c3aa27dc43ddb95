/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! TCP transport. Each frame is an 8-byte big-endian length followed by a
//! bincode-encoded [`Frame`]. A dialing process first writes its world rank
//! as an 8-byte big-endian hello so the acceptor can place the link.
//!
//! The writer task owns the socket's send side and is the per-link
//! message-assembly critical section: frames posted on the returned [`Tx`]
//! are serialized and written whole, in post order.

use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

use super::ChannelError;
use super::Frame;
use super::Rx;
use super::Tx;
use crate::config::NetConfig;

/// Connect to `addr`, retrying per `config`, and announce `hello` (the
/// dialer's world rank). The returned `Tx` stays usable until the link
/// dies; failures past the handshake surface on the receiving side as a
/// closed channel.
pub async fn dial(addr: SocketAddr, hello: u64, config: &NetConfig) -> Result<Tx, ChannelError> {
    let mut attempts = 0;
    let mut stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(err) => {
                attempts += 1;
                if attempts >= config.connect_attempts {
                    return Err(ChannelError::Connect {
                        addr,
                        attempts,
                        source: err,
                    });
                }
                tracing::debug!(%addr, attempts, "dial failed; backing off");
                tokio::time::sleep(config.connect_backoff).await;
            }
        }
    };
    let _ = stream.set_nodelay(true);
    stream.write_u64(hello).await?;
    tracing::debug!(%addr, hello, "dialed");

    let (tx, mut outbound) = super::pair();
    tokio::spawn(async move {
        while let Ok(frame) = outbound.recv().await {
            let body = match bincode::serialize(&frame) {
                Ok(body) => body,
                Err(err) => {
                    tracing::error!(%addr, %err, "frame failed to encode; dropping link");
                    break;
                }
            };
            if let Err(err) = write_frame(&mut stream, &body).await {
                tracing::debug!(%addr, %err, "write failed; dropping link");
                break;
            }
        }
    });
    Ok(tx)
}

/// A bound listener handing out inbound links.
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    max_frame_length: usize,
}

/// Bind `addr` and return the bound address (useful with port 0) plus the
/// listener.
pub async fn serve(addr: SocketAddr, config: &NetConfig) -> Result<(SocketAddr, Listener), ChannelError> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::debug!(%local_addr, "serving");
    Ok((
        local_addr,
        Listener {
            listener,
            max_frame_length: config.max_frame_length,
        },
    ))
}

impl Listener {
    /// Accept one inbound link: returns the dialer's announced world rank
    /// and the receiving endpoint. A reader task pumps decoded frames into
    /// the endpoint until the socket closes or a frame is oversized or
    /// undecodable.
    pub async fn accept(&mut self) -> Result<(u64, Rx), ChannelError> {
        let (mut stream, peer_addr) = self.listener.accept().await?;
        let hello = stream.read_u64().await?;
        tracing::debug!(%peer_addr, hello, "accepted");

        let (tx, rx) = super::pair();
        let limit = self.max_frame_length;
        tokio::spawn(async move {
            loop {
                let body = match read_frame(&mut stream, limit).await {
                    Ok(Some(body)) => body,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(%peer_addr, %err, "read failed; dropping link");
                        break;
                    }
                };
                match bincode::deserialize::<Frame>(&body) {
                    Ok(frame) => {
                        if tx.post(frame).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(%peer_addr, %err, "undecodable frame; dropping link");
                        break;
                    }
                }
            }
        });
        Ok((hello, rx))
    }
}

async fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<(), ChannelError> {
    stream.write_u64(body.len() as u64).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame(stream: &mut TcpStream, limit: usize) -> Result<Option<Vec<u8>>, ChannelError> {
    let len = match stream.read_u64().await {
        Ok(len) => len,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > limit as u64 {
        return Err(ChannelError::FrameTooLarge {
            got: len,
            limit: limit as u64,
        });
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::datatype::BaseType;
    use crate::envelope::Envelope;

    fn frame(tag: i32, payload: &'static [u8]) -> Frame {
        Frame {
            envelope: Envelope {
                tag,
                context_id: 0,
                buffered: false,
                base: BaseType::Byte,
                count: payload.len(),
            },
            payload: Bytes::from_static(payload),
        }
    }

    #[tokio::test]
    async fn dial_serve_round_trip() {
        let config = NetConfig::default();
        let (addr, mut listener) = serve("127.0.0.1:0".parse().unwrap(), &config)
            .await
            .unwrap();

        let tx = dial(addr, 3, &config).await.unwrap();
        let (hello, mut rx) = listener.accept().await.unwrap();
        assert_eq!(hello, 3);

        tx.post(frame(1, b"abc")).unwrap();
        tx.post(frame(2, b"")).unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.envelope.tag, 1);
        assert_eq!(&got.payload[..], b"abc");
        let got = rx.recv().await.unwrap();
        assert_eq!(got.envelope.tag, 2);
        assert!(got.payload.is_empty());
    }

    #[tokio::test]
    async fn closed_socket_closes_rx() {
        let config = NetConfig::default();
        let (addr, mut listener) = serve("127.0.0.1:0".parse().unwrap(), &config)
            .await
            .unwrap();
        let tx = dial(addr, 0, &config).await.unwrap();
        let (_, mut rx) = listener.accept().await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn dial_gives_up_after_retry_budget() {
        let config = NetConfig {
            connect_attempts: 2,
            connect_backoff: std::time::Duration::from_millis(5),
            ..NetConfig::default()
        };
        // Bind then drop to get an address nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(matches!(
            dial(addr, 0, &config).await,
            Err(ChannelError::Connect { .. })
        ));
    }
}
