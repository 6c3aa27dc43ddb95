/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The per-process context: the peer table (one link and one locked inbox
//! per world member, self included), the context-id high-water counter, and
//! the attached buffer for buffered-mode sends. `Proc` is a cheap-clone
//! handle; all state lives behind one `Arc`.

use std::sync::Arc;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::sync::Notify;

use crate::buffer;
use crate::channel::Rx;
use crate::channel::Tx;
use crate::channel::local;
use crate::channel::net;
use crate::comm::Communicator;
use crate::config::Config;
use crate::datatype::Element;
use crate::envelope::Envelope;
use crate::envelope::EnvelopeQueue;
use crate::error::Error;
use crate::error::Result;
use crate::group::Group;
use crate::group::ProcessId;

/// A peer's inbox: the transport endpoint plus the queue of messages that
/// arrived before anyone asked for them. Receives lock the whole inbox, so
/// queue scan and transport read are one atomic step with respect to other
/// receivers.
#[derive(Debug)]
pub(crate) struct Inbox {
    rx: Rx,
    queue: EnvelopeQueue,
}

impl Inbox {
    /// Remove the oldest queued message matching `(context_id, tag)`.
    pub(crate) fn take_match(&mut self, context_id: i32, tag: i32) -> Option<(Envelope, Bytes)> {
        self.queue.take_match(context_id, tag)
    }

    /// Peek the oldest queued match.
    pub(crate) fn probe_match(&self, context_id: i32, tag: i32) -> Option<&Envelope> {
        self.queue.probe_match(context_id, tag)
    }

    /// Queue a message no pending receive wanted.
    pub(crate) fn push(&mut self, envelope: Envelope, payload: Bytes) {
        self.queue.push(envelope, payload);
    }

    /// Wait for the next frame from this peer.
    pub(crate) async fn next(&mut self) -> Result<(Envelope, Bytes)> {
        let frame = self.rx.recv().await?;
        Ok((frame.envelope, frame.payload))
    }

    /// Take the next frame if one has already arrived.
    pub(crate) fn poll(&mut self) -> Result<Option<(Envelope, Bytes)>> {
        Ok(self
            .rx
            .poll()?
            .map(|frame| (frame.envelope, frame.payload)))
    }
}

/// One world member as seen from this process.
#[derive(Debug)]
pub(crate) struct Peer {
    pub(crate) tx: Tx,
    pub(crate) inbox: Mutex<Inbox>,
}

#[derive(Debug)]
struct ProcInner {
    rank: usize,
    world: Group,
    peers: Vec<Peer>,
    highest_context_id: AtomicI32,
    world_context_id: i32,
    self_context_id: i32,
    attached: Mutex<Option<Vec<u8>>>,
    buffered_inflight: AtomicUsize,
    buffered_quiesced: Notify,
}

/// The process context. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Proc {
    inner: Arc<ProcInner>,
}

impl Proc {
    /// Assemble a process from its world membership and one link per
    /// member (self included; `links[j]` carries traffic to and from world
    /// rank `j`).
    pub fn new(members: Vec<ProcessId>, rank: usize, links: Vec<(Tx, Rx)>) -> Result<Proc> {
        if rank >= members.len() {
            return Err(Error::InvalidRank {
                rank: rank as i32,
                size: members.len(),
            });
        }
        if links.len() != members.len() {
            return Err(Error::Config(format!(
                "{} links for {} members",
                links.len(),
                members.len()
            )));
        }
        let world = Group::new(members);
        if world.size() != links.len() {
            return Err(Error::Config("duplicate member identities".into()));
        }
        let peers = links
            .into_iter()
            .map(|(tx, rx)| Peer {
                tx,
                inbox: Mutex::new(Inbox {
                    rx,
                    queue: EnvelopeQueue::default(),
                }),
            })
            .collect();
        Ok(Proc {
            inner: Arc::new(ProcInner {
                rank,
                world,
                peers,
                // 0 is the world context, 1 the self context.
                highest_context_id: AtomicI32::new(1),
                world_context_id: 0,
                self_context_id: 1,
                attached: Mutex::new(None),
                buffered_inflight: AtomicUsize::new(0),
                buffered_quiesced: Notify::new(),
            }),
        })
    }

    /// Join a TCP world: listen on our address, dial every peer, accept
    /// every peer, and wire the loopback link.
    pub async fn bootstrap(config: &Config) -> Result<Proc> {
        let size = config.peers.len();
        let me = config.rank;
        if me >= size {
            return Err(Error::InvalidRank {
                rank: me as i32,
                size,
            });
        }
        let (_, mut listener) = net::serve(config.peers[me], &config.net).await?;

        let mut txs: Vec<Option<Tx>> = (0..size).map(|_| None).collect();
        let mut rxs: Vec<Option<Rx>> = (0..size).map(|_| None).collect();
        let (self_tx, self_rx) = local::link();
        txs[me] = Some(self_tx);
        rxs[me] = Some(self_rx);

        for (peer, &addr) in config.peers.iter().enumerate() {
            if peer != me {
                txs[peer] = Some(net::dial(addr, me as u64, &config.net).await?);
            }
        }
        for _ in 0..size - 1 {
            let (hello, rx) = listener.accept().await?;
            let peer = hello as usize;
            if peer >= size || peer == me || rxs[peer].is_some() {
                return Err(Error::Config(format!("unexpected hello rank {hello}")));
            }
            rxs[peer] = Some(rx);
        }

        let links = txs
            .into_iter()
            .zip(rxs)
            .map(|(tx, rx)| match (tx, rx) {
                (Some(tx), Some(rx)) => Ok((tx, rx)),
                _ => Err(Error::Config("incomplete mesh".into())),
            })
            .collect::<Result<Vec<_>>>()?;
        let members = (0..size as u64).map(ProcessId).collect();
        tracing::debug!(rank = me, size, "world wired");
        Proc::new(members, me, links)
    }

    /// Wire `n` fully-connected in-process worlds, one `Proc` per simulated
    /// process. Intended for tests and single-process runs.
    pub fn local_mesh(n: usize) -> Result<Vec<Proc>> {
        let members: Vec<ProcessId> = (0..n as u64).map(ProcessId).collect();
        local::full_mesh(n)
            .into_iter()
            .enumerate()
            .map(|(rank, links)| Proc::new(members.clone(), rank, links))
            .collect()
    }

    /// This process's world rank.
    pub fn rank(&self) -> usize {
        self.inner.rank
    }

    /// World size.
    pub fn size(&self) -> usize {
        self.inner.world.size()
    }

    /// This process's identity.
    pub fn id(&self) -> ProcessId {
        self.inner.world.members()[self.inner.rank]
    }

    /// The world group.
    pub fn world_group(&self) -> &Group {
        &self.inner.world
    }

    /// The communicator spanning every process.
    pub fn world(&self) -> Communicator {
        Communicator::from_parts(
            self.clone(),
            self.inner.world.clone(),
            self.inner.world_context_id,
        )
    }

    /// The communicator containing only this process.
    pub fn self_comm(&self) -> Communicator {
        Communicator::from_parts(
            self.clone(),
            Group::new(vec![self.id()]),
            self.inner.self_context_id,
        )
    }

    pub(crate) fn peer_by_id(&self, id: ProcessId) -> Result<&Peer> {
        let world_rank = self.inner.world.rank_of(id).ok_or(Error::NotAMember)?;
        Ok(&self.inner.peers[world_rank])
    }

    /// The next context id this process would agree to.
    pub(crate) fn propose_context_id(&self) -> i32 {
        self.inner.highest_context_id.load(Ordering::Acquire) + 1
    }

    /// Adopt an agreed context id. It must be strictly greater than every
    /// id committed before.
    pub(crate) fn commit_context_id(&self, id: i32) -> Result<()> {
        let prev = self
            .inner
            .highest_context_id
            .fetch_max(id, Ordering::AcqRel);
        if prev >= id {
            return Err(Error::ContextId(id));
        }
        Ok(())
    }

    /// Attach a buffer for buffered-mode sends. Fails if one is already
    /// attached.
    pub async fn buffer_attach(&self, buffer: Vec<u8>) -> Result<()> {
        let mut attached = self.inner.attached.lock().await;
        if attached.is_some() {
            return Err(Error::InvalidArgument("a buffer is already attached".into()));
        }
        *attached = Some(buffer);
        Ok(())
    }

    /// Detach and return the attached buffer, after every in-flight
    /// buffered send has finished staging.
    pub async fn buffer_detach(&self) -> Result<Vec<u8>> {
        loop {
            // Register for the wakeup before checking, so a send finishing
            // in between cannot be missed.
            let quiesced = self.inner.buffered_quiesced.notified();
            if self.inner.buffered_inflight.load(Ordering::Acquire) == 0 {
                break;
            }
            quiesced.await;
        }
        let mut attached = self.inner.attached.lock().await;
        attached.take().ok_or(Error::NoAttachedBuffer)
    }

    /// Stage `count` elements of `src` through the attached buffer and
    /// return the staged bytes. Holds the in-flight count so a concurrent
    /// detach waits for us.
    pub(crate) async fn pack_buffered<T: Element>(&self, src: &[T], count: usize) -> Result<Bytes> {
        self.inner.buffered_inflight.fetch_add(1, Ordering::AcqRel);
        let staged = async {
            let mut attached = self.inner.attached.lock().await;
            let buffer = attached.as_mut().ok_or(Error::NoAttachedBuffer)?;
            let end = buffer::pack(src, 0, count, buffer, 0)?;
            Ok(Bytes::copy_from_slice(&buffer[..end]))
        }
        .await;
        if self.inner.buffered_inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.buffered_quiesced.notify_waiters();
        }
        staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn world_and_self_communicators() {
        let procs = Proc::local_mesh(3).unwrap();
        let p = &procs[1];
        assert_eq!(p.rank(), 1);
        assert_eq!(p.size(), 3);
        let world = p.world();
        assert_eq!(world.size(), 3);
        assert_eq!(world.rank(), Some(1));
        let me = p.self_comm();
        assert_eq!(me.size(), 1);
        assert_eq!(me.rank(), Some(0));
    }

    #[tokio::test]
    async fn context_ids_advance_monotonically() {
        let procs = Proc::local_mesh(1).unwrap();
        let p = &procs[0];
        let next = p.propose_context_id();
        assert_eq!(next, 2);
        p.commit_context_id(next).unwrap();
        assert!(p.commit_context_id(next).is_err());
        assert_eq!(p.propose_context_id(), 3);
    }

    #[tokio::test]
    async fn attach_stage_detach() {
        let procs = Proc::local_mesh(1).unwrap();
        let p = &procs[0];
        assert!(p.buffer_detach().await.is_err());
        p.buffer_attach(vec![0u8; 64]).await.unwrap();
        assert!(p.buffer_attach(vec![0u8; 8]).await.is_err());

        let staged = p.pack_buffered(&[1i32, 2], 2).await.unwrap();
        assert_eq!(staged.len(), 8);

        let buffer = p.buffer_detach().await.unwrap();
        assert_eq!(buffer.len(), 64);
        assert!(p.buffer_detach().await.is_err());
    }
}
