/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The envelope-matching engine.
//!
//! Explicit-source receives lock the peer's inbox for one
//! drain-or-append step at a time: scan the queue, read one frame from the
//! transport, and either deliver it or queue it. The lock is released
//! between steps, so a frame queued for somebody else stays claimable by
//! other receivers while this one keeps waiting. Wildcard receives
//! round-robin over all inboxes with `try_lock`, skipping any inbox an
//! explicit receive has claimed; two concurrent wildcard receives
//! therefore interleave instead of deadlocking. Messages nobody wanted yet
//! are moved to the inbox queue in arrival order.

use bytes::Bytes;

use crate::ANY_SOURCE;
use crate::PROC_NULL;
use crate::buffer;
use crate::comm::Communicator;
use crate::datatype::BaseType;
use crate::datatype::Element;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::error::Result;
use crate::status::Status;

/// Post a pre-packed payload to `dest`. Fire-and-forget: ordering per
/// (sender, receiver) pair is the transport's.
pub(crate) fn post(
    comm: &Communicator,
    dest: i32,
    tag: i32,
    base: BaseType,
    count: usize,
    buffered: bool,
    payload: Bytes,
) -> Result<()> {
    if dest == PROC_NULL {
        return Ok(());
    }
    let rank = resolve(comm, dest)?;
    let envelope = Envelope {
        tag,
        context_id: comm.context_id(),
        buffered,
        base,
        count,
    };
    tracing::trace!(dest = rank, tag, count, "post");
    comm.peer(rank)?
        .tx
        .post(crate::channel::Frame { envelope, payload })?;
    Ok(())
}

/// Pack and post `src` to `dest`.
pub(crate) fn send_elements<T: Element>(
    comm: &Communicator,
    src: &[T],
    dest: i32,
    tag: i32,
) -> Result<()> {
    if dest == PROC_NULL {
        return Ok(());
    }
    let payload = Bytes::from(buffer::pack_alloc(src, 0, src.len())?);
    post(comm, dest, tag, T::BASE, src.len(), false, payload)
}

/// Receive one message matching `(source, tag)` into `dst`. `source` may be
/// a rank, `ANY_SOURCE`, or `PROC_NULL` (which completes immediately with
/// an empty status). Arrivals larger than `dst` are truncated to whole
/// elements; the status reports the delivered count.
pub(crate) async fn recv_into<T: Element>(
    comm: &Communicator,
    dst: &mut [T],
    source: i32,
    tag: i32,
) -> Result<Status> {
    if source == PROC_NULL {
        return Ok(Status::proc_null());
    }
    if source == ANY_SOURCE {
        return recv_any_source(comm, dst, tag).await;
    }
    let rank = resolve(comm, source)?;
    let context_id = comm.context_id();

    loop {
        // Hold the inbox for one drain-or-append step.
        let mut inbox = comm.peer(rank)?.inbox.lock().await;
        if let Some((envelope, payload)) = inbox.take_match(context_id, tag) {
            return deliver(dst, rank, envelope, payload);
        }
        let (envelope, payload) = inbox.next().await?;
        if envelope.matches(context_id, tag) {
            return deliver(dst, rank, envelope, payload);
        }
        tracing::trace!(
            source = rank,
            tag = envelope.tag,
            context_id = envelope.context_id,
            "queueing unexpected message"
        );
        inbox.push(envelope, payload);
        // The queued frame may belong to another receiver; reopen the
        // inbox before waiting again.
        drop(inbox);
        tokio::task::yield_now().await;
    }
}

async fn recv_any_source<T: Element>(
    comm: &Communicator,
    dst: &mut [T],
    tag: i32,
) -> Result<Status> {
    let size = comm.size();
    let context_id = comm.context_id();
    let mut rank = 0;
    loop {
        // Skip inboxes claimed by an explicit receive.
        if let Ok(mut inbox) = comm.peer(rank)?.inbox.try_lock() {
            if let Some((envelope, payload)) = inbox.take_match(context_id, tag) {
                return deliver(dst, rank, envelope, payload);
            }
            match inbox.poll()? {
                Some((envelope, payload)) if envelope.matches(context_id, tag) => {
                    return deliver(dst, rank, envelope, payload);
                }
                Some((envelope, payload)) => inbox.push(envelope, payload),
                None => {}
            }
        }
        rank += 1;
        if rank == size {
            rank = 0;
            tokio::task::yield_now().await;
        }
    }
}

/// Probe for a message matching `(source, tag)` without consuming it. With
/// `blocking` set, waits until one exists.
pub(crate) async fn probe(
    comm: &Communicator,
    source: i32,
    tag: i32,
    blocking: bool,
) -> Result<Option<Status>> {
    if source == PROC_NULL {
        return Ok(Some(Status::proc_null()));
    }
    if source == ANY_SOURCE {
        return probe_any_source(comm, tag, blocking).await;
    }
    let rank = resolve(comm, source)?;
    let context_id = comm.context_id();

    loop {
        let mut inbox = comm.peer(rank)?.inbox.lock().await;
        while let Some((envelope, payload)) = inbox.poll()? {
            inbox.push(envelope, payload);
        }
        if let Some(envelope) = inbox.probe_match(context_id, tag) {
            return Ok(Some(status_of(rank, envelope)));
        }
        if !blocking {
            return Ok(None);
        }
        let (envelope, payload) = inbox.next().await?;
        inbox.push(envelope, payload);
        // Same step discipline as receives: reopen the inbox between
        // arrivals.
        drop(inbox);
        tokio::task::yield_now().await;
    }
}

async fn probe_any_source(comm: &Communicator, tag: i32, blocking: bool) -> Result<Option<Status>> {
    let size = comm.size();
    let context_id = comm.context_id();
    loop {
        for rank in 0..size {
            if let Ok(mut inbox) = comm.peer(rank)?.inbox.try_lock() {
                while let Some((envelope, payload)) = inbox.poll()? {
                    inbox.push(envelope, payload);
                }
                if let Some(envelope) = inbox.probe_match(context_id, tag) {
                    return Ok(Some(status_of(rank, envelope)));
                }
            }
        }
        if !blocking {
            return Ok(None);
        }
        tokio::task::yield_now().await;
    }
}

fn deliver<T: Element>(
    dst: &mut [T],
    source: usize,
    envelope: Envelope,
    payload: Bytes,
) -> Result<Status> {
    if envelope.base != T::BASE {
        return Err(Error::TypeMismatch {
            expected: T::BASE,
            got: envelope.base,
        });
    }
    // Deliver min(requested, arrived) whole elements.
    let count = envelope.count.min(dst.len());
    buffer::unpack(&payload, 0, dst, 0, count)?;
    Ok(Status {
        source: source as i32,
        tag: envelope.tag,
        count,
        size: count * envelope.base.byte_size(),
        index: None,
    })
}

fn status_of(source: usize, envelope: &Envelope) -> Status {
    Status {
        source: source as i32,
        tag: envelope.tag,
        count: envelope.count,
        size: envelope.count * envelope.base.byte_size(),
        index: None,
    }
}

fn resolve(comm: &Communicator, rank: i32) -> Result<usize> {
    if rank < 0 || rank as usize >= comm.size() {
        return Err(Error::InvalidRank {
            rank,
            size: comm.size(),
        });
    }
    Ok(rank as usize)
}
