/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Communicators: an ordered group plus a context id. All point-to-point
//! and collective traffic is scoped to the context id, so traffic on one
//! communicator can never match a receive on another.
//!
//! Counts are in logical datatype elements; buffers hold
//! `count * dtype.extent()` base elements. Oversized counts are clamped to
//! the buffer, and receives deliver `min(requested, arrived)` elements.

use std::sync::Arc;

use crate::PROC_NULL;
use crate::buffer;
use crate::coll;
use crate::datatype::BaseType;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Error;
use crate::error::Result;
use crate::group::Group;
use crate::group::GroupRelation;
use crate::op::ReduceOp;
use crate::proc::Peer;
use crate::proc::Proc;
use crate::request::RecvInit;
use crate::request::Request;
use crate::request::SendInit;
use crate::status::Status;

/// Send discipline. `Synchronous` and `Ready` currently delegate to
/// `Standard`: the transport accepts every post immediately, so the
/// stronger completion guarantees are vacuous here. `Buffered` stages the
/// payload through the process's attached buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Complete once the payload is handed to the transport.
    Standard,
    /// Stage through the attached buffer first; fails without one.
    Buffered,
    /// Nominally completes only once matched; relaxed to `Standard`.
    Synchronous,
    /// Nominally requires a posted receive; relaxed to `Standard`.
    Ready,
}

/// Outcome of comparing two communicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommRelation {
    /// Same group object and same context.
    Ident,
    /// Identical groups on different contexts.
    Congruent,
    /// Same membership, different order.
    Similar,
    /// Different membership.
    Unequal,
}

/// An isolated communication scope over an ordered group.
#[derive(Debug, Clone)]
pub struct Communicator {
    proc: Proc,
    group: Arc<Group>,
    context_id: i32,
}

impl Communicator {
    pub(crate) fn from_parts(proc: Proc, group: Group, context_id: i32) -> Self {
        Communicator {
            proc,
            group: Arc::new(group),
            context_id,
        }
    }

    /// The communicator's group.
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.group.size()
    }

    /// The calling process's rank within the group, if it is a member.
    pub fn rank(&self) -> Option<usize> {
        self.group.rank_of(self.proc.id())
    }

    pub(crate) fn require_rank(&self) -> Result<usize> {
        self.rank().ok_or(Error::NotAMember)
    }

    pub(crate) fn context_id(&self) -> i32 {
        self.context_id
    }

    pub(crate) fn proc(&self) -> &Proc {
        &self.proc
    }

    pub(crate) fn peer(&self, rank: usize) -> Result<&Peer> {
        let id = self.group.member(rank).ok_or(Error::InvalidRank {
            rank: rank as i32,
            size: self.size(),
        })?;
        self.proc.peer_by_id(id)
    }

    /// Base-element span of `count` logical elements, clamped to the
    /// buffer.
    fn slots(len: usize, count: usize, dtype: &Datatype) -> usize {
        (count * dtype.extent()).min(len)
    }

    // ------------------------------------------------------------------
    // Blocking point-to-point.

    /// Standard-mode send of `count` elements of `buf` to `dest` under
    /// `tag`. `PROC_NULL` destinations complete immediately.
    pub async fn send<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<()> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        engine::send_elements(self, &buf[..n], dest, tag)
    }

    /// Buffered-mode send: the payload is staged through the attached
    /// buffer, so the caller's data is free upon return. Fails with
    /// [`Error::NoAttachedBuffer`] if none is attached.
    pub async fn bsend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<()> {
        dtype.check::<T>()?;
        if dest == PROC_NULL {
            return Ok(());
        }
        let n = Self::slots(buf.len(), count, dtype);
        let payload = self.proc.pack_buffered(&buf[..n], n).await?;
        engine::post(self, dest, tag, T::BASE, n, true, payload)
    }

    /// Synchronous-mode send; relaxed to standard (see [`SendMode`]).
    pub async fn ssend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<()> {
        self.send(buf, count, dtype, dest, tag).await
    }

    /// Ready-mode send; relaxed to standard (see [`SendMode`]).
    pub async fn rsend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<()> {
        self.send(buf, count, dtype, dest, tag).await
    }

    /// Receive into `buf` from `source` (a rank, `ANY_SOURCE`, or
    /// `PROC_NULL`) under `tag` (a tag or `ANY_TAG`).
    pub async fn recv<T: Element>(
        &self,
        buf: &mut [T],
        count: usize,
        dtype: &Datatype,
        source: i32,
        tag: i32,
    ) -> Result<Status> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        engine::recv_into(self, &mut buf[..n], source, tag).await
    }

    /// Send to `dest` and receive from `source` concurrently.
    pub async fn sendrecv<T: Element, U: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        sendtype: &Datatype,
        dest: i32,
        sendtag: i32,
        recvbuf: &mut [U],
        recvcount: usize,
        recvtype: &Datatype,
        source: i32,
        recvtag: i32,
    ) -> Result<Status> {
        sendtype.check::<T>()?;
        recvtype.check::<U>()?;
        let n = Self::slots(sendbuf.len(), sendcount, sendtype);
        engine::send_elements(self, &sendbuf[..n], dest, sendtag)?;
        let m = Self::slots(recvbuf.len(), recvcount, recvtype);
        engine::recv_into(self, &mut recvbuf[..m], source, recvtag).await
    }

    /// `sendrecv` with one buffer: the outgoing data is captured before the
    /// receive overwrites it.
    pub async fn sendrecv_replace<T: Element>(
        &self,
        buf: &mut [T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        sendtag: i32,
        source: i32,
        recvtag: i32,
    ) -> Result<Status> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        engine::send_elements(self, &buf[..n], dest, sendtag)?;
        engine::recv_into(self, &mut buf[..n], source, recvtag).await
    }

    // ------------------------------------------------------------------
    // Non-blocking point-to-point. Each call spawns one task and returns a
    // joinable request; the data is captured at call time.

    /// Non-blocking standard-mode send.
    pub fn isend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<Request<()>> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        Ok(self.isend_mode_elements(buf[..n].to_vec(), dest, tag, SendMode::Standard))
    }

    /// Non-blocking buffered-mode send.
    pub fn ibsend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<Request<()>> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        Ok(self.isend_mode_elements(buf[..n].to_vec(), dest, tag, SendMode::Buffered))
    }

    /// Non-blocking synchronous-mode send; relaxed to standard.
    pub fn issend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<Request<()>> {
        self.isend(buf, count, dtype, dest, tag)
    }

    /// Non-blocking ready-mode send; relaxed to standard.
    pub fn irsend<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
    ) -> Result<Request<()>> {
        self.isend(buf, count, dtype, dest, tag)
    }

    pub(crate) fn isend_mode_elements<T: Element>(
        &self,
        data: Vec<T>,
        dest: i32,
        tag: i32,
        mode: SendMode,
    ) -> Request<()> {
        let comm = self.clone();
        Request::spawn(async move {
            let count = data.len();
            match mode {
                SendMode::Buffered => {
                    if dest != PROC_NULL {
                        let payload = comm.proc.pack_buffered(&data, count).await?;
                        engine::post(&comm, dest, tag, T::BASE, count, true, payload)?;
                    }
                }
                _ => engine::send_elements(&comm, &data, dest, tag)?,
            }
            Ok(((), Status::sent(count, count * T::BASE.byte_size(), tag)))
        })
    }

    /// Non-blocking receive of up to `count` elements. The request yields
    /// the delivered buffer alongside the status.
    pub fn irecv<T: Element>(
        &self,
        count: usize,
        dtype: &Datatype,
        source: i32,
        tag: i32,
    ) -> Result<Request<Vec<T>>> {
        dtype.check::<T>()?;
        Ok(self.irecv_elements(count * dtype.extent(), source, tag))
    }

    pub(crate) fn irecv_elements<T: Element>(
        &self,
        slots: usize,
        source: i32,
        tag: i32,
    ) -> Request<Vec<T>> {
        let comm = self.clone();
        Request::spawn(async move {
            let mut buf = vec![T::default(); slots];
            let status = engine::recv_into(&comm, &mut buf, source, tag).await?;
            Ok((buf, status))
        })
    }

    // ------------------------------------------------------------------
    // Persistent requests: arguments bound once, started many times. The
    // send data is snapshotted at init time.

    /// Bind a reusable send.
    pub fn send_init<T: Element>(
        &self,
        buf: &[T],
        count: usize,
        dtype: &Datatype,
        dest: i32,
        tag: i32,
        mode: SendMode,
    ) -> Result<SendInit<T>> {
        dtype.check::<T>()?;
        let n = Self::slots(buf.len(), count, dtype);
        Ok(SendInit::new(
            self.clone(),
            buf[..n].to_vec(),
            dest,
            tag,
            mode,
        ))
    }

    /// Bind a reusable receive.
    pub fn recv_init<T: Element>(
        &self,
        count: usize,
        dtype: &Datatype,
        source: i32,
        tag: i32,
    ) -> Result<RecvInit<T>> {
        dtype.check::<T>()?;
        Ok(RecvInit::new(
            self.clone(),
            count * dtype.extent(),
            source,
            tag,
        ))
    }

    // ------------------------------------------------------------------
    // Probes.

    /// Wait until a message matching `(source, tag)` is available, without
    /// consuming it.
    pub async fn probe(&self, source: i32, tag: i32) -> Result<Status> {
        match engine::probe(self, source, tag, true).await? {
            Some(status) => Ok(status),
            None => Err(Error::Task("blocking probe returned empty".into())),
        }
    }

    /// Check once for a matching message.
    pub async fn iprobe(&self, source: i32, tag: i32) -> Result<Option<Status>> {
        engine::probe(self, source, tag, false).await
    }

    // ------------------------------------------------------------------
    // Packing.

    /// Pack `count` elements of `inbuf` into `outbuf` at `position`;
    /// returns the new position.
    pub fn pack<T: Element>(
        &self,
        inbuf: &[T],
        count: usize,
        dtype: &Datatype,
        outbuf: &mut [u8],
        position: usize,
    ) -> Result<usize> {
        dtype.check::<T>()?;
        buffer::pack(inbuf, 0, count * dtype.extent(), outbuf, position)
    }

    /// Pack `count` elements of `inbuf` into a fresh buffer.
    pub fn pack_alloc<T: Element>(
        &self,
        inbuf: &[T],
        count: usize,
        dtype: &Datatype,
    ) -> Result<Vec<u8>> {
        dtype.check::<T>()?;
        buffer::pack_alloc(inbuf, 0, count * dtype.extent())
    }

    /// Unpack up to `count` elements from `inbuf` at `position`; returns
    /// the new position.
    pub fn unpack<T: Element>(
        &self,
        inbuf: &[u8],
        position: usize,
        outbuf: &mut [T],
        count: usize,
        dtype: &Datatype,
    ) -> Result<usize> {
        dtype.check::<T>()?;
        buffer::unpack(inbuf, position, outbuf, 0, count * dtype.extent())
    }

    /// Bytes needed to pack `incount` elements of `dtype`. Undefined for
    /// the generic element type, whose encoding is value-dependent.
    pub fn pack_size(&self, incount: usize, dtype: &Datatype) -> Result<usize> {
        if dtype.base() == BaseType::Element {
            return Err(Error::Unsupported("pack size of the generic element type"));
        }
        Ok(incount * dtype.size() * dtype.byte_size())
    }

    // ------------------------------------------------------------------
    // Communicator management.

    /// A new communicator with the same group on a fresh context id. All
    /// members must call this symmetrically.
    pub fn duplicate(&self) -> Result<Communicator> {
        self.create((*self.group).clone())
    }

    /// A new communicator over `group` on a fresh context id. All members
    /// of *this* communicator must call this symmetrically so their
    /// context-id counters stay aligned.
    pub fn create(&self, group: Group) -> Result<Communicator> {
        let context_id = self.proc.propose_context_id();
        self.proc.commit_context_id(context_id)?;
        Ok(Communicator::from_parts(self.proc.clone(), group, context_id))
    }

    /// Partition by colour; see [`coll::split`]. `None` opts out and yields
    /// `None`; negative colours are rejected.
    pub async fn split(&self, colour: Option<i32>, key: i32) -> Result<Option<Communicator>> {
        coll::split::split(self, colour, key).await
    }

    /// Relate two communicators.
    pub fn compare(a: &Communicator, b: &Communicator) -> CommRelation {
        match Group::compare(&a.group, &b.group) {
            GroupRelation::Ident => {
                if a.context_id == b.context_id {
                    CommRelation::Ident
                } else {
                    CommRelation::Congruent
                }
            }
            GroupRelation::Similar => CommRelation::Similar,
            GroupRelation::Unequal => CommRelation::Unequal,
        }
    }

    // ------------------------------------------------------------------
    // Collectives. Every member must call the same collective with
    // compatible arguments; internal traffic runs on reserved negative
    // tags, invisible to wildcard receives.

    /// Block until every member has entered the barrier.
    pub async fn barrier(&self) -> Result<()> {
        coll::barrier::barrier(self).await
    }

    /// Broadcast `count` elements from `root` into every member's `buf`.
    pub async fn bcast<T: Element>(
        &self,
        buf: &mut [T],
        count: usize,
        dtype: &Datatype,
        root: usize,
    ) -> Result<()> {
        coll::bcast::bcast(self, buf, count, dtype, root).await
    }

    /// Gather `sendcount` elements from every member into rank order at
    /// `root`.
    pub async fn gather<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcount: usize,
        dtype: &Datatype,
        root: usize,
    ) -> Result<()> {
        coll::gather::gather(self, sendbuf, sendcount, recvbuf, recvcount, dtype, root).await
    }

    /// Gather with per-rank counts and placement displacements (in units of
    /// the datatype extent).
    pub async fn gatherv<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcounts: &[usize],
        displs: &[usize],
        dtype: &Datatype,
        root: usize,
    ) -> Result<()> {
        coll::gather::gatherv(
            self, sendbuf, sendcount, recvbuf, recvcounts, displs, dtype, root,
        )
        .await
    }

    /// Scatter consecutive `sendcount`-element blocks of `root`'s buffer to
    /// the members.
    pub async fn scatter<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcount: usize,
        dtype: &Datatype,
        root: usize,
    ) -> Result<()> {
        coll::scatter::scatter(self, sendbuf, sendcount, recvbuf, recvcount, dtype, root).await
    }

    /// Scatter with per-rank counts and source displacements.
    pub async fn scatterv<T: Element>(
        &self,
        sendbuf: &[T],
        sendcounts: &[usize],
        displs: &[usize],
        recvbuf: &mut [T],
        recvcount: usize,
        dtype: &Datatype,
        root: usize,
    ) -> Result<()> {
        coll::scatter::scatterv(
            self, sendbuf, sendcounts, displs, recvbuf, recvcount, dtype, root,
        )
        .await
    }

    /// Gather every member's block to every member.
    pub async fn allgather<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcount: usize,
        dtype: &Datatype,
    ) -> Result<()> {
        coll::allgather::allgather(self, sendbuf, sendcount, recvbuf, recvcount, dtype).await
    }

    /// `allgather` with per-rank counts and displacements.
    pub async fn allgatherv<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcounts: &[usize],
        displs: &[usize],
        dtype: &Datatype,
    ) -> Result<()> {
        coll::allgather::allgatherv(self, sendbuf, sendcount, recvbuf, recvcounts, displs, dtype)
            .await
    }

    /// Personalized all-to-all exchange of equal blocks.
    pub async fn alltoall<T: Element>(
        &self,
        sendbuf: &[T],
        sendcount: usize,
        recvbuf: &mut [T],
        recvcount: usize,
        dtype: &Datatype,
    ) -> Result<()> {
        coll::alltoall::alltoall(self, sendbuf, sendcount, recvbuf, recvcount, dtype).await
    }

    /// Personalized all-to-all with per-pair counts and displacements.
    #[allow(clippy::too_many_arguments)]
    pub async fn alltoallv<T: Element>(
        &self,
        sendbuf: &[T],
        sendcounts: &[usize],
        sdispls: &[usize],
        recvbuf: &mut [T],
        recvcounts: &[usize],
        rdispls: &[usize],
        dtype: &Datatype,
    ) -> Result<()> {
        coll::alltoall::alltoallv(
            self, sendbuf, sendcounts, sdispls, recvbuf, recvcounts, rdispls, dtype,
        )
        .await
    }

    /// Reduce element-wise across members; the result lands only in
    /// `root`'s `recvbuf`.
    pub async fn reduce<T: Element, O: ReduceOp<T> + ?Sized>(
        &self,
        sendbuf: &[T],
        recvbuf: &mut [T],
        count: usize,
        dtype: &Datatype,
        op: &O,
        root: usize,
    ) -> Result<()> {
        coll::reduce::reduce(self, sendbuf, recvbuf, count, dtype, op, root).await
    }

    /// Reduce and deliver the result to every member.
    pub async fn allreduce<T: Element, O: ReduceOp<T> + ?Sized>(
        &self,
        sendbuf: &[T],
        recvbuf: &mut [T],
        count: usize,
        dtype: &Datatype,
        op: &O,
    ) -> Result<()> {
        coll::reduce::allreduce(self, sendbuf, recvbuf, count, dtype, op).await
    }

    /// Reduce `sum(recvcounts)` elements, then scatter the result so rank
    /// `i` receives its `recvcounts[i]`-element share.
    pub async fn reduce_scatter<T: Element, O: ReduceOp<T> + ?Sized>(
        &self,
        sendbuf: &[T],
        recvbuf: &mut [T],
        recvcounts: &[usize],
        dtype: &Datatype,
        op: &O,
    ) -> Result<()> {
        coll::reduce_scatter::reduce_scatter(self, sendbuf, recvbuf, recvcounts, dtype, op).await
    }

    /// Inclusive prefix reduction: rank `i` receives the fold of ranks
    /// `0..=i`, combined in rank order.
    pub async fn scan<T: Element, O: ReduceOp<T> + ?Sized>(
        &self,
        sendbuf: &[T],
        recvbuf: &mut [T],
        count: usize,
        dtype: &Datatype,
        op: &O,
    ) -> Result<()> {
        coll::scan::scan(self, sendbuf, recvbuf, count, dtype, op).await
    }
}
