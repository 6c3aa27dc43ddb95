/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! All-to-all personalized exchange. Every receive is posted first, then
//! every send; both sides walk the peers rotated by the caller's rank, so
//! no single rank is hammered by everyone at once. One bulk wait collects
//! the receives.

use crate::coll;
use crate::coll::TAG_ALLTOALL;
use crate::coll::TAG_ALLTOALLV;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;
use crate::request;

pub(crate) async fn alltoall<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcount: usize,
    recvbuf: &mut [T],
    recvcount: usize,
    dtype: &Datatype,
) -> Result<()> {
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let ext = dtype.extent();
    let sblock = sendcount * ext;
    let rblock = recvcount * ext;
    coll::check_len(sendbuf.len(), size * sblock, "alltoall send")?;
    coll::check_len(recvbuf.len(), size * rblock, "alltoall receive")?;

    let mut receives = Vec::with_capacity(size);
    for i in 0..size {
        let src = (rank + i) % size;
        receives.push(comm.irecv_elements::<T>(rblock, src as i32, TAG_ALLTOALL));
    }
    for i in 0..size {
        let dst = (rank + i) % size;
        let at = dst * sblock;
        engine::send_elements(comm, &sendbuf[at..at + sblock], dst as i32, TAG_ALLTOALL)?;
    }
    for (i, (data, _)) in request::wait_all(receives).await?.into_iter().enumerate() {
        let src = (rank + i) % size;
        let n = data.len().min(rblock);
        recvbuf[src * rblock..src * rblock + n].clone_from_slice(&data[..n]);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn alltoallv<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcounts: &[usize],
    sdispls: &[usize],
    recvbuf: &mut [T],
    recvcounts: &[usize],
    rdispls: &[usize],
    dtype: &Datatype,
) -> Result<()> {
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let ext = dtype.extent();
    coll::check_per_rank(sendcounts.len(), size, "alltoallv send counts")?;
    coll::check_per_rank(sdispls.len(), size, "alltoallv send displacements")?;
    coll::check_per_rank(recvcounts.len(), size, "alltoallv receive counts")?;
    coll::check_per_rank(rdispls.len(), size, "alltoallv receive displacements")?;
    for peer in 0..size {
        coll::check_len(
            sendbuf.len(),
            (sdispls[peer] + sendcounts[peer]) * ext,
            "alltoallv send",
        )?;
        coll::check_len(
            recvbuf.len(),
            (rdispls[peer] + recvcounts[peer]) * ext,
            "alltoallv receive",
        )?;
    }

    let mut receives = Vec::with_capacity(size);
    for i in 0..size {
        let src = (rank + i) % size;
        receives.push(comm.irecv_elements::<T>(recvcounts[src] * ext, src as i32, TAG_ALLTOALLV));
    }
    for i in 0..size {
        let dst = (rank + i) % size;
        let at = sdispls[dst] * ext;
        let len = sendcounts[dst] * ext;
        engine::send_elements(comm, &sendbuf[at..at + len], dst as i32, TAG_ALLTOALLV)?;
    }
    for (i, (data, _)) in request::wait_all(receives).await?.into_iter().enumerate() {
        let src = (rank + i) % size;
        let at = rdispls[src] * ext;
        let n = data.len().min(recvcounts[src] * ext);
        recvbuf[at..at + n].clone_from_slice(&data[..n]);
    }
    Ok(())
}
