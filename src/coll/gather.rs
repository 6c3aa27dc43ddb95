/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Gather: flat tree. The root copies its own contribution locally and
//! receives one block from every other rank, placed in rank order (or at
//! the caller-supplied displacements for the `v` variant).

use crate::coll;
use crate::coll::TAG_GATHER;
use crate::coll::TAG_GATHERV;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;

pub(crate) async fn gather<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcount: usize,
    recvbuf: &mut [T],
    recvcount: usize,
    dtype: &Datatype,
    root: usize,
) -> Result<()> {
    coll::check_root(comm, root)?;
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let ext = dtype.extent();
    let sent = (sendcount * ext).min(sendbuf.len());

    if rank != root {
        return engine::send_elements(comm, &sendbuf[..sent], root as i32, TAG_GATHER);
    }

    let block = recvcount * ext;
    coll::check_len(recvbuf.len(), size * block, "gather receive")?;
    let own = sent.min(block);
    recvbuf[rank * block..rank * block + own].clone_from_slice(&sendbuf[..own]);
    for peer in 0..size {
        if peer != rank {
            let at = peer * block;
            engine::recv_into(comm, &mut recvbuf[at..at + block], peer as i32, TAG_GATHER).await?;
        }
    }
    Ok(())
}

pub(crate) async fn gatherv<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcount: usize,
    recvbuf: &mut [T],
    recvcounts: &[usize],
    displs: &[usize],
    dtype: &Datatype,
    root: usize,
) -> Result<()> {
    coll::check_root(comm, root)?;
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let ext = dtype.extent();
    let sent = (sendcount * ext).min(sendbuf.len());

    if rank != root {
        return engine::send_elements(comm, &sendbuf[..sent], root as i32, TAG_GATHERV);
    }

    coll::check_per_rank(recvcounts.len(), size, "gatherv counts")?;
    coll::check_per_rank(displs.len(), size, "gatherv displacements")?;
    for peer in 0..size {
        coll::check_len(
            recvbuf.len(),
            (displs[peer] + recvcounts[peer]) * ext,
            "gatherv receive",
        )?;
    }

    let at = displs[rank] * ext;
    let own = sent.min(recvcounts[rank] * ext);
    recvbuf[at..at + own].clone_from_slice(&sendbuf[..own]);
    for peer in 0..size {
        if peer != rank {
            let at = displs[peer] * ext;
            let len = recvcounts[peer] * ext;
            engine::recv_into(comm, &mut recvbuf[at..at + len], peer as i32, TAG_GATHERV).await?;
        }
    }
    Ok(())
}
