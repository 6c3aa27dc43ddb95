/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Scatter: flat tree. The root posts one block per peer, then copies its
//! own block locally; peers receive their block from the root.

use crate::coll;
use crate::coll::TAG_SCATTER;
use crate::coll::TAG_SCATTERV;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;

pub(crate) async fn scatter<T: Element>(
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
    let want = (recvcount * ext).min(recvbuf.len());

    if rank != root {
        engine::recv_into(comm, &mut recvbuf[..want], root as i32, TAG_SCATTER).await?;
        return Ok(());
    }

    let block = sendcount * ext;
    coll::check_len(sendbuf.len(), size * block, "scatter send")?;
    for peer in 0..size {
        if peer != rank {
            let at = peer * block;
            engine::send_elements(comm, &sendbuf[at..at + block], peer as i32, TAG_SCATTER)?;
        }
    }
    let own = want.min(block);
    recvbuf[..own].clone_from_slice(&sendbuf[rank * block..rank * block + own]);
    Ok(())
}

pub(crate) async fn scatterv<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcounts: &[usize],
    displs: &[usize],
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
    let want = (recvcount * ext).min(recvbuf.len());

    if rank != root {
        engine::recv_into(comm, &mut recvbuf[..want], root as i32, TAG_SCATTERV).await?;
        return Ok(());
    }

    coll::check_per_rank(sendcounts.len(), size, "scatterv counts")?;
    coll::check_per_rank(displs.len(), size, "scatterv displacements")?;
    for peer in 0..size {
        coll::check_len(
            sendbuf.len(),
            (displs[peer] + sendcounts[peer]) * ext,
            "scatterv send",
        )?;
    }

    for peer in 0..size {
        if peer != rank {
            let at = displs[peer] * ext;
            let len = sendcounts[peer] * ext;
            engine::send_elements(comm, &sendbuf[at..at + len], peer as i32, TAG_SCATTERV)?;
        }
    }
    let at = displs[rank] * ext;
    let own = want.min(sendcounts[rank] * ext);
    recvbuf[..own].clone_from_slice(&sendbuf[at..at + own]);
    Ok(())
}
