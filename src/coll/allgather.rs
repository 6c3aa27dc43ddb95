/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Allgather: a double ring. Blocks flow rightward and leftward at the
//! same time, each rank forwarding the newest block it received in each
//! direction. `size / 2` blocks arrive from the left and `(size - 1) / 2`
//! from the right; when `size - 1` is odd the rightward flow runs one
//! extra half-round. The `v` variant runs a single rightward ring for
//! `size - 1` steps, since variable block sizes make the two flows uneven.

use crate::coll;
use crate::coll::TAG_ALLGATHER;
use crate::coll::TAG_ALLGATHERV;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;

pub(crate) async fn allgather<T: Element>(
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
    let block = recvcount * ext;
    let sent = (sendcount * ext).min(sendbuf.len()).min(block);
    coll::check_len(recvbuf.len(), size * block, "allgather receive")?;

    recvbuf[rank * block..rank * block + sent].clone_from_slice(&sendbuf[..sent]);
    if size == 1 {
        return Ok(());
    }

    let right = (rank + 1) % size;
    let left = (rank + size - 1) % size;
    let from_left = size / 2;
    let from_right = (size - 1) / 2;

    for step in 1..=from_left.max(from_right) {
        // Forward the newest block in each direction first; posts never
        // block, so the ring cannot deadlock.
        if step <= from_left {
            let out = (rank + size - step + 1) % size;
            let at = out * block;
            engine::send_elements(comm, &recvbuf[at..at + block], right as i32, TAG_ALLGATHER)?;
        }
        if step <= from_right {
            let out = (rank + step - 1) % size;
            let at = out * block;
            engine::send_elements(comm, &recvbuf[at..at + block], left as i32, TAG_ALLGATHER)?;
        }
        if step <= from_left {
            let inc = (rank + size - step) % size;
            let at = inc * block;
            engine::recv_into(comm, &mut recvbuf[at..at + block], left as i32, TAG_ALLGATHER)
                .await?;
        }
        if step <= from_right {
            let inc = (rank + step) % size;
            let at = inc * block;
            engine::recv_into(comm, &mut recvbuf[at..at + block], right as i32, TAG_ALLGATHER)
                .await?;
        }
    }
    Ok(())
}

pub(crate) async fn allgatherv<T: Element>(
    comm: &Communicator,
    sendbuf: &[T],
    sendcount: usize,
    recvbuf: &mut [T],
    recvcounts: &[usize],
    displs: &[usize],
    dtype: &Datatype,
) -> Result<()> {
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let ext = dtype.extent();
    coll::check_per_rank(recvcounts.len(), size, "allgatherv counts")?;
    coll::check_per_rank(displs.len(), size, "allgatherv displacements")?;
    for peer in 0..size {
        coll::check_len(
            recvbuf.len(),
            (displs[peer] + recvcounts[peer]) * ext,
            "allgatherv receive",
        )?;
    }

    let at = displs[rank] * ext;
    let own = (sendcount * ext).min(sendbuf.len()).min(recvcounts[rank] * ext);
    recvbuf[at..at + own].clone_from_slice(&sendbuf[..own]);
    if size == 1 {
        return Ok(());
    }

    let right = (rank + 1) % size;
    let left = (rank + size - 1) % size;
    for step in 1..size {
        let out = (rank + size - step + 1) % size;
        let at = displs[out] * ext;
        let len = recvcounts[out] * ext;
        engine::send_elements(comm, &recvbuf[at..at + len], right as i32, TAG_ALLGATHERV)?;

        let inc = (rank + size - step) % size;
        let at = displs[inc] * ext;
        let len = recvcounts[inc] * ext;
        engine::recv_into(comm, &mut recvbuf[at..at + len], left as i32, TAG_ALLGATHERV).await?;
    }
    Ok(())
}
