/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reduce-scatter: a full reduction to rank 0 followed by a `scatterv` of
//! the per-rank shares.

use crate::coll;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::error::Result;
use crate::op::ReduceOp;

pub(crate) async fn reduce_scatter<T: Element, O: ReduceOp<T> + ?Sized>(
    comm: &Communicator,
    sendbuf: &[T],
    recvbuf: &mut [T],
    recvcounts: &[usize],
    dtype: &Datatype,
    op: &O,
) -> Result<()> {
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    coll::check_per_rank(recvcounts.len(), size, "reduce_scatter counts")?;

    let count: usize = recvcounts.iter().sum();
    let mut full = vec![T::default(); count * dtype.extent()];
    coll::reduce::reduce(comm, sendbuf, &mut full, count, dtype, op, 0).await?;

    let mut displs = Vec::with_capacity(size);
    let mut at = 0;
    for &c in recvcounts {
        displs.push(at);
        at += c;
    }
    coll::scatter::scatterv(
        comm,
        &full,
        recvcounts,
        &displs,
        recvbuf,
        recvcounts[rank],
        dtype,
        0,
    )
    .await
}
