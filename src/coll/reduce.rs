/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reduction by recursive doubling. When the group size is not a power of
//! two, the first `2 * rem` ranks pre-fold in odd/even pairs so `pof2`
//! ranks run the doubling rounds, and the eliminated ranks receive the
//! result afterwards. Operand order follows ranks: the contribution coming
//! from the smaller rank is always the left operand, so non-commutative
//! operators combine in rank order.

use crate::coll;
use crate::coll::TAG_ALLREDUCE;
use crate::coll::TAG_REDUCE;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;
use crate::op::ReduceOp;

/// Run the exchange; every rank returns the full reduction.
pub(crate) async fn fold<T: Element, O: ReduceOp<T> + ?Sized>(
    comm: &Communicator,
    sendbuf: &[T],
    count: usize,
    dtype: &Datatype,
    op: &O,
    tag: i32,
) -> Result<Vec<T>> {
    let rank = comm.require_rank()? as i32;
    let size = comm.size() as i32;
    let total = count * dtype.extent();
    coll::check_len(sendbuf.len(), total, "reduction send")?;
    let mut work = sendbuf[..total].to_vec();
    if size == 1 {
        return Ok(work);
    }
    let mut tmp = vec![T::default(); total];

    let mut pof2: i32 = 1;
    while pof2 * 2 <= size {
        pof2 *= 2;
    }
    let rem = size - pof2;

    // Pre-fold: each odd rank below 2*rem absorbs its even neighbor, which
    // drops out of the doubling rounds.
    let newrank = if rank < 2 * rem {
        if rank % 2 == 0 {
            engine::send_elements(comm, &work, rank + 1, tag)?;
            -1
        } else {
            engine::recv_into(comm, &mut tmp, rank - 1, tag).await?;
            op.apply(&tmp, &mut work, count, dtype)?;
            rank / 2
        }
    } else {
        rank - rem
    };

    if newrank != -1 {
        let mut mask = 1;
        while mask < pof2 {
            let newdst = newrank ^ mask;
            let dst = if newdst < rem {
                newdst * 2 + 1
            } else {
                newdst + rem
            };
            engine::send_elements(comm, &work, dst, tag)?;
            engine::recv_into(comm, &mut tmp, dst, tag).await?;
            if dst < rank {
                // Partner is the smaller rank: its value is the left
                // operand.
                op.apply(&tmp, &mut work, count, dtype)?;
            } else {
                // We are the smaller rank: fold ours into theirs, keep the
                // result.
                op.apply(&work, &mut tmp, count, dtype)?;
                std::mem::swap(&mut work, &mut tmp);
            }
            mask <<= 1;
        }
    }

    // Post-fold: hand the result back to the eliminated even ranks.
    if rank < 2 * rem {
        if rank % 2 != 0 {
            engine::send_elements(comm, &work, rank - 1, tag)?;
        } else {
            engine::recv_into(comm, &mut work, rank + 1, tag).await?;
        }
    }
    Ok(work)
}

pub(crate) async fn reduce<T: Element, O: ReduceOp<T> + ?Sized>(
    comm: &Communicator,
    sendbuf: &[T],
    recvbuf: &mut [T],
    count: usize,
    dtype: &Datatype,
    op: &O,
    root: usize,
) -> Result<()> {
    coll::check_root(comm, root)?;
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let work = fold(comm, sendbuf, count, dtype, op, TAG_REDUCE).await?;
    if rank == root {
        let total = count * dtype.extent();
        coll::check_len(recvbuf.len(), total, "reduction receive")?;
        recvbuf[..total].clone_from_slice(&work);
    }
    Ok(())
}

pub(crate) async fn allreduce<T: Element, O: ReduceOp<T> + ?Sized>(
    comm: &Communicator,
    sendbuf: &[T],
    recvbuf: &mut [T],
    count: usize,
    dtype: &Datatype,
    op: &O,
) -> Result<()> {
    dtype.check::<T>()?;
    let total = count * dtype.extent();
    coll::check_len(recvbuf.len(), total, "reduction receive")?;
    let work = fold(comm, sendbuf, count, dtype, op, TAG_ALLREDUCE).await?;
    recvbuf[..total].clone_from_slice(&work);
    Ok(())
}
