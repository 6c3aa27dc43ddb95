/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Inclusive prefix reduction: a sequential pipeline up the ranks. Each
//! rank folds the running prefix it receives from its predecessor (the
//! left operand) into its own contribution and passes the result on.

use crate::coll;
use crate::coll::TAG_SCAN;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;
use crate::op::ReduceOp;

pub(crate) async fn scan<T: Element, O: ReduceOp<T> + ?Sized>(
    comm: &Communicator,
    sendbuf: &[T],
    recvbuf: &mut [T],
    count: usize,
    dtype: &Datatype,
    op: &O,
) -> Result<()> {
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    let total = count * dtype.extent();
    coll::check_len(sendbuf.len(), total, "scan send")?;
    coll::check_len(recvbuf.len(), total, "scan receive")?;

    recvbuf[..total].clone_from_slice(&sendbuf[..total]);
    if rank > 0 {
        let mut prefix = vec![T::default(); total];
        engine::recv_into(comm, &mut prefix, (rank - 1) as i32, TAG_SCAN).await?;
        op.apply(&prefix, &mut recvbuf[..total], count, dtype)?;
    }
    if rank + 1 < size {
        engine::send_elements(comm, &recvbuf[..total], (rank + 1) as i32, TAG_SCAN)?;
    }
    Ok(())
}
