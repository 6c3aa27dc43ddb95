/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Broadcast: binomial tree rooted at `root`. Ranks are rotated so the
//! root sits at relative rank 0; each rank receives once from the peer
//! that clears its lowest set bit, then forwards down its subtree.

use crate::coll;
use crate::coll::TAG_BCAST;
use crate::comm::Communicator;
use crate::datatype::Datatype;
use crate::datatype::Element;
use crate::engine;
use crate::error::Result;

pub(crate) async fn bcast<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    count: usize,
    dtype: &Datatype,
    root: usize,
) -> Result<()> {
    coll::check_root(comm, root)?;
    dtype.check::<T>()?;
    let rank = comm.require_rank()?;
    let size = comm.size();
    if size == 1 {
        return Ok(());
    }
    let n = (count * dtype.extent()).min(buf.len());
    let relrank = (rank + size - root) % size;

    let mut mask = 1usize;
    while mask < size {
        if relrank & mask != 0 {
            let src = (rank + size - mask) % size;
            engine::recv_into(comm, &mut buf[..n], src as i32, TAG_BCAST).await?;
            break;
        }
        mask <<= 1;
    }
    mask >>= 1;
    while mask > 0 {
        if relrank + mask < size {
            let dst = (rank + mask) % size;
            engine::send_elements(comm, &buf[..n], dst as i32, TAG_BCAST)?;
        }
        mask >>= 1;
    }
    Ok(())
}
