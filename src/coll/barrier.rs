/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Barrier: a flat tree through rank 0 using 0-byte messages. Rank 0
//! collects one arrival from everyone, then releases everyone.

use crate::coll::TAG_BARRIER;
use crate::comm::Communicator;
use crate::engine;
use crate::error::Result;

pub(crate) async fn barrier(comm: &Communicator) -> Result<()> {
    let rank = comm.require_rank()?;
    let size = comm.size();
    if size <= 1 {
        return Ok(());
    }
    let mut sink: [u8; 0] = [];
    if rank == 0 {
        for peer in 1..size {
            engine::recv_into::<u8>(comm, &mut sink, peer as i32, TAG_BARRIER).await?;
        }
        for peer in 1..size {
            engine::send_elements::<u8>(comm, &[], peer as i32, TAG_BARRIER)?;
        }
    } else {
        engine::send_elements::<u8>(comm, &[], 0, TAG_BARRIER)?;
        engine::recv_into::<u8>(comm, &mut sink, 0, TAG_BARRIER).await?;
    }
    Ok(())
}
