/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Collective algorithms, one module per operation. All internal traffic
//! runs on reserved negative tags, one per collective, so it can never
//! match an application receive (wildcard tags only match non-negative
//! tags) and concurrent collectives on different communicators stay
//! isolated by context id.

pub(crate) mod allgather;
pub(crate) mod alltoall;
pub(crate) mod barrier;
pub(crate) mod bcast;
pub(crate) mod gather;
pub(crate) mod reduce;
pub(crate) mod reduce_scatter;
pub(crate) mod scan;
pub(crate) mod scatter;
pub(crate) mod split;

pub(crate) const TAG_BARRIER: i32 = -1;
pub(crate) const TAG_BCAST: i32 = -2;
pub(crate) const TAG_REDUCE: i32 = -3;
pub(crate) const TAG_ALLREDUCE: i32 = -4;
pub(crate) const TAG_GATHER: i32 = -5;
pub(crate) const TAG_GATHERV: i32 = -6;
pub(crate) const TAG_ALLGATHER: i32 = -7;
pub(crate) const TAG_ALLGATHERV: i32 = -8;
pub(crate) const TAG_SCATTER: i32 = -9;
pub(crate) const TAG_SCATTERV: i32 = -10;
pub(crate) const TAG_ALLTOALL: i32 = -11;
pub(crate) const TAG_ALLTOALLV: i32 = -12;
pub(crate) const TAG_REDUCE_SCATTER: i32 = -13;
pub(crate) const TAG_SCAN: i32 = -14;
pub(crate) const TAG_SPLIT: i32 = -15;

use crate::comm::Communicator;
use crate::error::Error;
use crate::error::Result;

/// Validate a root rank against the communicator's group.
pub(crate) fn check_root(comm: &Communicator, root: usize) -> Result<()> {
    if root >= comm.size() {
        return Err(Error::InvalidRoot {
            root,
            size: comm.size(),
        });
    }
    Ok(())
}

/// Require `buf` to hold at least `needed` base elements for `role`.
pub(crate) fn check_len(len: usize, needed: usize, role: &'static str) -> Result<()> {
    if len < needed {
        return Err(Error::InvalidArgument(format!(
            "{role} buffer holds {len} base elements, {needed} needed"
        )));
    }
    Ok(())
}

/// Require a per-rank argument array to cover the whole group.
pub(crate) fn check_per_rank(len: usize, size: usize, role: &'static str) -> Result<()> {
    if len != size {
        return Err(Error::InvalidArgument(format!(
            "{role} names {len} ranks, group has {size}"
        )));
    }
    Ok(())
}
