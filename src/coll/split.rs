/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Split a communicator by colour. Colours are non-negative; opting out
//! is expressed as `None` and carried on the wire as a reserved sentinel,
//! so negative colours are rejected up front. Every member contributes a
//! `(colour, key, rank)` triple via allgather; members sharing a colour
//! form a new communicator ordered by key (stable: equal keys keep parent
//! rank order). The new context id is agreed by a max-reduction over
//! every member's proposal and committed by every member, opted-out ones
//! included, so all counters stay aligned.

use crate::UNDEFINED;
use crate::coll;
use crate::coll::TAG_SPLIT;
use crate::comm::Communicator;
use crate::datatype::INT;
use crate::error::Error;
use crate::error::Result;
use crate::group::Group;
use crate::op::Op;

pub(crate) async fn split(
    comm: &Communicator,
    colour: Option<i32>,
    key: i32,
) -> Result<Option<Communicator>> {
    let rank = comm.require_rank()?;
    let size = comm.size();
    if let Some(colour) = colour {
        if colour < 0 {
            return Err(Error::InvalidArgument(format!(
                "split colour must be non-negative, got {colour}"
            )));
        }
    }

    let mine = [colour.unwrap_or(UNDEFINED), key, rank as i32];
    let mut table = vec![0i32; 3 * size];
    coll::allgather::allgather(comm, &mine, 3, &mut table, 3, &INT).await?;

    let proposal = [comm.proc().propose_context_id()];
    let agreed = coll::reduce::fold(comm, &proposal, 1, &INT, &Op::Max, TAG_SPLIT).await?[0];
    comm.proc().commit_context_id(agreed)?;

    let Some(colour) = colour else {
        return Ok(None);
    };
    let mut entries: Vec<(i32, usize)> = (0..size)
        .filter(|&r| table[3 * r] == colour)
        .map(|r| (table[3 * r + 1], r))
        .collect();
    // Stable sort: equal keys keep parent rank order.
    entries.sort_by_key(|&(key, _)| key);
    let members = entries
        .iter()
        .map(|&(_, r)| comm.group().member(r).ok_or(Error::NotAMember))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Communicator::from_parts(
        comm.proc().clone(),
        Group::new(members),
        agreed,
    )))
}
