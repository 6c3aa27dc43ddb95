/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Minimal multi-process smoke run: bootstrap a TCP world from the
//! `MPCOMM_*` environment, allreduce a per-rank value, and print the sum.
//!
//! Launch one process per rank, e.g. for a two-process world:
//!
//! ```text
//! MPCOMM_PEERS=127.0.0.1:29500,127.0.0.1:29501 MPCOMM_RANK=0 world_sum &
//! MPCOMM_PEERS=127.0.0.1:29500,127.0.0.1:29501 MPCOMM_RANK=1 world_sum
//! ```

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = mpcomm::config::Config::from_env().context("loading MPCOMM_* environment")?;
    let proc = mpcomm::Proc::bootstrap(&config).await?;
    let world = proc.world();
    let rank = world.rank().context("not a world member")?;

    let mut sum = [0i64];
    world
        .allreduce(
            &[rank as i64 + 1],
            &mut sum,
            1,
            &mpcomm::datatype::LONG,
            &mpcomm::Op::Sum,
        )
        .await?;
    println!("rank {} of {}: sum of (rank + 1) = {}", rank, world.size(), sum[0]);

    world.barrier().await?;
    Ok(())
}
