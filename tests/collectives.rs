/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Collective semantics over simulated in-process worlds.

use std::future::Future;

use mpcomm::CommRelation;
use mpcomm::Communicator;
use mpcomm::Obj;
use mpcomm::Op;
use mpcomm::Proc;
use mpcomm::ProcessId;
use mpcomm::ReduceOp;
use mpcomm::datatype::Datatype;
use mpcomm::datatype::ELEMENT;
use mpcomm::datatype::INT;
use mpcomm::datatype::INT2;

/// Run one task per simulated process; results come back in rank order.
async fn simulate<F, Fut, T>(n: usize, f: F) -> Vec<T>
where
    F: Fn(Proc) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut tasks = tokio::task::JoinSet::new();
    for (rank, proc) in Proc::local_mesh(n).unwrap().into_iter().enumerate() {
        let f = f.clone();
        tasks.spawn(async move { (rank, f(proc).await) });
    }
    let mut out: Vec<Option<T>> = (0..n).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (rank, value) = joined.unwrap();
        out[rank] = Some(value);
    }
    out.into_iter().map(|v| v.unwrap()).collect()
}

#[tokio::test]
async fn barrier_holds_until_everyone_arrives() {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    let arrived = Arc::new(AtomicUsize::new(0));
    let counts = {
        let arrived = arrived.clone();
        simulate(4, move |proc| {
            let arrived = arrived.clone();
            async move {
                let world = proc.world();
                if proc.rank() == 3 {
                    // Straggler: everyone else must still be inside the
                    // barrier when we arrive.
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
                arrived.fetch_add(1, Ordering::SeqCst);
                world.barrier().await.unwrap();
                arrived.load(Ordering::SeqCst)
            }
        })
        .await
    };
    for count in counts {
        assert_eq!(count, 4);
    }
}

#[tokio::test]
async fn bcast_reaches_every_rank_from_every_root() {
    for n in [1usize, 2, 3, 5, 8] {
        for root in 0..n {
            let out = simulate(n, move |proc| async move {
                let world = proc.world();
                let mut buf = if proc.rank() == root {
                    [root as i32 * 100 + 1, root as i32 * 100 + 2]
                } else {
                    [0, 0]
                };
                world.bcast(&mut buf, 2, &INT, root).await.unwrap();
                buf
            })
            .await;
            for buf in out {
                assert_eq!(buf, [root as i32 * 100 + 1, root as i32 * 100 + 2]);
            }
        }
    }
}

#[tokio::test]
async fn gather_places_blocks_in_rank_order() {
    let out = simulate(4, |proc| async move {
        let world = proc.world();
        let rank = proc.rank() as i32;
        let mine = [rank, rank * 10];
        let mut all = [0i32; 8];
        world.gather(&mine, 2, &mut all, 2, &INT, 2).await.unwrap();
        all
    })
    .await;
    assert_eq!(out[2], [0, 0, 1, 10, 2, 20, 3, 30]);
}

#[tokio::test]
async fn gatherv_places_blocks_at_displacements() {
    let counts = [1usize, 2, 1, 3];
    let displs = [0usize, 1, 3, 4];
    let out = simulate(4, move |proc| async move {
        let world = proc.world();
        let rank = proc.rank();
        let mine: Vec<i32> = (0..counts[rank] as i32).map(|i| rank as i32 * 10 + i).collect();
        let mut all = [-1i32; 7];
        world
            .gatherv(&mine, counts[rank], &mut all, &counts, &displs, &INT, 0)
            .await
            .unwrap();
        all
    })
    .await;
    assert_eq!(out[0], [0, 10, 11, 20, 30, 31, 32]);
}

#[tokio::test]
async fn scatter_and_scatterv_deal_out_blocks() {
    let out = simulate(3, |proc| async move {
        let world = proc.world();
        let src: Vec<i32> = (0..6).collect();
        let mut mine = [0i32; 2];
        world.scatter(&src, 2, &mut mine, 2, &INT, 1).await.unwrap();

        let counts = [3usize, 1, 2];
        let displs = [0usize, 3, 4];
        let mut vmine = vec![0i32; counts[proc.rank()]];
        world
            .scatterv(&src, &counts, &displs, &mut vmine, counts[proc.rank()], &INT, 1)
            .await
            .unwrap();
        (mine, vmine)
    })
    .await;
    assert_eq!(out[0].0, [0, 1]);
    assert_eq!(out[1].0, [2, 3]);
    assert_eq!(out[2].0, [4, 5]);
    assert_eq!(out[0].1, vec![0, 1, 2]);
    assert_eq!(out[1].1, vec![3]);
    assert_eq!(out[2].1, vec![4, 5]);
}

#[tokio::test]
async fn allgather_fills_every_rank() {
    for n in [1usize, 2, 3, 4, 5, 6] {
        let out = simulate(n, move |proc| async move {
            let world = proc.world();
            let rank = proc.rank() as i32;
            let mine = [rank * 2, rank * 2 + 1];
            let mut all = vec![0i32; 2 * n];
            world.allgather(&mine, 2, &mut all, 2, &INT).await.unwrap();
            all
        })
        .await;
        let expected: Vec<i32> = (0..2 * n as i32).collect();
        for all in out {
            assert_eq!(all, expected);
        }
    }
}

#[tokio::test]
async fn allgatherv_forwards_variable_blocks() {
    let counts = [2usize, 1, 3, 1];
    let displs = [0usize, 2, 3, 6];
    let out = simulate(4, move |proc| async move {
        let world = proc.world();
        let rank = proc.rank();
        let mine: Vec<i32> = (0..counts[rank] as i32).map(|i| rank as i32 * 10 + i).collect();
        let mut all = [-1i32; 7];
        world
            .allgatherv(&mine, counts[rank], &mut all, &counts, &displs, &INT)
            .await
            .unwrap();
        all
    })
    .await;
    for all in out {
        assert_eq!(all, [0, 1, 10, 20, 21, 22, 30]);
    }
}

#[tokio::test]
async fn alltoall_transposes_blocks() {
    let out = simulate(4, |proc| async move {
        let world = proc.world();
        let rank = proc.rank() as i32;
        let send: Vec<i32> = (0..4).map(|dest| rank * 10 + dest).collect();
        let mut recv = [0i32; 4];
        world.alltoall(&send, 1, &mut recv, 1, &INT).await.unwrap();
        recv
    })
    .await;
    for (rank, recv) in out.iter().enumerate() {
        let expected: Vec<i32> = (0..4).map(|src| src * 10 + rank as i32).collect();
        assert_eq!(recv.to_vec(), expected);
    }
}

#[tokio::test]
async fn alltoallv_honours_per_pair_shapes() {
    // Rank r sends r+1 elements to every destination.
    let out = simulate(3, |proc| async move {
        let world = proc.world();
        let rank = proc.rank();
        let per = rank + 1;
        let sendcounts = [per; 3];
        let sdispls = [0, per, 2 * per];
        let send: Vec<i32> = (0..3 * per as i32).map(|i| rank as i32 * 100 + i).collect();
        let recvcounts = [1usize, 2, 3];
        let rdispls = [0usize, 1, 3];
        let mut recv = [-1i32; 6];
        world
            .alltoallv(&send, &sendcounts, &sdispls, &mut recv, &recvcounts, &rdispls, &INT)
            .await
            .unwrap();
        recv
    })
    .await;
    for (rank, recv) in out.iter().enumerate() {
        // Block from source s starts at s's sdispl for this destination.
        let expected: Vec<i32> = (0..3)
            .flat_map(|s: i32| {
                let per = s + 1;
                (0..per).map(move |i| s * 100 + rank as i32 * per + i)
            })
            .collect();
        assert_eq!(recv.to_vec(), expected);
    }
}

#[tokio::test]
async fn reduce_and_allreduce_sum() {
    for n in [3usize, 5, 6] {
        let out = simulate(n, move |proc| async move {
            let world = proc.world();
            let rank = proc.rank() as i32;
            let mine = [rank, rank * rank];
            let mut reduced = [0i32; 2];
            world
                .reduce(&mine, &mut reduced, 2, &INT, &Op::Sum, 1)
                .await
                .unwrap();
            let mut everywhere = [0i32; 2];
            world
                .allreduce(&mine, &mut everywhere, 2, &INT, &Op::Sum)
                .await
                .unwrap();
            (reduced, everywhere)
        })
        .await;
        let m = n as i32;
        let sum = m * (m - 1) / 2;
        let squares = (0..m).map(|r| r * r).sum::<i32>();
        for (rank, (reduced, everywhere)) in out.iter().enumerate() {
            assert_eq!(everywhere, &[sum, squares]);
            if rank == 1 {
                assert_eq!(reduced, &[sum, squares]);
            } else {
                // Non-root receive buffers stay untouched.
                assert_eq!(reduced, &[0, 0]);
            }
        }
    }
}

#[tokio::test]
async fn allreduce_maxloc_tracks_the_winning_rank() {
    let values = [3i32, 9, 9, 1, 4];
    let out = simulate(5, move |proc| async move {
        let world = proc.world();
        let rank = proc.rank();
        let mine = [values[rank], rank as i32];
        let mut best = [0i32; 2];
        world
            .allreduce(&mine, &mut best, 1, &INT2, &Op::MaxLoc)
            .await
            .unwrap();
        best
    })
    .await;
    for best in out {
        // Ties resolve to the smaller location.
        assert_eq!(best, [9, 1]);
    }
}

/// Left-to-right string concatenation; deliberately non-commutative.
struct Concat;

impl ReduceOp<Obj<String>> for Concat {
    fn commutative(&self) -> bool {
        false
    }

    fn apply(
        &self,
        src: &[Obj<String>],
        dst: &mut [Obj<String>],
        count: usize,
        _dtype: &Datatype,
    ) -> mpcomm::Result<()> {
        for k in 0..count {
            dst[k] = Obj(format!("{}{}", src[k].0, dst[k].0));
        }
        Ok(())
    }
}

#[tokio::test]
async fn non_commutative_reduction_combines_in_rank_order() {
    for n in [3usize, 5, 6] {
        let out = simulate(n, move |proc| async move {
            let world = proc.world();
            let mine = [Obj(proc.rank().to_string())];
            let mut all = [Obj(String::new())];
            world
                .allreduce(&mine, &mut all, 1, &ELEMENT, &Concat)
                .await
                .unwrap();
            all[0].0.clone()
        })
        .await;
        let expected: String = (0..n).map(|r| r.to_string()).collect();
        for got in out {
            assert_eq!(got, expected);
        }
    }
}

#[tokio::test]
async fn reduce_scatter_deals_out_the_sums() {
    let counts = [1usize, 2, 1];
    let out = simulate(3, move |proc| async move {
        let world = proc.world();
        let rank = proc.rank() as i32;
        let mine: Vec<i32> = (0..4).map(|i| rank * 10 + i).collect();
        let mut share = vec![0i32; counts[proc.rank()]];
        world
            .reduce_scatter(&mine, &mut share, &counts, &INT, &Op::Sum)
            .await
            .unwrap();
        share
    })
    .await;
    // Element-wise sums: [30, 33, 36, 39].
    assert_eq!(out[0], vec![30]);
    assert_eq!(out[1], vec![33, 36]);
    assert_eq!(out[2], vec![39]);
}

#[tokio::test]
async fn scan_yields_inclusive_prefixes() {
    let out = simulate(5, |proc| async move {
        let world = proc.world();
        let rank = proc.rank() as i32;
        let mut prefix = [0i32; 2];
        world
            .scan(&[rank, 1], &mut prefix, 2, &INT, &Op::Sum)
            .await
            .unwrap();
        prefix
    })
    .await;
    for (rank, prefix) in out.iter().enumerate() {
        let r = rank as i32;
        assert_eq!(prefix, &[r * (r + 1) / 2, r + 1]);
    }
}

#[tokio::test]
async fn split_partitions_by_colour_and_orders_by_key() {
    let out = simulate(5, |proc| async move {
        let world = proc.world();
        let rank = proc.rank();
        // Rank 4 opts out; the rest split into parity classes, keyed to
        // reverse the parent order.
        let colour = if rank == 4 { None } else { Some(rank as i32 % 2) };
        let key = -(rank as i32);
        let sub = world.split(colour, key).await.unwrap();
        match sub {
            None => None,
            Some(sub) => {
                let members: Vec<ProcessId> = sub.group().members().to_vec();
                // The split communicator must be usable.
                let mut token = [sub.rank().unwrap() as i32];
                sub.bcast(&mut token, 1, &INT, 0).await.unwrap();
                assert_eq!(token, [0]);
                Some((sub.rank().unwrap(), members))
            }
        }
    })
    .await;
    assert!(out[4].is_none());
    // Keys are negated ranks, so members appear in descending parent rank.
    let evens = vec![ProcessId(2), ProcessId(0)];
    let odds = vec![ProcessId(3), ProcessId(1)];
    assert_eq!(out[0], Some((1, evens.clone())));
    assert_eq!(out[2], Some((0, evens)));
    assert_eq!(out[1], Some((1, odds.clone())));
    assert_eq!(out[3], Some((0, odds)));
}

#[tokio::test]
async fn split_rejects_negative_colours() {
    simulate(2, |proc| async move {
        let world = proc.world();
        // Negative colours collide with the opt-out sentinel; the error is
        // raised before any traffic, so no member hangs.
        assert!(world.split(Some(-1), 0).await.is_err());
    })
    .await;
}

#[tokio::test]
async fn duplicate_and_create_relate_as_expected() {
    simulate(3, |proc| async move {
        let world = proc.world();
        let dup = world.duplicate().unwrap();
        assert_eq!(Communicator::compare(&world, &dup), CommRelation::Congruent);
        assert_eq!(Communicator::compare(&world, &world), CommRelation::Ident);

        let sub = world
            .create(world.group().incl(&[0, 1]).unwrap())
            .unwrap();
        assert_eq!(Communicator::compare(&world, &sub), CommRelation::Unequal);
        if proc.rank() < 2 {
            assert_eq!(sub.rank(), Some(proc.rank()));
            let mut buf = [proc.rank() as i32];
            sub.bcast(&mut buf, 1, &INT, 1).await.unwrap();
            assert_eq!(buf, [1]);
        } else {
            assert_eq!(sub.rank(), None);
        }
    })
    .await;
}
