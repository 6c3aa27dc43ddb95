/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! In-process transport: endpoint pairs wired directly over mpsc. Used for
//! a process's loopback link and for simulated multi-process worlds in
//! tests.

use super::Rx;
use super::Tx;

/// A direct in-process link.
pub fn link() -> (Tx, Rx) {
    super::pair()
}

/// Wire `n` fully-connected in-process endpoints. The result has one entry
/// per process; entry `i` holds, for every peer `j` (self included), the
/// sender `i -> j` and the receiver carrying frames `j -> i`.
pub fn full_mesh(n: usize) -> Vec<Vec<(Tx, Rx)>> {
    let mut txs: Vec<Vec<Tx>> = Vec::with_capacity(n);
    let mut rxs: Vec<Vec<Option<Rx>>> = (0..n).map(|_| (0..n).map(|_| None).collect()).collect();
    for i in 0..n {
        let mut row = Vec::with_capacity(n);
        for j in 0..n {
            let (tx, rx) = link();
            row.push(tx);
            rxs[j][i] = Some(rx);
        }
        txs.push(row);
    }
    txs.into_iter()
        .zip(rxs)
        .map(|(tx_row, rx_row)| {
            tx_row
                .into_iter()
                .zip(rx_row)
                .map(|(tx, rx)| (tx, rx.expect("mesh wiring is total")))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::channel::Frame;
    use crate::datatype::BaseType;
    use crate::envelope::Envelope;

    fn frame(tag: i32) -> Frame {
        Frame {
            envelope: Envelope {
                tag,
                context_id: 0,
                buffered: false,
                base: BaseType::Byte,
                count: 0,
            },
            payload: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn mesh_routes_by_pair() {
        let mut mesh = full_mesh(3);
        // 0 -> 2 and 1 -> 2 use distinct links into 2's inbox row.
        mesh[0][2].0.post(frame(10)).unwrap();
        mesh[1][2].0.post(frame(11)).unwrap();
        assert_eq!(mesh[2][0].1.recv().await.unwrap().envelope.tag, 10);
        assert_eq!(mesh[2][1].1.recv().await.unwrap().envelope.tag, 11);
        // Self link.
        mesh[1][1].0.post(frame(7)).unwrap();
        assert_eq!(mesh[1][1].1.recv().await.unwrap().envelope.tag, 7);
    }
}
