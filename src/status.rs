/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Completion metadata for receives and probes.

use serde::Deserialize;
use serde::Serialize;

use crate::PROC_NULL;

/// An immutable snapshot describing a completed (or probed) message.
///
/// `count` is the number of base elements delivered; when a message is
/// truncated into a smaller receive buffer, `count` reports the delivered
/// count, not the sent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Group-relative rank of the sender.
    pub source: i32,
    /// Tag the message was sent with.
    pub tag: i32,
    /// Number of base elements delivered.
    pub count: usize,
    /// Delivered size in bytes (per the base type's wire width).
    pub size: usize,
    /// For bulk completion operations, the index of the request within
    /// the array it completed from.
    pub index: Option<usize>,
}

impl Status {
    /// Status of an operation on `PROC_NULL`: nothing was transferred.
    pub(crate) fn proc_null() -> Self {
        Status {
            source: PROC_NULL,
            tag: 0,
            count: 0,
            size: 0,
            index: None,
        }
    }

    /// Status of a completed send of `count` elements.
    pub(crate) fn sent(count: usize, size: usize, tag: i32) -> Self {
        Status {
            source: PROC_NULL,
            tag,
            count,
            size,
            index: None,
        }
    }
}
