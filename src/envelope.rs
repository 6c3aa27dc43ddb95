/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Message envelopes and the per-peer unexpected-message queue.

use std::collections::VecDeque;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::ANY_TAG;
use crate::datatype::BaseType;

/// Matching metadata carried ahead of every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender-chosen tag. Collective-internal traffic uses negative tags,
    /// which `ANY_TAG` never matches.
    pub tag: i32,
    /// Context id of the communicator the message was sent on.
    pub context_id: i32,
    /// Whether the payload passed through the sender's attached buffer.
    pub buffered: bool,
    /// Base type of the payload elements.
    pub base: BaseType,
    /// Number of base elements in the payload.
    pub count: usize,
}

impl Envelope {
    /// The matching predicate: context ids must be equal; the requested tag
    /// must be equal to the envelope's, or be `ANY_TAG` — which matches only
    /// non-negative envelope tags, so collective traffic stays invisible to
    /// wildcard receives.
    pub fn matches(&self, context_id: i32, tag: i32) -> bool {
        self.context_id == context_id
            && (self.tag == tag || (tag == ANY_TAG && self.tag >= 0))
    }
}

/// Messages that arrived before a matching receive was posted, in arrival
/// order. Entries that never match (for example, sent on a context id no
/// receiver asks for again) are retained indefinitely; there is no eviction.
#[derive(Debug, Default)]
pub(crate) struct EnvelopeQueue {
    entries: VecDeque<(Envelope, Bytes)>,
}

impl EnvelopeQueue {
    /// Append a message that no pending receive wanted.
    pub(crate) fn push(&mut self, envelope: Envelope, payload: Bytes) {
        self.entries.push_back((envelope, payload));
    }

    /// Remove and return the oldest entry matching `(context_id, tag)`.
    pub(crate) fn take_match(&mut self, context_id: i32, tag: i32) -> Option<(Envelope, Bytes)> {
        let pos = self
            .entries
            .iter()
            .position(|(env, _)| env.matches(context_id, tag))?;
        self.entries.remove(pos)
    }

    /// Peek the oldest matching entry without removing it.
    pub(crate) fn probe_match(&self, context_id: i32, tag: i32) -> Option<&Envelope> {
        self.entries
            .iter()
            .map(|(env, _)| env)
            .find(|env| env.matches(context_id, tag))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(tag: i32, context_id: i32) -> Envelope {
        Envelope {
            tag,
            context_id,
            buffered: false,
            base: BaseType::Int,
            count: 0,
        }
    }

    #[test]
    fn matching_is_by_context_and_tag() {
        assert!(env(7, 0).matches(0, 7));
        assert!(!env(7, 0).matches(1, 7));
        assert!(!env(7, 0).matches(0, 8));
    }

    #[test]
    fn any_tag_skips_negative_tags() {
        assert!(env(0, 0).matches(0, ANY_TAG));
        assert!(env(42, 0).matches(0, ANY_TAG));
        // Collective-internal traffic is invisible to wildcards.
        assert!(!env(-2, 0).matches(0, ANY_TAG));
    }

    #[test]
    fn queue_is_fifo_per_match() {
        let mut q = EnvelopeQueue::default();
        q.push(env(1, 0), Bytes::from_static(b"a"));
        q.push(env(2, 0), Bytes::from_static(b"b"));
        q.push(env(1, 0), Bytes::from_static(b"c"));

        let (e, p) = q.take_match(0, 1).unwrap();
        assert_eq!(e.tag, 1);
        assert_eq!(&p[..], b"a");

        // Wildcard sees the oldest remaining non-negative tag.
        let (e, p) = q.take_match(0, ANY_TAG).unwrap();
        assert_eq!(e.tag, 2);
        assert_eq!(&p[..], b"b");

        assert!(q.probe_match(0, 2).is_none());
        assert_eq!(q.len(), 1);
    }
}
