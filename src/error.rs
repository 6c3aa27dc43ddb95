/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The error taxonomy of the library. Usage errors are raised synchronously
//! to the caller; transport errors are wrapped and re-raised carrying the
//! underlying cause. There is no partial-failure recovery: a collective that
//! fails on one participant leaves the group in an undefined state.

use crate::channel::ChannelError;
use crate::datatype::BaseType;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by communicator operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A rank outside the communicator's group was named.
    #[error("invalid rank {rank} for group of size {size}")]
    InvalidRank {
        /// The offending rank.
        rank: i32,
        /// The size of the group.
        size: usize,
    },

    /// A root rank outside the communicator's group was named.
    #[error("invalid root rank {root} for group of size {size}")]
    InvalidRoot {
        /// The offending root.
        root: usize,
        /// The size of the group.
        size: usize,
    },

    /// The calling process is not a member of the communicator's group.
    #[error("calling process is not a member of this group")]
    NotAMember,

    /// The element type of a buffer does not agree with the datatype
    /// passed alongside it, or with the arriving message.
    #[error("datatype mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch {
        /// The base type demanded by the operation.
        expected: BaseType,
        /// The base type actually supplied.
        got: BaseType,
    },

    /// The named operation exists for API compatibility but is not
    /// implemented. Never silently wrong: it always fails.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A reduction operator was applied to a type it is not defined for.
    #[error("operator {op} is not defined for {base:?}")]
    UnsupportedOp {
        /// Name of the operator.
        op: &'static str,
        /// The base type it was applied to.
        base: BaseType,
    },

    /// A context id proposal was not strictly greater than the highest
    /// committed id.
    #[error("context id {0} is already in use or not allowed")]
    ContextId(i32),

    /// A buffered-mode send was attempted with no buffer attached.
    #[error("no user buffer attached for buffered-mode send")]
    NoAttachedBuffer,

    /// A source buffer ran out mid-element while decoding.
    #[error("buffer exhausted while decoding element")]
    BufferExhausted,

    /// The request was already completed and observed; it is inert.
    #[error("request already completed")]
    InactiveRequest,

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// A malformed argument (zero repetition count, zero range stride, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A transport failure underneath an operation.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Payload encode/decode failure for the generic element type.
    #[error(transparent)]
    Codec(#[from] Box<bincode::ErrorKind>),

    /// An internal task failed (panicked or was aborted).
    #[error("operation task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}
