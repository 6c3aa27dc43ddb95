/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! `mpcomm` is a message-passing runtime in the MPI tradition: processes
//! are organized into ordered [groups](group::Group); a
//! [communicator](comm::Communicator) scopes traffic to a group and an
//! isolated context; point-to-point messages are matched on
//! `(source, tag, context)` envelopes with wildcard support; and the usual
//! collective operations (broadcast, gather/scatter, allgather, alltoall,
//! reductions, scan, split) run over the same matched channels on reserved
//! tags.
//!
//! A process joins a world either over TCP ([`Proc::bootstrap`], driven by
//! [`config::Config`]) or fully in-process ([`Proc::local_mesh`], used by
//! the test suite to simulate whole worlds). Blocking operations are
//! `async fn`s; non-blocking ones return [`Request`] handles backed by
//! spawned tasks.
//!
//! ```no_run
//! # async fn demo() -> mpcomm::Result<()> {
//! let config = mpcomm::config::Config::from_env()?;
//! let proc = mpcomm::Proc::bootstrap(&config).await?;
//! let world = proc.world();
//!
//! let mut sums = [0i64];
//! world
//!     .allreduce(&[proc.rank() as i64], &mut sums, 1, &mpcomm::datatype::LONG, &mpcomm::Op::Sum)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod channel;
pub(crate) mod coll;
pub mod comm;
pub mod config;
pub mod datatype;
pub(crate) mod engine;
pub mod envelope;
pub mod error;
pub mod group;
pub mod op;
pub mod proc;
pub mod request;
pub mod status;

pub use comm::CommRelation;
pub use comm::Communicator;
pub use comm::SendMode;
pub use datatype::BaseType;
pub use datatype::Datatype;
pub use datatype::Element;
pub use datatype::Obj;
pub use error::Error;
pub use error::Result;
pub use group::Group;
pub use group::GroupRelation;
pub use group::ProcessId;
pub use op::Op;
pub use op::ReduceOp;
pub use proc::Proc;
pub use request::RecvInit;
pub use request::Request;
pub use request::SendInit;
pub use request::test_all;
pub use request::test_any;
pub use request::wait_all;
pub use request::wait_any;
pub use status::Status;

/// Receive from any member of the communicator's group.
pub const ANY_SOURCE: i32 = -777;

/// Match any non-negative tag.
pub const ANY_TAG: i32 = -666;

/// The null process: sends and receives naming it complete immediately
/// without transferring anything.
pub const PROC_NULL: i32 = -1;

/// Sentinel for "no value" in integer-coded protocols (e.g. the colour of
/// a process opting out of a split).
pub const UNDEFINED: i32 = -1;
