/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Request handles for non-blocking operations. Each operation runs on its
//! own spawned task; the handle joins it. A request observed complete
//! (through `wait` or a successful `test`) becomes inert.

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::comm::Communicator;
use crate::comm::SendMode;
use crate::datatype::Element;
use crate::error::Error;
use crate::error::Result;
use crate::status::Status;

/// A pending non-blocking operation producing `O` (send operations produce
/// `()`; receives produce the delivered elements).
#[derive(Debug)]
pub struct Request<O = ()> {
    handle: Option<JoinHandle<Result<(O, Status)>>>,
}

impl<O: Send + 'static> Request<O> {
    pub(crate) fn spawn<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<(O, Status)>> + Send + 'static,
    {
        Request {
            handle: Some(tokio::spawn(fut)),
        }
    }

    /// Whether the operation has finished (successfully or not). Inert
    /// requests report complete.
    pub fn is_complete(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the operation completes.
    pub async fn wait(mut self) -> Result<(O, Status)> {
        let handle = self.handle.take().ok_or(Error::InactiveRequest)?;
        handle.await?
    }

    /// Complete without blocking if the operation has finished; otherwise
    /// leave the request pending.
    pub fn test(&mut self) -> Result<Option<(O, Status)>> {
        match &self.handle {
            None => Err(Error::InactiveRequest),
            Some(handle) if !handle.is_finished() => Ok(None),
            Some(_) => {
                let handle = self.handle.take().ok_or(Error::InactiveRequest)?;
                match handle.now_or_never() {
                    Some(joined) => joined?.map(Some),
                    // A finished handle resolves immediately.
                    None => Err(Error::Task("finished task did not resolve".into())),
                }
            }
        }
    }
}

/// Wait for every request, in order. Each status carries its index within
/// the input.
pub async fn wait_all<O: Send + 'static>(requests: Vec<Request<O>>) -> Result<Vec<(O, Status)>> {
    let mut outputs = Vec::with_capacity(requests.len());
    for (index, request) in requests.into_iter().enumerate() {
        let (output, mut status) = request.wait().await?;
        status.index = Some(index);
        outputs.push((output, status));
    }
    Ok(outputs)
}

/// Complete every request if all have finished; otherwise leave the list
/// untouched.
pub fn test_all<O: Send + 'static>(
    requests: &mut Vec<Request<O>>,
) -> Result<Option<Vec<(O, Status)>>> {
    if !requests.iter().all(Request::is_complete) {
        return Ok(None);
    }
    let mut outputs = Vec::with_capacity(requests.len());
    for (index, mut request) in std::mem::take(requests).into_iter().enumerate() {
        let (output, mut status) = request
            .test()?
            .ok_or_else(|| Error::Task("finished task did not resolve".into()))?;
        status.index = Some(index);
        outputs.push((output, status));
    }
    Ok(Some(outputs))
}

/// Wait until any request completes; remove it from the list and return
/// its index, output, and status.
pub async fn wait_any<O: Send + 'static>(
    requests: &mut Vec<Request<O>>,
) -> Result<(usize, O, Status)> {
    if requests.is_empty() {
        return Err(Error::InvalidArgument("empty request list".into()));
    }
    loop {
        if let Some(found) = test_any(requests)? {
            return Ok(found);
        }
        tokio::task::yield_now().await;
    }
}

/// Complete one finished request, if any, removing it from the list.
pub fn test_any<O: Send + 'static>(
    requests: &mut Vec<Request<O>>,
) -> Result<Option<(usize, O, Status)>> {
    for index in 0..requests.len() {
        if requests[index].is_complete() {
            let mut request = requests.remove(index);
            let (output, mut status) = request
                .test()?
                .ok_or_else(|| Error::Task("finished task did not resolve".into()))?;
            status.index = Some(index);
            return Ok(Some((index, output, status)));
        }
    }
    Ok(None)
}

/// A reusable send: the arguments (and a snapshot of the data) are bound at
/// init time; every `start` launches a fresh request.
#[derive(Debug, Clone)]
pub struct SendInit<T: Element> {
    comm: Communicator,
    data: Vec<T>,
    dest: i32,
    tag: i32,
    mode: SendMode,
}

impl<T: Element> SendInit<T> {
    pub(crate) fn new(
        comm: Communicator,
        data: Vec<T>,
        dest: i32,
        tag: i32,
        mode: SendMode,
    ) -> Self {
        SendInit {
            comm,
            data,
            dest,
            tag,
            mode,
        }
    }

    /// Launch one send of the bound data.
    pub fn start(&self) -> Request<()> {
        self.comm
            .isend_mode_elements(self.data.clone(), self.dest, self.tag, self.mode)
    }
}

/// A reusable receive: every `start` posts a fresh receive with the bound
/// arguments.
#[derive(Debug, Clone)]
pub struct RecvInit<T: Element> {
    comm: Communicator,
    slots: usize,
    source: i32,
    tag: i32,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Element> RecvInit<T> {
    pub(crate) fn new(comm: Communicator, slots: usize, source: i32, tag: i32) -> Self {
        RecvInit {
            comm,
            slots,
            source,
            tag,
            _marker: std::marker::PhantomData,
        }
    }

    /// Launch one receive into a fresh buffer.
    pub fn start(&self) -> Request<Vec<T>> {
        self.comm
            .irecv_elements(self.slots, self.source, self.tag)
    }
}
