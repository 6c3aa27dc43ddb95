/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Bootstrap configuration. Read from the environment by convention:
//!
//! - `MPCOMM_RANK`: this process's world rank
//! - `MPCOMM_PEERS`: comma-separated socket addresses, one per rank
//! - `MPCOMM_MAX_FRAME_LENGTH`: inbound frame size limit in bytes
//! - `MPCOMM_CONNECT_ATTEMPTS`: dial retry budget
//! - `MPCOMM_CONNECT_BACKOFF_MS`: delay between dial attempts

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Error;
use crate::error::Result;

/// Transport tunables.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_length: usize,
    /// How many times to retry a dial before giving up.
    pub connect_attempts: u32,
    /// Delay between dial attempts.
    pub connect_backoff: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            max_frame_length: 64 * 1024 * 1024,
            connect_attempts: 30,
            connect_backoff: Duration::from_millis(250),
        }
    }
}

/// Everything a process needs to join a world over TCP.
#[derive(Debug, Clone)]
pub struct Config {
    /// This process's world rank.
    pub rank: usize,
    /// One listen address per rank, identical on every process.
    pub peers: Vec<SocketAddr>,
    /// Transport tunables.
    pub net: NetConfig,
}

impl Config {
    /// Read the configuration from the environment.
    pub fn from_env() -> Result<Config> {
        let rank: usize = required("MPCOMM_RANK")?
            .parse()
            .map_err(|_| Error::Config("MPCOMM_RANK must be an unsigned integer".into()))?;
        let peers: Vec<SocketAddr> = required("MPCOMM_PEERS")?
            .split(',')
            .map(|addr| {
                addr.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("bad peer address {addr:?}")))
            })
            .collect::<Result<_>>()?;
        if peers.is_empty() {
            return Err(Error::Config("MPCOMM_PEERS must name at least one peer".into()));
        }
        if rank >= peers.len() {
            return Err(Error::Config(format!(
                "MPCOMM_RANK {} out of range for {} peers",
                rank,
                peers.len()
            )));
        }

        let mut net = NetConfig::default();
        if let Some(value) = optional("MPCOMM_MAX_FRAME_LENGTH")? {
            net.max_frame_length = value;
        }
        if let Some(value) = optional("MPCOMM_CONNECT_ATTEMPTS")? {
            net.connect_attempts = value;
        }
        if let Some(value) = optional("MPCOMM_CONNECT_BACKOFF_MS")? {
            net.connect_backoff = Duration::from_millis(value);
        }
        Ok(Config { rank, peers, net })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Config(format!("{key} is not set")))
}

fn optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an unparseable value {value:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let net = NetConfig::default();
        assert!(net.max_frame_length > 0);
        assert!(net.connect_attempts > 0);
    }
}
