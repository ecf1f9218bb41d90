/*!
 * Outpoint
 * A process's published willingness to accept pipe connections
 */

use super::super::types::{PipeClass, PipeSubclass};
use crate::core::limits::UNLIMITED_CONNECTIONS;
use crate::core::types::{Pid, ThreadRef};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct Outpoint {
    pub owner: Pid,
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    /// Positive limit or `UNLIMITED_CONNECTIONS`
    pub max_connections: i32,
    pub connections: u32,
    /// Threads waiting for the next connection, in registration order
    pub(crate) waiting: VecDeque<ThreadRef>,
}

impl Outpoint {
    pub(crate) fn new(owner: Pid, class: PipeClass, subclass: PipeSubclass, max_connections: i32) -> Self {
        Self {
            owner,
            class,
            subclass,
            max_connections,
            connections: 0,
            waiting: VecDeque::new(),
        }
    }

    #[inline]
    pub fn matches(&self, owner: Pid, class: PipeClass, subclass: PipeSubclass) -> bool {
        self.owner == owner && self.class == class && self.subclass == subclass
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.max_connections == UNLIMITED_CONNECTIONS
    }

    /// Whether another connection may still be made
    #[inline]
    pub fn has_capacity(&self) -> bool {
        self.is_unlimited() || i64::from(self.connections) < i64::from(self.max_connections)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn stats(&self) -> OutpointStats {
        OutpointStats {
            owner: self.owner,
            class: self.class,
            subclass: self.subclass,
            max_connections: self.max_connections,
            connections: self.connections,
            waiting: self.waiting.len(),
        }
    }
}

/// Outpoint snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutpointStats {
    pub owner: Pid,
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    pub max_connections: i32,
    pub connections: u32,
    pub waiting: usize,
}
