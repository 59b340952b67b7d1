//! # Cluster Membership
//!
//! Members join by presenting the cluster's pre-shared secret. The secret is
//! compared in constant time and zeroized when the cluster is dropped.

use crate::BusError;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// A cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    /// Unique member id.
    pub id: String,
    /// Host the member runs on.
    pub host: String,
}

impl Member {
    /// Create a member.
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
        }
    }
}

/// Membership table guarded by a pre-shared secret.
pub struct Cluster {
    secret: Zeroizing<Vec<u8>>,
    members: RwLock<BTreeMap<String, Member>>,
}

impl Cluster {
    /// Create an empty cluster.
    ///
    /// # Errors
    ///
    /// `BusError::EmptySecret` when `secret` is empty.
    pub fn new(secret: &[u8]) -> Result<Self, BusError> {
        if secret.is_empty() {
            return Err(BusError::EmptySecret);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            members: RwLock::new(BTreeMap::new()),
        })
    }

    /// Admit `member` if `secret` matches.
    ///
    /// # Errors
    ///
    /// - `BusError::Rejected` - wrong secret
    /// - `BusError::AlreadyJoined` - the id is taken
    pub fn join(&self, member: Member, secret: &[u8]) -> Result<(), BusError> {
        if !bool::from(self.secret.as_slice().ct_eq(secret)) {
            warn!(member = %member.id, host = %member.host, "[Cluster] Join rejected");
            return Err(BusError::Rejected(member.id));
        }

        let mut members = self.members.write();
        if members.contains_key(&member.id) {
            return Err(BusError::AlreadyJoined(member.id));
        }
        info!(member = %member.id, host = %member.host, "[Cluster] Member joined");
        members.insert(member.id.clone(), member);
        Ok(())
    }

    /// Remove a member. Returns false when it was not joined.
    pub fn leave(&self, id: &str) -> bool {
        let removed = self.members.write().remove(id).is_some();
        if removed {
            info!(member = %id, "[Cluster] Member left");
        }
        removed
    }

    /// Current members ordered by id.
    pub fn members(&self) -> Vec<Member> {
        self.members.read().values().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// True when nobody has joined.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("members", &self.len())
            .finish_non_exhaustive()
    }
}
