use std::collections::HashMap;
use std::sync::Arc;

use padsync_common::identity::DocumentIdentity;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::engine::pad::Pad;
use crate::host::HostDocument;

/// Lifecycle of one identity's pad.
pub enum PadSlot {
    Uninitialized,
    Active(ActivePad),
}

impl PadSlot {
    pub fn active(&self) -> Option<&ActivePad> {
        match self {
            Self::Active(active) => Some(active),
            Self::Uninitialized => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActivePad> {
        match self {
            Self::Active(active) => Some(active),
            Self::Uninitialized => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// A pad plus, for content identities, the host document it is bound to.
/// Run pads have no backing document.
pub struct ActivePad {
    pub pad: Pad,
    pub document: Option<HostDocument>,
}

pub type PadGuard = OwnedMutexGuard<PadSlot>;

/// One exclusive region per identity, created on first use.
///
/// Holding a [`PadGuard`] serializes every operation on that identity.
/// The map lock is held only long enough to find or insert the region, so
/// different identities never wait on each other.
#[derive(Default)]
pub struct PadRegistry {
    slots: Mutex<HashMap<DocumentIdentity, Arc<Mutex<PadSlot>>>>,
}

impl PadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, identity: &DocumentIdentity) -> PadGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(
                slots
                    .entry(identity.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(PadSlot::Uninitialized))),
            )
        };
        slot.lock_owned().await
    }

    /// Identities with a region, sorted by key.
    pub async fn identities(&self) -> Vec<DocumentIdentity> {
        let mut identities: Vec<_> = self.slots.lock().await.keys().cloned().collect();
        identities.sort_by_key(ToString::to_string);
        identities
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
