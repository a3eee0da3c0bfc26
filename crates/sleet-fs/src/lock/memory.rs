use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use super::{LeaseBackend, LockMessage};
use crate::error::{FsError, FsResult};

#[derive(Debug)]
struct Lease {
    id: String,
    expires: Instant,
}

#[derive(Debug, Default)]
struct State {
    lease: Option<Lease>,
    message: Option<LockMessage>,
}

/// In-process lease, shared by every handle of a [`crate::MemoryBackend`].
#[derive(Debug, Default)]
pub struct MemoryLeaseBackend {
    state: Mutex<State>,
}

impl MemoryLeaseBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired lease is currently held.
    pub fn is_leased(&self) -> bool {
        self.with_state(|state| {
            state
                .lease
                .as_ref()
                .is_some_and(|lease| lease.expires > Instant::now())
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn lost(lease_id: &str) -> FsError {
        FsError::LeaseLost(lease_id.to_string())
    }
}

#[async_trait]
impl LeaseBackend for MemoryLeaseBackend {
    async fn ensure_exists(&self) -> FsResult<()> {
        Ok(())
    }

    async fn try_acquire(&self, duration: Duration) -> FsResult<Option<String>> {
        Ok(self.with_state(|state| {
            let now = Instant::now();
            if state.lease.as_ref().is_some_and(|lease| lease.expires > now) {
                return None;
            }
            let id = Uuid::new_v4().to_string();
            state.lease = Some(Lease {
                id: id.clone(),
                expires: now + duration,
            });
            state.message = None;
            Some(id)
        }))
    }

    async fn renew(&self, lease_id: &str, duration: Duration) -> FsResult<()> {
        self.with_state(|state| {
            match state.lease.as_mut() {
                Some(lease) if lease.id == lease_id => {
                    lease.expires = Instant::now() + duration;
                    Ok(())
                }
                _ => Err(Self::lost(lease_id)),
            }
        })
    }

    async fn release(&self, lease_id: &str) -> FsResult<()> {
        self.with_state(|state| {
            match state.lease.as_ref() {
                Some(lease) if lease.id == lease_id => {
                    state.lease = None;
                    state.message = None;
                    Ok(())
                }
                _ => Err(Self::lost(lease_id)),
            }
        })
    }

    async fn read_message(&self) -> FsResult<Option<LockMessage>> {
        Ok(self.with_state(|state| state.message.clone()))
    }

    async fn write_message(&self, lease_id: &str, message: &LockMessage) -> FsResult<()> {
        self.with_state(|state| {
            match state.lease.as_ref() {
                Some(lease) if lease.id == lease_id => {
                    state.message = Some(message.clone());
                    Ok(())
                }
                _ => Err(Self::lost(lease_id)),
            }
        })
    }

    async fn clear_message(&self, lease_id: &str) -> FsResult<()> {
        self.with_state(|state| {
            match state.lease.as_ref() {
                Some(lease) if lease.id == lease_id => {
                    state.message = None;
                    Ok(())
                }
                _ => Err(Self::lost(lease_id)),
            }
        })
    }
}
