//! The credential slot of a session.
//!
//! # Contract
//!
//! - The store holds at most one [`Credential`].
//! - A credential is *valid* iff it is held and its remaining lifetime is
//!   strictly greater than the minimum lifetime (300 s by default). The
//!   lifetime is read from the credential on every check, never cached.
//! - Writers replace the whole credential under the write lock; readers
//!   clone an `Arc` snapshot. The lock is never held across I/O.
//! - Job operations call [`CredentialStore::valid_credential`] at the moment
//!   of use and never keep the snapshot beyond that call.
//!
//! A store belongs to one session driven by one caller at a time. The lock
//! makes concurrent access memory-safe, but interleaving acquisitions from
//! several threads on the same store gives last-writer-wins semantics.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::{GridError, GridResult};

/// Default minimum remaining lifetime, in seconds, for a proxy to count as valid.
pub const DEFAULT_MIN_LIFETIME_SECS: i64 = 5 * 60;

/// Holds the current proxy credential of a session.
pub struct CredentialStore {
    slot: RwLock<Option<Arc<Credential>>>,
    clock: Arc<dyn Clock>,
    min_lifetime_secs: i64,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new(min_lifetime_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            clock,
            min_lifetime_secs,
        }
    }

    /// Minimum remaining lifetime in seconds.
    pub fn min_lifetime_secs(&self) -> i64 {
        self.min_lifetime_secs
    }

    /// The held credential, if any. Validity is not checked.
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.slot.read().clone()
    }

    /// Swap in a new credential, returning the previous one.
    pub fn replace(&self, credential: Credential) -> Option<Arc<Credential>> {
        self.slot.write().replace(Arc::new(credential))
    }

    /// Drop the held credential.
    pub fn clear(&self) {
        self.slot.write().take();
    }

    /// Remaining lifetime of the held credential in seconds.
    pub fn remaining_lifetime(&self) -> Option<i64> {
        self.current()
            .map(|credential| credential.remaining_lifetime(self.clock.now()))
    }

    /// `true` iff a credential is held and outlives the minimum lifetime.
    pub fn is_valid(&self) -> bool {
        match self.current() {
            Some(credential) => self.check(&credential),
            None => false,
        }
    }

    /// The held credential if it is valid right now.
    ///
    /// # Errors
    ///
    /// [`GridError::NoCredential`] when the slot is empty or the credential
    /// is too close to expiry.
    pub fn valid_credential(&self) -> GridResult<Arc<Credential>> {
        let credential = self.current().ok_or(GridError::NoCredential)?;
        if self.check(&credential) {
            Ok(credential)
        } else {
            Err(GridError::NoCredential)
        }
    }

    /// Replace the credential and require the result to be valid.
    ///
    /// The swap and the validity check happen under one write lock. When the
    /// new credential is already below the minimum lifetime the previous
    /// credential is put back, so the rejected one is never observable.
    ///
    /// # Errors
    ///
    /// [`GridError::CredentialTooShortLived`] for a credential born expired.
    pub fn install(&self, credential: Credential) -> GridResult<Arc<Credential>> {
        let credential = Arc::new(credential);
        let mut slot = self.slot.write();
        let previous = slot.replace(Arc::clone(&credential));

        let remaining = credential.remaining_lifetime(self.clock.now());
        if remaining > self.min_lifetime_secs {
            Ok(credential)
        } else {
            *slot = previous;
            warn!(
                principal = credential.principal(),
                remaining, "discarding credential below minimum lifetime"
            );
            Err(GridError::CredentialTooShortLived {
                remaining_secs: remaining,
                min_secs: self.min_lifetime_secs,
            })
        }
    }

    fn check(&self, credential: &Credential) -> bool {
        let lifetime = credential.remaining_lifetime(self.clock.now());
        debug!(principal = credential.principal(), lifetime, "checking proxy lifetime");
        lifetime > self.min_lifetime_secs
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LIFETIME_SECS, Arc::new(SystemClock))
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("credential", &self.current())
            .field("min_lifetime_secs", &self.min_lifetime_secs)
            .finish()
    }
}
