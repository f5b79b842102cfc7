//! Caching of process id to username lookups.

use std::{
    sync::{mpsc, Arc, RwLock},
    thread,
    time::Duration,
};

use hashbrown::HashMap;

use super::{sources::IdentitySource, Pid, Uid};
use crate::constants::{UNKNOWN_USER, USERNAME_CACHE_MAX_ENTRIES, USERNAME_LOOKUP_TIMEOUT};

/// A cache mapping process ids to usernames, shared between the samplers and
/// the presentation layer.
///
/// Username lookups can be slow when they are backed by a network directory
/// service (LDAP, AD), so they are done off-thread with a deadline. If the
/// deadline passes, the numeric user id is cached and returned instead, and the
/// lookup thread is abandoned; it finishes on its own and its result is
/// dropped.
pub struct UsernameCache {
    cache: RwLock<HashMap<Pid, Arc<str>>>,
    identity: Arc<dyn IdentitySource>,
    timeout: Duration,
    max_entries: usize,
}

impl std::fmt::Debug for UsernameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernameCache")
            .field("entries", &self.len())
            .field("timeout", &self.timeout)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl UsernameCache {
    /// Creates a cache with the default lookup timeout and size threshold.
    pub fn new(identity: Arc<dyn IdentitySource>) -> Self {
        Self::with_limits(identity, USERNAME_LOOKUP_TIMEOUT, USERNAME_CACHE_MAX_ENTRIES)
    }

    pub fn with_limits(
        identity: Arc<dyn IdentitySource>, timeout: Duration, max_entries: usize,
    ) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            identity,
            timeout,
            max_entries,
        }
    }

    /// Returns the username owning `pid`.
    ///
    /// This never blocks for much longer than the lookup timeout. If the owner
    /// can't be determined at all, `"?"` is returned and nothing is cached. If
    /// the username lookup fails or times out, the numeric user id is returned.
    pub fn get_username(&self, pid: Pid) -> Arc<str> {
        if let Some(username) = self.read().get(&pid) {
            return username.clone();
        }

        let Some(uid) = self.identity.uid_of(pid) else {
            return UNKNOWN_USER.into();
        };

        if let Some(username) = self.username_of_cached_uid(pid, uid) {
            self.write().insert(pid, username.clone());
            return username;
        }

        let username = self.lookup_with_timeout(uid);
        self.write().insert(pid, username.clone());

        username
    }

    /// Looks for another cached process owned by `uid` and returns its username.
    ///
    /// The scan and the following insert are not atomic; at worst a racing
    /// caller does one more full lookup.
    fn username_of_cached_uid(&self, pid: Pid, uid: Uid) -> Option<Arc<str>> {
        self.read()
            .iter()
            .filter(|(cached_pid, _)| **cached_pid != pid)
            .find(|(cached_pid, _)| self.identity.uid_of(**cached_pid) == Some(uid))
            .map(|(_, username)| username.clone())
    }

    fn lookup_with_timeout(&self, uid: Uid) -> Arc<str> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let identity = self.identity.clone();

        let spawned = thread::Builder::new()
            .name("mim-user-lookup".into())
            .spawn(move || {
                // The receiver is gone if we timed out, which is fine.
                let _ = sender.send(identity.username_of(uid));
            });

        if let Err(err) = spawned {
            log::warn!("Failed to spawn a username lookup for uid {uid}: {err}");
            return uid.to_string().into();
        }

        match receiver.recv_timeout(self.timeout) {
            Ok(Some(username)) => username.into(),
            Ok(None) => uid.to_string().into(),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::debug!(
                    "Username lookup for uid {uid} took longer than {:?}, using the uid.",
                    self.timeout
                );
                uid.to_string().into()
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => uid.to_string().into(),
        }
    }

    /// Drops every entry if the cache has grown past its size threshold.
    pub fn clear(&self) {
        let mut cache = self.write();
        if cache.len() > self.max_entries {
            log::debug!("Clearing {} cached usernames.", cache.len());
            cache.clear();
        }
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Pid, Arc<str>>> {
        self.cache
            .read()
            .expect("username cache lock should not be poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Pid, Arc<str>>> {
        self.cache
            .write()
            .expect("username cache lock should not be poisoned")
    }
}
