//! Pending/running bookkeeping for library refreshes.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCategory {
    /// Re-ingest the whole media-center library
    Kodi,
    /// Tracking-service refresh
    Trakt,
    Movies,
    Shows,
    Episodes,
    /// Rewrite show placeholders for new episodes
    KodiShows,
    Overall,
}

impl RefreshCategory {
    /// Start order when several categories are pending.
    pub const PRIORITY: [RefreshCategory; 7] = [
        RefreshCategory::Kodi,
        RefreshCategory::Trakt,
        RefreshCategory::Movies,
        RefreshCategory::Shows,
        RefreshCategory::Episodes,
        RefreshCategory::KodiShows,
        RefreshCategory::Overall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshCategory::Kodi => "kodi",
            RefreshCategory::Trakt => "trakt",
            RefreshCategory::Movies => "movies",
            RefreshCategory::Shows => "shows",
            RefreshCategory::Episodes => "episodes",
            RefreshCategory::KodiShows => "kodi_shows",
            RefreshCategory::Overall => "overall",
        }
    }
}

impl fmt::Display for RefreshCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Flags {
    pending: HashSet<RefreshCategory>,
    running: HashSet<RefreshCategory>,
}

/// Which refreshes are requested and which one is running.
///
/// At most one refresh runs at a time. Requests made while an `Overall`
/// refresh runs stay pending and start once it finishes.
#[derive(Debug, Default)]
pub struct RefreshStatus {
    flags: Mutex<Flags>,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a category pending. Returns false when it is already running.
    pub fn request(&self, category: RefreshCategory) -> bool {
        let mut flags = self.flags();
        if flags.running.contains(&category) {
            return false;
        }
        flags.pending.insert(category);
        true
    }

    pub fn is_pending(&self, category: RefreshCategory) -> bool {
        self.flags().pending.contains(&category)
    }

    pub fn is_running(&self, category: RefreshCategory) -> bool {
        self.flags().running.contains(&category)
    }

    pub fn is_idle(&self) -> bool {
        self.flags().running.is_empty()
    }

    /// The category that would start next, if nothing is running.
    pub fn next_pending(&self) -> Option<RefreshCategory> {
        let flags = self.flags();
        if !flags.running.is_empty() {
            return None;
        }
        RefreshCategory::PRIORITY
            .into_iter()
            .find(|c| flags.pending.contains(c))
    }

    /// Moves the next pending category to running.
    pub fn start_next(self: &Arc<Self>) -> Option<RunGuard> {
        let mut flags = self.flags();
        if !flags.running.is_empty() {
            return None;
        }
        let category = RefreshCategory::PRIORITY
            .into_iter()
            .find(|c| flags.pending.contains(c))?;
        flags.pending.remove(&category);
        flags.running.insert(category);
        Some(RunGuard {
            status: Arc::clone(self),
            category,
        })
    }

    /// Starts a category directly, bypassing the pending queue.
    pub fn start(self: &Arc<Self>, category: RefreshCategory) -> RunGuard {
        let mut flags = self.flags();
        flags.pending.remove(&category);
        flags.running.insert(category);
        RunGuard {
            status: Arc::clone(self),
            category,
        }
    }
}

/// Clears the running flag when the refresh ends, however it ends.
#[derive(Debug)]
pub struct RunGuard {
    status: Arc<RefreshStatus>,
    category: RefreshCategory,
}

impl RunGuard {
    pub fn category(&self) -> RefreshCategory {
        self.category
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.status.flags().running.remove(&self.category);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let status = Arc::new(RefreshStatus::new());
        status.request(RefreshCategory::Overall);
        status.request(RefreshCategory::Shows);
        status.request(RefreshCategory::Trakt);

        assert_eq!(status.next_pending(), Some(RefreshCategory::Trakt));
        let guard = status.start_next().unwrap();
        assert_eq!(guard.category(), RefreshCategory::Trakt);
        assert!(status.start_next().is_none());
        drop(guard);

        assert_eq!(status.start_next().unwrap().category(), RefreshCategory::Shows);
        assert_eq!(status.start_next().unwrap().category(), RefreshCategory::Overall);
        assert!(status.start_next().is_none());
    }

    #[test]
    fn test_request_while_running_is_ignored() {
        let status = Arc::new(RefreshStatus::new());
        let guard = status.start(RefreshCategory::Kodi);
        assert!(!status.request(RefreshCategory::Kodi));
        assert!(!status.is_pending(RefreshCategory::Kodi));
        drop(guard);
        assert!(status.request(RefreshCategory::Kodi));
    }

    #[test]
    fn test_requests_during_overall_are_deferred() {
        let status = Arc::new(RefreshStatus::new());
        let overall = status.start(RefreshCategory::Overall);

        assert!(status.request(RefreshCategory::Movies));
        assert!(status.request(RefreshCategory::Kodi));
        assert_eq!(status.next_pending(), None);
        assert!(status.is_pending(RefreshCategory::Movies));

        drop(overall);
        assert!(status.is_idle());
        assert_eq!(status.start_next().unwrap().category(), RefreshCategory::Kodi);
    }

    #[test]
    fn test_guard_clears_running_on_panic() {
        let status = Arc::new(RefreshStatus::new());
        let cloned = status.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.start(RefreshCategory::Trakt);
            panic!("refresh failed");
        });
        assert!(result.is_err());
        assert!(!status.is_running(RefreshCategory::Trakt));
    }

    #[test]
    fn test_category_names() {
        assert_eq!(RefreshCategory::KodiShows.to_string(), "kodi_shows");
        assert_eq!(serde_json::to_string(&RefreshCategory::Overall).unwrap(), "\"overall\"");
    }
}
