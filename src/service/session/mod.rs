use chrono::{DateTime, Duration, Utc};
use teloxide::types::UserId;

use crate::storage::MemoryCache;

/// Per-user chat preferences. Not persisted, lost on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub audio_enabled: bool,
    pub last_active: DateTime<Utc>,
}

impl Default for UserSession {
    fn default() -> Self {
        Self {
            audio_enabled: false,
            last_active: Utc::now(),
        }
    }
}

// Keeps `now - idle_ttl` representable.
const MAX_IDLE_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct SessionService {
    cache: MemoryCache<UserId, UserSession>,
    idle_ttl: Duration,
}

impl SessionService {
    pub fn new(capacity: usize, idle_ttl_secs: u64) -> Self {
        info!(
            "Initializing SessionService with capacity {} and idle ttl {}s",
            capacity, idle_ttl_secs
        );
        Self {
            cache: MemoryCache::new(capacity),
            idle_ttl: Duration::seconds(i64::try_from(idle_ttl_secs).unwrap_or(i64::MAX).min(MAX_IDLE_TTL_SECS)),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub fn audio_enabled(&self, user_id: UserId) -> bool {
        self.cache.get(&user_id).map(|s| s.audio_enabled).unwrap_or(false)
    }

    /// Flips the audio preference and returns the new value.
    pub fn toggle_audio(&self, user_id: UserId) -> bool {
        let session = self.cache.update(user_id, |session| {
            session.audio_enabled = !session.audio_enabled;
            session.last_active = Utc::now();
        });
        debug!("Audio for user {} is now {}", user_id, session.audio_enabled);
        session.audio_enabled
    }

    pub fn touch(&self, user_id: UserId) {
        let previous = self.cache.get(&user_id).map(|session| session.last_active);
        let now = Utc::now();
        self.cache.update(user_id, |session| session.last_active = now);

        if let Some(previous) = previous {
            debug!("User {} active again after {}s", user_id, (now - previous).num_seconds());
        }
    }

    /// Drops sessions idle for longer than the configured ttl. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        self.evict_inactive_since(Utc::now() - self.idle_ttl)
    }

    fn evict_inactive_since(&self, cutoff: DateTime<Utc>) -> usize {
        let evicted = self.cache.retain(|_, session| session.last_active >= cutoff);
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_toggle_per_user() {
        let sessions = SessionService::new(8, 3600);
        let alice = UserId(1);
        let bob = UserId(2);

        assert!(!sessions.audio_enabled(alice));
        assert!(sessions.toggle_audio(alice));
        assert!(sessions.audio_enabled(alice));
        assert!(!sessions.audio_enabled(bob));

        assert!(!sessions.toggle_audio(alice));
        assert!(!sessions.audio_enabled(alice));
    }

    #[test]
    fn test_touch_keeps_preference() {
        let sessions = SessionService::new(8, 3600);
        let user = UserId(3);

        sessions.touch(user);
        assert!(!sessions.audio_enabled(user));

        sessions.toggle_audio(user);
        sessions.touch(user);
        assert!(sessions.audio_enabled(user));
    }

    #[test]
    fn test_evict_drops_only_idle_sessions() {
        let sessions = SessionService::new(8, 3600);
        let idle = UserId(4);
        let active = UserId(5);

        sessions.toggle_audio(idle);
        let cutoff = Utc::now() + Duration::seconds(1);
        sessions.cache.update(active, |session| {
            session.audio_enabled = true;
            session.last_active = cutoff + Duration::seconds(1);
        });

        assert_eq!(sessions.evict_inactive_since(cutoff), 1);
        assert!(!sessions.audio_enabled(idle));
        assert!(sessions.audio_enabled(active));
    }

    #[test]
    fn test_evict_idle_keeps_fresh_sessions() {
        let sessions = SessionService::new(8, 3600);
        let user = UserId(6);

        sessions.toggle_audio(user);

        assert_eq!(sessions.evict_idle(), 0);
        assert!(sessions.audio_enabled(user));
    }
}
