use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use crate::auth::token::TokenCodec;
use crate::db::BlacklistStore;
use crate::Result;

/// Width of the session window a single logout-all event covers. A token
/// is revoked when the user's latest revocation expiry is later than the
/// token's own expiry minus this window.
pub const REVOCATION_WINDOW_MINUTES: i64 = 60;

/// Decides whether a token has been revoked by a logout-all for its user.
/// Lookups are keyed by username, never by the raw token.
pub struct RevocationGate {
    codec: Arc<TokenCodec>,
    blacklist: Arc<dyn BlacklistStore>,
}

impl RevocationGate {
    pub fn new(codec: Arc<TokenCodec>, blacklist: Arc<dyn BlacklistStore>) -> Self {
        Self { codec, blacklist }
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        let username = self.codec.subject_of(token)?;
        let entry = match self.blacklist.latest_for(&username).await? {
            Some(entry) => entry,
            None => return Ok(false),
        };

        let expires_at = self.codec.expiry_of(token)?;
        let revoked =
            entry.expiration_time > expires_at - Duration::minutes(REVOCATION_WINDOW_MINUTES);
        if revoked {
            debug!("Token for {} falls inside revocation window of entry {}", username, entry.id);
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::store::MockBlacklistStore;
    use crate::db::{BlacklistEntry, MemoryStore};
    use chrono::{TimeZone, Utc};

    fn setup() -> (Arc<ManualClock>, Arc<TokenCodec>, Arc<MemoryStore>, RevocationGate) {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let codec = Arc::new(TokenCodec::new("test_secret", Duration::hours(1), clock.clone()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let gate = RevocationGate::new(codec.clone(), store.clone());
        (clock, codec, store, gate)
    }

    #[tokio::test]
    async fn test_never_revoked_user() {
        let (_, codec, _, gate) = setup();
        let token = codec.issue("carol").unwrap();
        assert!(!gate.is_revoked(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_all_window() {
        let (clock, codec, store, gate) = setup();
        let t0 = clock.now();

        // T0 expires at t0+3500s.
        clock.set(t0 - Duration::seconds(100));
        let earlier = codec.issue("bob").unwrap();
        // T1 expires at t0+3600s.
        clock.set(t0);
        let current = codec.issue("bob").unwrap();
        // Expires at t0+10000s.
        clock.set(t0 + Duration::seconds(6400));
        let later = codec.issue("bob").unwrap();
        clock.set(t0);

        store
            .revoke(&current, codec.expiry_of(&current).unwrap(), "bob")
            .await
            .unwrap();

        assert!(gate.is_revoked(&current).await.unwrap());
        assert!(gate.is_revoked(&earlier).await.unwrap());
        assert!(!gate.is_revoked(&later).await.unwrap());
    }

    #[tokio::test]
    async fn test_window_boundary_is_exclusive() {
        let (clock, codec, store, gate) = setup();
        let t0 = clock.now();
        store.revoke("x", t0, "dave").await.unwrap();

        // Expires exactly 60 minutes after the entry: entry == exp - 60m, not after it.
        let at_boundary = codec.issue("dave").unwrap();
        assert!(!gate.is_revoked(&at_boundary).await.unwrap());

        clock.advance(Duration::seconds(-1));
        let inside = codec.issue("dave").unwrap();
        assert!(gate.is_revoked(&inside).await.unwrap());
    }

    #[tokio::test]
    async fn test_only_latest_entry_counts() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let codec = Arc::new(TokenCodec::new("test_secret", Duration::hours(1), clock.clone()));
        let now = clock.now();

        let mut blacklist = MockBlacklistStore::new();
        blacklist
            .expect_latest_for()
            .withf(|username| username == "erin")
            .times(1)
            .returning(move |_| {
                Ok(Some(BlacklistEntry {
                    id: 7,
                    token: String::new(),
                    username: "erin".into(),
                    expiration_time: now + Duration::minutes(30),
                    created_at: now,
                }))
            });

        let gate = RevocationGate::new(codec.clone(), Arc::new(blacklist));
        let token = codec.issue("erin").unwrap();
        assert!(gate.is_revoked(&token).await.unwrap());
    }
}
