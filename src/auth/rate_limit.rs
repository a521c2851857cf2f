use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitSettings;
use crate::db::{ArticleStore, ArticleTimestamp};
use crate::error::AppError;
use crate::Result;

/// The two throttled content mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Creating content; compared against the author's newest creation time.
    Write,
    /// Editing or deleting content; compared against the newest modification time.
    Edit,
}

impl MutationKind {
    pub fn field(self) -> ArticleTimestamp {
        match self {
            MutationKind::Write => ArticleTimestamp::CreatedAt,
            MutationKind::Edit => ArticleTimestamp::UpdatedAt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub write_cooldown: Duration,
    pub edit_cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            write_cooldown: Duration::minutes(1),
            edit_cooldown: Duration::minutes(1),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            write_cooldown: Duration::seconds(settings.write_cooldown_secs),
            edit_cooldown: Duration::seconds(settings.edit_cooldown_secs),
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self, kind: MutationKind) -> Duration {
        match kind {
            MutationKind::Write => self.write_cooldown,
            MutationKind::Edit => self.edit_cooldown,
        }
    }
}

/// Held by a caller for the whole check-and-write of one mutation.
pub type MutationGuard = OwnedMutexGuard<()>;

/// Throttles content mutations per author.
///
/// The last-action time is always read from the article store, never
/// cached, so decisions survive restarts. The store read and the caller's
/// subsequent write are not atomic on their own; callers take the author's
/// guard from [`RateLimiter::acquire`] first and keep it until the write has
/// landed, which serializes concurrent mutations by the same author.
pub struct RateLimiter {
    articles: Arc<dyn ArticleStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RateLimiter {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            articles,
            config,
            clock,
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Allowed iff the author has no prior row for `kind`'s timestamp or
    /// strictly more than the cooldown has elapsed since the newest one.
    pub async fn can_mutate(&self, username: &str, kind: MutationKind) -> Result<bool> {
        let field = kind.field();
        let latest = match self.articles.latest_by_author(username, field).await? {
            Some(article) => article,
            None => return Ok(true),
        };
        let last = match field.of(&latest) {
            Some(ts) => ts,
            None => return Ok(true),
        };

        let elapsed = self.clock.now() - last;
        Ok(elapsed > self.config.cooldown(kind))
    }

    /// Like [`can_mutate`](Self::can_mutate) but a refusal is an error.
    pub async fn check(&self, username: &str, kind: MutationKind) -> Result<()> {
        if self.can_mutate(username, kind).await? {
            return Ok(());
        }
        debug!("{:?} by {} refused inside cooldown", kind, username);
        let message = match kind {
            MutationKind::Write => "article not written by rate limit",
            MutationKind::Edit => "article not edited by rate limit",
        };
        Err(AppError::RateLimited(message.into()))
    }

    /// Per-author advisory lock.
    pub async fn acquire(&self, username: &str) -> MutationGuard {
        let lock = {
            let mut guards = self.guards.lock().await;
            guards
                .entry(username.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops locks nobody holds or waits on.
    pub async fn cleanup(&self) {
        let mut guards = self.guards.lock().await;
        guards.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    async fn tracked_authors(&self) -> usize {
        self.guards.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::store::MockArticleStore;
    use crate::db::{Article, BoardStore, MemoryStore, NewArticle, NewUser, UserStore};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        limiter: RateLimiter,
        author_id: i64,
        board_id: i64,
    }

    async fn fixture(config: RateLimitConfig) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let author = store
            .create_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let board = store.create_board("free", None).await.unwrap();
        let limiter = RateLimiter::new(store.clone(), config, clock.clone());
        Fixture {
            clock,
            store,
            limiter,
            author_id: author.id,
            board_id: board.id,
        }
    }

    async fn write(f: &Fixture) -> Article {
        f.store
            .insert_article(NewArticle {
                author_id: f.author_id,
                board_id: f.board_id,
                title: "t".into(),
                content: "c".into(),
                created_at: f.clock.now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_write_is_allowed() {
        let f = fixture(RateLimitConfig::default()).await;
        assert!(f.limiter.can_mutate("alice", MutationKind::Write).await.unwrap());
        assert!(f.limiter.can_mutate("alice", MutationKind::Edit).await.unwrap());
        assert!(f.limiter.can_mutate("stranger", MutationKind::Write).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_cooldown() {
        let f = fixture(RateLimitConfig::default()).await;
        write(&f).await;

        assert!(!f.limiter.can_mutate("alice", MutationKind::Write).await.unwrap());

        f.clock.advance(Duration::seconds(30));
        assert!(matches!(
            f.limiter.check("alice", MutationKind::Write).await,
            Err(AppError::RateLimited(_))
        ));

        // Exactly at the cooldown is still too soon.
        f.clock.advance(Duration::seconds(30));
        assert!(!f.limiter.can_mutate("alice", MutationKind::Write).await.unwrap());

        f.clock.advance(Duration::seconds(1));
        assert!(f.limiter.can_mutate("alice", MutationKind::Write).await.unwrap());
    }

    #[tokio::test]
    async fn test_edit_uses_modification_time() {
        let f = fixture(RateLimitConfig {
            write_cooldown: Duration::seconds(60),
            edit_cooldown: Duration::seconds(300),
        })
        .await;
        let mut article = write(&f).await;

        // A fresh article has never been modified.
        assert!(f.limiter.can_mutate("alice", MutationKind::Edit).await.unwrap());

        article.updated_at = Some(f.clock.now());
        f.store.update_article(&article).await.unwrap();

        f.clock.advance(Duration::seconds(120));
        assert!(f.limiter.can_mutate("alice", MutationKind::Write).await.unwrap());
        assert!(!f.limiter.can_mutate("alice", MutationKind::Edit).await.unwrap());

        f.clock.advance(Duration::seconds(181));
        assert!(f.limiter.can_mutate("alice", MutationKind::Edit).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut articles = MockArticleStore::new();
        articles
            .expect_latest_by_author()
            .returning(|_, _| Err(AppError::InternalError("store down".into())));
        let limiter = RateLimiter::new(Arc::new(articles), RateLimitConfig::default(), clock);

        assert!(matches!(
            limiter.check("alice", MutationKind::Write).await,
            Err(AppError::InternalError(_))
        ));
    }

    #[tokio::test]
    async fn test_guard_serializes_same_author() {
        let f = fixture(RateLimitConfig::default()).await;

        let held = f.limiter.acquire("alice").await;
        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            f.limiter.acquire("alice"),
        )
        .await;
        assert!(waiting.is_err(), "second guard for the same author must wait");

        // Other authors are unaffected.
        let _other = f.limiter.acquire("bob").await;

        drop(held);
        let _again = f.limiter.acquire("alice").await;
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_guards() {
        let f = fixture(RateLimitConfig::default()).await;
        let held = f.limiter.acquire("alice").await;
        drop(f.limiter.acquire("bob").await);

        f.limiter.cleanup().await;
        assert_eq!(f.limiter.tracked_authors().await, 1);

        drop(held);
        f.limiter.cleanup().await;
        assert_eq!(f.limiter.tracked_authors().await, 0);
    }
}
