//! Read-modify-write loop that persists roster changes under optimistic concurrency.
//!
//! Each attempt reads the game, runs the membership engine and writes the result back
//! conditioned on the version it read. A lost race is retried from a fresh read with jittered
//! exponential backoff; transient storage failures are retried under their own, smaller budget.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::RetryConfig,
    dao::{game_store::GameStore, models::GameEntity, storage::StorageError},
    error::ServiceError,
    state::{
        SharedState,
        membership::{self, MembershipAction, MembershipOutcome},
    },
};

/// Bounds for the retry loop in [`apply_membership_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total read-modify-write attempts allowed when writes keep conflicting.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Extra attempts granted for `Unavailable` storage errors.
    pub max_unavailable_retries: u32,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): capped exponential plus up to one base of jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..base_ms))
        };

        exponential + jitter
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(value: &RetryConfig) -> Self {
        Self {
            max_attempts: value.max_attempts.max(1),
            base_delay: Duration::from_millis(value.base_delay_ms),
            max_delay: Duration::from_millis(value.max_delay_ms),
            max_unavailable_retries: value.max_unavailable_retries,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Persisted result of a membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    /// Game as stored after the change (or as read, for a no-op).
    pub game: GameEntity,
    pub outcome: MembershipOutcome,
    /// Read-modify-write attempts used, counting the successful one.
    pub attempts: u32,
}

/// Join or drop `principal` using the shared state's store and retry configuration.
pub async fn change_membership(
    state: &SharedState,
    game_id: Uuid,
    principal: &str,
    action: MembershipAction,
) -> Result<MembershipChange, ServiceError> {
    let store = state.require_game_store().await?;
    let policy = RetryPolicy::from(&state.config().retry);
    apply_membership_change(store.as_ref(), game_id, principal, action, &policy).await
}

/// Apply `action` for `principal` on game `game_id`, retrying lost races.
///
/// Idempotent no-ops return the state as read without writing.
pub async fn apply_membership_change(
    store: &dyn GameStore,
    game_id: Uuid,
    principal: &str,
    action: MembershipAction,
    policy: &RetryPolicy,
) -> Result<MembershipChange, ServiceError> {
    let principal = principal.trim();
    if principal.is_empty() {
        return Err(ServiceError::InvalidInput(
            "principal must not be empty".into(),
        ));
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    let mut unavailable_retries = 0;

    loop {
        match attempt_once(store, game_id, principal, action, attempt).await {
            Ok(change) => {
                if change.outcome.is_change() {
                    info!(
                        game_id = %game_id,
                        %action,
                        attempt,
                        outcome = ?change.outcome,
                        version = change.game.version,
                        "membership change applied"
                    );
                } else {
                    debug!(game_id = %game_id, %action, outcome = ?change.outcome, "membership unchanged");
                }
                return Ok(change);
            }
            Err(StorageError::VersionConflict { expected, .. }) => {
                if attempt >= max_attempts {
                    warn!(
                        game_id = %game_id,
                        %action,
                        attempts = attempt,
                        "membership change kept conflicting; giving up"
                    );
                    return Err(ServiceError::Conflict(format!(
                        "game `{game_id}` is being modified concurrently; try again"
                    )));
                }
                debug!(game_id = %game_id, attempt, expected, "version conflict; retrying");
                sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                if unavailable_retries >= policy.max_unavailable_retries {
                    warn!(game_id = %game_id, %action, error = %err, "storage unavailable; giving up");
                    return Err(ServiceError::Unavailable(err));
                }
                unavailable_retries += 1;
                warn!(
                    game_id = %game_id,
                    retry = unavailable_retries,
                    error = %err,
                    "storage unavailable; retrying"
                );
                sleep(policy.backoff(unavailable_retries)).await;
            }
            Err(other) => return Err(other.into()),
        }
    }
}

async fn attempt_once(
    store: &dyn GameStore,
    game_id: Uuid,
    principal: &str,
    action: MembershipAction,
    attempt: u32,
) -> Result<MembershipChange, StorageError> {
    let current = store
        .find_game(game_id)
        .await?
        .ok_or(StorageError::NotFound { id: game_id })?;

    let transition = membership::apply(&current, principal, action);
    if !transition.changed {
        return Ok(MembershipChange {
            game: current,
            outcome: transition.outcome,
            attempts: attempt,
        });
    }

    let stored = store.update_game(transition.game, current.version).await?;
    Ok(MembershipChange {
        game: stored,
        outcome: transition.outcome,
        attempts: attempt,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::SystemTime,
    };

    use futures::{future::BoxFuture, stream::BoxStream};
    use tokio::sync::Barrier;

    use super::*;
    use crate::dao::{
        game_store::memory::MemoryGameStore, models::INITIAL_VERSION, storage::StorageResult,
    };

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_unavailable_retries: 2,
        }
    }

    fn game(num_teams: u32, team_size: u32, roster: &[&str], waitlist: &[&str]) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            owner: "owner".into(),
            start_time: SystemTime::UNIX_EPOCH,
            category: "basketball".into(),
            duration_mins: 60,
            location: "Rec center".into(),
            name: "Noon run".into(),
            num_teams,
            team_size,
            sign_up_fee_cents: 0,
            split_fee_cents: 0,
            roster: roster.iter().map(|p| p.to_string()).collect(),
            waitlist: waitlist.iter().map(|p| p.to_string()).collect(),
            version: INITIAL_VERSION,
        }
    }

    /// Wraps the memory store and injects failures before delegating.
    #[derive(Clone, Default)]
    struct ScriptedStore {
        inner: MemoryGameStore,
        conflicts: Arc<AtomicU32>,
        unavailable_reads: Arc<AtomicU32>,
        unavailable_writes: Arc<AtomicU32>,
        lost_acks: Arc<AtomicU32>,
        reads: Arc<AtomicU32>,
        writes: Arc<AtomicU32>,
    }

    impl ScriptedStore {
        fn with_conflicts(self, n: u32) -> Self {
            self.conflicts.store(n, Ordering::SeqCst);
            self
        }

        fn with_unavailable_reads(self, n: u32) -> Self {
            self.unavailable_reads.store(n, Ordering::SeqCst);
            self
        }

        /// Writes that fail before reaching the inner store.
        fn with_unavailable_writes(self, n: u32) -> Self {
            self.unavailable_writes.store(n, Ordering::SeqCst);
            self
        }

        /// Writes that land but still report the store as unavailable.
        fn with_lost_acks(self, n: u32) -> Self {
            self.lost_acks.store(n, Ordering::SeqCst);
            self
        }
    }

    fn outage() -> StorageError {
        StorageError::unavailable(
            "scripted outage".into(),
            std::io::Error::other("connection refused"),
        )
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    impl GameStore for ScriptedStore {
        fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.unavailable_reads) {
                return Box::pin(async { Err(outage()) });
            }
            self.inner.find_game(id)
        }

        fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.create_game(game)
        }

        fn update_game(
            &self,
            game: GameEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<GameEntity>> {
            if take_one(&self.conflicts) {
                let id = game.id;
                return Box::pin(async move {
                    Err(StorageError::VersionConflict {
                        id,
                        expected: expected_version,
                    })
                });
            }
            if take_one(&self.unavailable_writes) {
                return Box::pin(async { Err(outage()) });
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            let write = self.inner.update_game(game, expected_version);
            if take_one(&self.lost_acks) {
                return Box::pin(async move {
                    write.await?;
                    Err(outage())
                });
            }
            write
        }

        fn games_by_category(
            &self,
            category: String,
            since: SystemTime,
        ) -> BoxStream<'static, StorageResult<GameEntity>> {
            self.inner.games_by_category(category, since)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn converges_after_conflicts_and_applies_once() {
        let store = ScriptedStore::default().with_conflicts(3);
        let game = game(1, 2, &["a"], &[]);
        store.create_game(game.clone()).await.unwrap();

        let change =
            apply_membership_change(&store, game.id, "b", MembershipAction::Join, &instant_policy())
                .await
                .unwrap();

        assert_eq!(change.attempts, 4);
        assert_eq!(change.outcome, MembershipOutcome::Rostered);
        assert_eq!(change.game.roster, vec!["a", "b"]);
        assert_eq!(change.game.version, INITIAL_VERSION + 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_conflicts_surface_as_conflict() {
        let store = ScriptedStore::default().with_conflicts(10);
        let game = game(1, 2, &[], &[]);
        store.create_game(game.clone()).await.unwrap();

        let err =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(store.reads.load(Ordering::SeqCst), 5);
        let stored = store.find_game(game.id).await.unwrap().unwrap();
        assert!(stored.roster.is_empty());
    }

    #[tokio::test]
    async fn unavailable_reads_use_their_own_budget() {
        let store = ScriptedStore::default().with_unavailable_reads(2);
        let game = game(1, 1, &[], &[]);
        store.create_game(game.clone()).await.unwrap();

        let change =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap();

        assert_eq!(change.attempts, 1);
        assert_eq!(change.game.roster, vec!["a"]);
    }

    #[tokio::test]
    async fn failed_write_is_retried_after_outage() {
        let store = ScriptedStore::default().with_unavailable_writes(1);
        let game = game(1, 2, &[], &[]);
        store.create_game(game.clone()).await.unwrap();

        let change =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap();

        assert_eq!(change.outcome, MembershipOutcome::Rostered);
        assert_eq!(change.game.roster, vec!["a"]);
        assert_eq!(change.game.version, INITIAL_VERSION + 1);
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_applied_during_outage_settles_without_duplicate() {
        let store = ScriptedStore::default().with_lost_acks(1);
        let game = game(1, 2, &[], &[]);
        store.create_game(game.clone()).await.unwrap();

        let change =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap();

        assert_eq!(change.outcome, MembershipOutcome::AlreadyRostered);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);

        let stored = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(stored.roster, vec!["a"]);
        assert!(stored.waitlist.is_empty());
        assert_eq!(stored.version, INITIAL_VERSION + 1);
    }

    #[tokio::test]
    async fn persistent_outage_surfaces_as_unavailable() {
        let store = ScriptedStore::default().with_unavailable_reads(3);
        let game = game(1, 1, &[], &[]);
        store.create_game(game.clone()).await.unwrap();

        let err =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap_err();

        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_principal_never_touches_the_store() {
        let store = ScriptedStore::default();

        let err = apply_membership_change(
            &store,
            Uuid::new_v4(),
            "   ",
            MembershipAction::Join,
            &instant_policy(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let store = ScriptedStore::default();
        let err = apply_membership_change(
            &store,
            Uuid::new_v4(),
            "a",
            MembershipAction::Drop,
            &instant_policy(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn noop_does_not_write() {
        let store = ScriptedStore::default();
        let game = game(1, 1, &["a"], &[]);
        store.create_game(game.clone()).await.unwrap();

        let change =
            apply_membership_change(&store, game.id, "a", MembershipAction::Join, &instant_policy())
                .await
                .unwrap();

        assert_eq!(change.outcome, MembershipOutcome::AlreadyRostered);
        assert_eq!(change.game.version, INITIAL_VERSION);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    /// Holds the first two reads until both have happened, so both writers see the same version.
    #[derive(Clone)]
    struct LockstepStore {
        inner: MemoryGameStore,
        barrier: Arc<Barrier>,
        reads: Arc<AtomicU32>,
    }

    impl GameStore for LockstepStore {
        fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            let inner = self.inner.clone();
            let barrier = self.barrier.clone();
            let first_round = self.reads.fetch_add(1, Ordering::SeqCst) < 2;
            Box::pin(async move {
                let found = inner.find_game(id).await;
                if first_round {
                    barrier.wait().await;
                }
                found
            })
        }

        fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.create_game(game)
        }

        fn update_game(
            &self,
            game: GameEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<GameEntity>> {
            self.inner.update_game(game, expected_version)
        }

        fn games_by_category(
            &self,
            category: String,
            since: SystemTime,
        ) -> BoxStream<'static, StorageResult<GameEntity>> {
            self.inner.games_by_category(category, since)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn racing_joins_for_last_slot_split_roster_and_waitlist() {
        let store = LockstepStore {
            inner: MemoryGameStore::new(),
            barrier: Arc::new(Barrier::new(2)),
            reads: Arc::new(AtomicU32::new(0)),
        };
        let game = game(1, 2, &["a"], &[]);
        store.create_game(game.clone()).await.unwrap();

        let game_id = game.id;
        let spawn_join = |principal: &'static str| {
            let store = store.clone();
            tokio::spawn(async move {
                apply_membership_change(
                    &store,
                    game_id,
                    principal,
                    MembershipAction::Join,
                    &instant_policy(),
                )
                .await
            })
        };
        let (b, c) = tokio::join!(spawn_join("b"), spawn_join("c"));
        let (b, c) = (b.unwrap().unwrap(), c.unwrap().unwrap());

        let mut outcomes = [b.outcome.clone(), c.outcome.clone()];
        outcomes.sort_by_key(|o| matches!(o, MembershipOutcome::Waitlisted));
        assert_eq!(
            outcomes,
            [MembershipOutcome::Rostered, MembershipOutcome::Waitlisted]
        );
        assert_eq!(b.attempts + c.attempts, 3, "exactly one writer retried");

        let stored = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(stored.roster.len(), 2);
        assert_eq!(stored.waitlist.len(), 1);
        assert_eq!(stored.version, INITIAL_VERSION + 2);
    }

    #[test]
    fn backoff_is_capped_and_jittered_below_one_base() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            max_unavailable_retries: 2,
        };

        for _ in 0..50 {
            let first = policy.backoff(1);
            assert!(first >= Duration::from_millis(20) && first < Duration::from_millis(40));

            let capped = policy.backoff(10);
            assert!(capped >= Duration::from_millis(100) && capped < Duration::from_millis(120));
        }
    }

    #[test]
    fn policy_from_config_never_allows_zero_attempts() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }
}
