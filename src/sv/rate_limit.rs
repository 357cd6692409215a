use sea_orm::{DbErr, SqlErr, sea_query::Expr};

use crate::{entity::rate_limit, prelude::*};

/// Fixed-window counters kept in the database so limits hold across
/// restarts and instances.
pub struct RateLimit<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> RateLimit<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Counts a hit against `key`. Returns `false` once `limit` hits have been
  /// recorded in the current window.
  pub async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<bool> {
    self.hit_at(key, limit, window, now()).await
  }

  pub async fn hit_at(
    &self,
    key: &str,
    limit: u32,
    window: Duration,
    now: DateTime,
  ) -> Result<bool> {
    let window = TimeDelta::from_std(window)
      .map_err(|e| Error::Internal(format!("bad rate limit window: {e}")))?;
    let limit = i32::try_from(limit).unwrap_or(i32::MAX);

    // a lost race on the first insert leaves a row the second pass finds
    for _ in 0..2 {
      let txn = self.db.begin().await?;
      let current = rate_limit::Entity::find_by_id(key).one(&txn).await?;

      match record(&txn, key, current, limit, window, now).await {
        Ok(allowed) => {
          txn.commit().await?;
          return Ok(allowed);
        }
        Err(err) if lost_race(&err) => {
          debug!(key, "rate limit window created concurrently, retrying");
          txn.rollback().await?;
        }
        Err(err) => return Err(err.into()),
      }
    }

    Err(Error::Internal(format!("rate limit key `{key}` keeps conflicting")))
  }

  /// Drops counters whose window has ended.
  pub async fn gc(&self) -> Result<u64> {
    let result = rate_limit::Entity::delete_many()
      .filter(rate_limit::Column::WindowEndsAt.lte(now()))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected)
  }
}

/// Applies one hit given the row as read in the same transaction.
async fn record<C: ConnectionTrait>(
  conn: &C,
  key: &str,
  current: Option<rate_limit::Model>,
  limit: i32,
  window: TimeDelta,
  now: DateTime,
) -> Result<bool, DbErr> {
  match current {
    Some(entry) if entry.window_ends_at > now => {
      if entry.hits >= limit {
        return Ok(false);
      }
      rate_limit::Entity::update_many()
        .col_expr(
          rate_limit::Column::Hits,
          Expr::col(rate_limit::Column::Hits).add(1),
        )
        .filter(rate_limit::Column::Key.eq(key))
        .exec(conn)
        .await?;
    }
    Some(entry) => {
      rate_limit::ActiveModel {
        hits: Set(1),
        window_ends_at: Set(now + window),
        ..entry.into()
      }
      .update(conn)
      .await?;
    }
    None => {
      rate_limit::ActiveModel {
        key: Set(key.to_string()),
        hits: Set(1),
        window_ends_at: Set(now + window),
      }
      .insert(conn)
      .await?;
    }
  }
  Ok(true)
}

fn lost_race(err: &DbErr) -> bool {
  matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_limit_within_window() {
    let db = test_db::setup().await;
    let sv = RateLimit::new(&db);
    let window = Duration::from_secs(3600);

    for _ in 0..3 {
      assert!(sv.hit("contact:10.0.0.1", 3, window).await.unwrap());
    }
    assert!(!sv.hit("contact:10.0.0.1", 3, window).await.unwrap());
    assert!(sv.hit("contact:10.0.0.2", 3, window).await.unwrap());
  }

  #[tokio::test]
  async fn test_window_rolls_over() {
    let db = test_db::setup().await;
    let sv = RateLimit::new(&db);
    let window = Duration::from_secs(60);
    let start = now();

    assert!(sv.hit_at("k", 1, window, start).await.unwrap());
    assert!(!sv.hit_at("k", 1, window, start).await.unwrap());

    let later = start + TimeDelta::seconds(61);
    assert!(sv.hit_at("k", 1, window, later).await.unwrap());
    assert!(!sv.hit_at("k", 1, window, later).await.unwrap());
  }

  #[tokio::test]
  async fn test_concurrent_first_hit_is_a_retryable_conflict() {
    let db = test_db::setup().await;
    let sv = RateLimit::new(&db);
    let window = Duration::from_secs(3600);
    let at = now();

    assert!(sv.hit_at("contact:10.0.0.9", 5, window, at).await.unwrap());

    // a request that read no row before the other one inserted it
    let err = record(&db, "contact:10.0.0.9", None, 5, TimeDelta::hours(1), at)
      .await
      .unwrap_err();
    assert!(lost_race(&err));

    assert!(sv.hit_at("contact:10.0.0.9", 5, window, at).await.unwrap());
    let entry = rate_limit::Entity::find_by_id("contact:10.0.0.9")
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(entry.hits, 2);
  }

  #[tokio::test]
  async fn test_gc_drops_ended_windows() {
    let db = test_db::setup().await;
    let sv = RateLimit::new(&db);

    let past = now() - TimeDelta::hours(2);
    sv.hit_at("old", 5, Duration::from_secs(60), past).await.unwrap();
    sv.hit("fresh", 5, Duration::from_secs(3600)).await.unwrap();

    assert_eq!(sv.gc().await.unwrap(), 1);
    assert!(rate_limit::Entity::find_by_id("fresh").one(&db).await.unwrap().is_some());
  }
}
