use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;
use uuid::Uuid;

use crate::entities::usage_counters::UsageCounterEntity;

#[automock]
#[async_trait]
pub trait UsageCounterRepository {
    async fn find_for_day(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
    ) -> Result<Option<UsageCounterEntity>>;

    /// Atomic `used = used + 1` guarded by `used < limit`; returns the
    /// updated row, or `None` when no row matched (absent or exhausted).
    async fn try_increment(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
        limit: i32,
    ) -> Result<Option<UsageCounterEntity>>;

    /// First consumption of the day: insert with `used = 1`, backed by the
    /// unique (`user_id`, `date_key`) index. `None` means another request
    /// won the creation race; the caller falls through to the increment.
    async fn insert_first(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
        plan_code: &str,
    ) -> Result<Option<UsageCounterEntity>>;
}
