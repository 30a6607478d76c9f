use chrono::{DateTime, Duration, NaiveDate, Utc};
use pkg_constants::bot::{ACTIVITY_KEY_PREFIX, CONTACT_REQUEST_KEY_PREFIX};
use pkg_state::client::StateStore;
use pkg_types::activity::{
    ActivityAction, ActivityRecord, ActivityReport, DailyActivity,
};
use pkg_types::contact::{ContactRequest, RequestStatus};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Usage bookkeeping for one service, kept in the bot's own state store.
///
/// Activity keys sort by time:
/// `/activity/<service_id>/<millis, zero padded>-<user_id>-<nonce>`.
#[derive(Clone)]
pub struct ActivityLog {
    store: StateStore,
    service_id: String,
}

impl ActivityLog {
    pub fn new(store: StateStore, service_id: impl Into<String>) -> Self {
        Self {
            store,
            service_id: service_id.into(),
        }
    }

    fn activity_prefix(&self) -> String {
        format!("{}{}/", ACTIVITY_KEY_PREFIX, self.service_id)
    }

    pub async fn record(
        &self,
        user_id: i64,
        action: ActivityAction,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let record = ActivityRecord::new(user_id, self.service_id.as_str(), action, at);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let key = format!(
            "{}{:020}-{}-{}",
            self.activity_prefix(),
            at.timestamp_millis().max(0),
            user_id,
            &nonce[..8]
        );
        self.store.put_json(&key, &record).await?;
        debug!("Recorded {} for user {}", action, user_id);
        Ok(())
    }

    async fn load_since(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<ActivityRecord>> {
        let entries = self.store.list_prefix(&self.activity_prefix()).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(_key, value)| serde_json::from_slice::<ActivityRecord>(&value).ok())
            .filter(|r| r.timestamp >= since)
            .collect())
    }

    /// Usage over the `window_days` days before `now`.
    pub async fn report(&self, window_days: i64, now: DateTime<Utc>) -> anyhow::Result<ActivityReport> {
        let records = self.load_since(now - Duration::days(window_days)).await?;

        let mut users = HashSet::new();
        let mut per_day: BTreeMap<NaiveDate, (HashSet<i64>, usize)> = BTreeMap::new();
        for record in &records {
            users.insert(record.user_id);
            let day = per_day.entry(record.date).or_default();
            day.0.insert(record.user_id);
            day.1 += 1;
        }

        let daily_breakdown = per_day
            .into_iter()
            .rev()
            .map(|(date, (day_users, total))| DailyActivity {
                date,
                unique_users: day_users.len(),
                total_activities: total,
            })
            .collect();

        Ok(ActivityReport {
            window_days,
            unique_users: users.len(),
            total_activities: records.len(),
            daily_breakdown,
        })
    }

    /// Delete activity older than `retention_days`. Returns how many went.
    pub async fn cleanup(&self, retention_days: i64, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let cutoff = now - Duration::days(retention_days);
        let entries = self.store.list_prefix(&self.activity_prefix()).await?;

        let mut removed = 0;
        for (key, value) in entries {
            let record: ActivityRecord = match serde_json::from_slice(&value) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if record.timestamp < cutoff {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(
                "Removed {} activity record(s) older than {} days",
                removed, retention_days
            );
        }
        Ok(removed)
    }

    pub async fn save_request(&self, request: &ContactRequest) -> anyhow::Result<()> {
        let key = format!("{}{}", CONTACT_REQUEST_KEY_PREFIX, request.id);
        self.store.put_json(&key, request).await?;
        info!("Saved contact request {} from user {}", request.id, request.user_id);
        Ok(())
    }

    /// Requests not yet handled, newest first.
    pub async fn pending_requests(&self) -> anyhow::Result<Vec<ContactRequest>> {
        let entries = self.store.list_prefix(CONTACT_REQUEST_KEY_PREFIX).await?;
        let mut pending: Vec<ContactRequest> = entries
            .into_iter()
            .filter_map(|(_key, value)| serde_json::from_slice::<ContactRequest>(&value).ok())
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

}

// ─── Tests ─────────────────────────────────────────────────────
