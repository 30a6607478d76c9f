use pkg_constants::lease::{
    ACQUIRE_BACKOFF_BASE_MS, ACQUIRE_BACKOFF_CEILING_MS, HEARTBEAT_INTERVAL_DIVISOR,
    HEARTBEAT_INTERVAL_FLOOR_MS, RESERVED_SERVICE_IDS, TRANSIENT_RETRIES, TRANSIENT_RETRY_DELAY_MS,
};
use std::time::Duration;

use crate::error::LockError;
use crate::identity::InstanceIdentity;

/// What to do when another instance holds the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Give up immediately with `LockError::LeaseHeld`.
    #[default]
    NonBlocking,
    /// Keep retrying with jittered backoff. `None` waits forever.
    Blocking { max_wait: Option<Duration> },
}

impl WaitPolicy {
    /// Build from the environment-style flags: `max_wait_secs == 0` means unbounded.
    pub fn from_flags(wait: bool, max_wait_secs: u64) -> Self {
        if !wait {
            return WaitPolicy::NonBlocking;
        }
        let max_wait = (max_wait_secs > 0).then(|| Duration::from_secs(max_wait_secs));
        WaitPolicy::Blocking { max_wait }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderConfig {
    /// The lease `id`
    pub service_id: String,
    pub identity: InstanceIdentity,
    pub lease_duration: Duration,
    pub wait: WaitPolicy,
    /// Retries of one attempt after a transient store error
    pub transient_retries: u32,
    pub transient_retry_delay: Duration,
    /// Blocking-mode sleep is uniform in `[0.5, 1.5] × backoff_base`
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
}

impl LeaderConfig {
    pub fn new(
        service_id: impl Into<String>,
        identity: InstanceIdentity,
        lease_duration: Duration,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            identity,
            lease_duration,
            wait: WaitPolicy::NonBlocking,
            transient_retries: TRANSIENT_RETRIES,
            transient_retry_delay: Duration::from_millis(TRANSIENT_RETRY_DELAY_MS),
            backoff_base: Duration::from_millis(ACQUIRE_BACKOFF_BASE_MS),
            backoff_ceiling: Duration::from_millis(ACQUIRE_BACKOFF_CEILING_MS),
        }
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// `lease / 3`, never below the floor. At least two renewals fit in one
    /// lease window for any lease of three floors or more.
    pub fn heartbeat_interval(&self) -> Duration {
        let floor = Duration::from_millis(HEARTBEAT_INTERVAL_FLOOR_MS);
        (self.lease_duration / HEARTBEAT_INTERVAL_DIVISOR).max(floor)
    }

    pub(crate) fn lease_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lease_duration).unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.service_id.trim().is_empty() {
            return Err(LockError::InvalidConfig("service id is empty".to_string()));
        }
        if RESERVED_SERVICE_IDS.contains(&self.service_id.as_str()) {
            return Err(LockError::InvalidConfig(format!(
                "service id '{}' is reserved",
                self.service_id
            )));
        }
        if self.service_id.chars().any(char::is_control) {
            return Err(LockError::InvalidConfig(
                "service id contains control characters".to_string(),
            ));
        }
        if self.identity.instance_id.trim().is_empty() {
            return Err(LockError::InvalidConfig("instance id is empty".to_string()));
        }
        if self.lease_duration < Duration::from_secs(1) {
            return Err(LockError::InvalidConfig(format!(
                "lease duration must be at least 1s, got {}ms",
                self.lease_duration.as_millis()
            )));
        }
        let deadline = chrono::Duration::from_std(self.lease_duration)
            .ok()
            .and_then(|d| chrono::Utc::now().checked_add_signed(d));
        if deadline.is_none() {
            return Err(LockError::InvalidConfig(
                "lease duration is out of range".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lease_secs: u64) -> LeaderConfig {
        LeaderConfig::new(
            "svc-1",
            InstanceIdentity::new("a", "host-a"),
            Duration::from_secs(lease_secs),
        )
    }

    #[test]
    fn test_heartbeat_interval_is_a_third_of_the_lease() {
        let cfg = config(60);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(20));
        assert!(cfg.heartbeat_interval() * 5 <= cfg.lease_duration * 2);
    }

    #[test]
    fn test_heartbeat_interval_floor() {
        let cfg = config(2);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_wait_policy_from_flags() {
        assert_eq!(WaitPolicy::from_flags(false, 120), WaitPolicy::NonBlocking);
        assert_eq!(
            WaitPolicy::from_flags(true, 0),
            WaitPolicy::Blocking { max_wait: None }
        );
        assert_eq!(
            WaitPolicy::from_flags(true, 120),
            WaitPolicy::Blocking {
                max_wait: Some(Duration::from_secs(120))
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_lease_and_blank_ids() {
        assert!(config(60).validate().is_ok());
        assert!(matches!(
            config(0).validate(),
            Err(LockError::InvalidConfig(_))
        ));
        let mut blank = config(60);
        blank.service_id = " ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ids_that_clash_with_routes() {
        let mut reserved = config(60);
        reserved.service_id = "purge".to_string();
        assert!(matches!(
            reserved.validate(),
            Err(LockError::InvalidConfig(_))
        ));

        let mut control = config(60);
        control.service_id = "svc\n1".to_string();
        assert!(control.validate().is_err());

        let mut nested = config(60);
        nested.service_id = "team/bot".to_string();
        assert!(nested.validate().is_ok());
    }
}
