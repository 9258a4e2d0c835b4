//! Completion polling with adaptive backoff and a hard deadline.
//!
//! A submitted file becomes searchable only after the KB service finishes
//! processing it. [`await_completion`] polls the job until the service
//! reports a terminal status, sleeping between polls on a geometric
//! schedule: short intervals give fast feedback for quick jobs, and the
//! growing, capped interval keeps long jobs from burning remote-call quota.
//!
//! With the defaults (initial 2s, factor 1.5, cap 30s) the sleep sequence
//! is 2, 3, 4.5, 6.75, 10.125, 15.1875, 22.78125, 30, 30, ...
//!
//! The wall-clock deadline (`max_wait_secs`) is independent of the interval
//! state: once elapsed time crosses it the job is reported [`TimedOut`],
//! sleeps being clamped to the remaining budget so the verdict lands at, not
//! long after, the deadline.
//!
//! [`TimedOut`]: JobState::TimedOut

use std::time::Duration;
use tokio::time::Instant;

use crate::config::PollConfig;
use crate::models::{JobHandle, JobState};
use crate::remote::{KbClient, RemoteJobStatus};

/// Poll one job to a terminal [`JobState`].
///
/// A poll request that itself fails (network blip) is retried at the
/// current interval up to `transient_retries` consecutive times before the
/// job is treated as failed; a successful poll resets that budget.
pub async fn await_completion(
    client: &dyn KbClient,
    handle: &JobHandle,
    config: &PollConfig,
) -> JobState {
    let deadline = Instant::now() + Duration::from_secs(config.max_wait_secs);
    let mut interval = config.initial_interval_secs;
    let mut transient_failures = 0u32;

    loop {
        let grow = match client.job_status(handle).await {
            Ok(RemoteJobStatus::Succeeded) => return JobState::Succeeded,
            Ok(RemoteJobStatus::Failed { reason }) => return JobState::Failed { reason },
            Ok(RemoteJobStatus::Processing) => {
                transient_failures = 0;
                true
            }
            Err(e) => {
                transient_failures += 1;
                if transient_failures > config.transient_retries {
                    return JobState::Failed {
                        reason: format!(
                            "status poll failed {} consecutive times: {}",
                            transient_failures, e
                        ),
                    };
                }
                // Retry at the current interval without growing it.
                false
            }
        };

        let now = Instant::now();
        if now >= deadline {
            return JobState::TimedOut;
        }

        let sleep_for = Duration::from_secs_f64(interval).min(deadline - now);
        tokio::time::sleep(sleep_for).await;

        if grow {
            interval = next_interval(interval, config);
        }
    }
}

/// The geometric-then-capped interval schedule, as a pure function.
pub fn next_interval(current: f64, config: &PollConfig) -> f64 {
    (current * config.backoff_factor).min(config.max_interval_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::models::SearchResult;
    use crate::remote::SearchFeature;

    fn handle() -> JobHandle {
        JobHandle {
            resource_id: "res-1".to_string(),
            job_id: "job-1".to_string(),
        }
    }

    /// Plays back a scripted sequence of poll responses, recording the
    /// instant of every poll. `None` entries simulate transient failures.
    struct ScriptedClient {
        script: Mutex<Vec<Option<RemoteJobStatus>>>,
        poll_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Option<RemoteJobStatus>>) -> Self {
            Self {
                script: Mutex::new(script),
                poll_times: Mutex::new(Vec::new()),
            }
        }

        fn intervals(&self) -> Vec<f64> {
            let times = self.poll_times.lock().unwrap();
            times
                .windows(2)
                .map(|w| (w[1] - w[0]).as_secs_f64())
                .collect()
        }
    }

    #[async_trait]
    impl KbClient for ScriptedClient {
        async fn submit_file(
            &self,
            _slug: &str,
            _title: &str,
            _fingerprint: &str,
            _bytes: Vec<u8>,
        ) -> Result<JobHandle> {
            unimplemented!("not used by poller tests")
        }

        async fn job_status(&self, _handle: &JobHandle) -> Result<RemoteJobStatus> {
            self.poll_times.lock().unwrap().push(Instant::now());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(RemoteJobStatus::Processing);
            }
            match script.remove(0) {
                Some(status) => Ok(status),
                None => bail!("simulated network error"),
            }
        }

        async fn search(
            &self,
            _query: &str,
            _features: &[SearchFeature],
            _top_k: usize,
        ) -> Result<Vec<SearchResult>> {
            unimplemented!("not used by poller tests")
        }
    }

    fn test_config() -> PollConfig {
        PollConfig {
            initial_interval_secs: 2.0,
            backoff_factor: 1.5,
            max_interval_secs: 30.0,
            max_wait_secs: 900,
            transient_retries: 3,
        }
    }

    #[test]
    fn interval_schedule_is_geometric_then_capped() {
        let config = test_config();
        let mut interval = config.initial_interval_secs;
        let mut schedule = vec![interval];
        for _ in 0..9 {
            interval = next_interval(interval, &config);
            schedule.push(interval);
        }

        let expected = [
            2.0, 3.0, 4.5, 6.75, 10.125, 15.1875, 22.78125, 30.0, 30.0, 30.0,
        ];
        for (got, want) in schedule.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "got {}, want {}", got, want);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_returns_without_sleeping() {
        let client = ScriptedClient::new(vec![Some(RemoteJobStatus::Succeeded)]);
        let state = await_completion(&client, &handle(), &test_config()).await;
        assert_eq!(state, JobState::Succeeded);
        assert!(client.intervals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_follow_backoff_schedule() {
        let client = ScriptedClient::new(vec![
            Some(RemoteJobStatus::Processing),
            Some(RemoteJobStatus::Processing),
            Some(RemoteJobStatus::Processing),
            Some(RemoteJobStatus::Processing),
            Some(RemoteJobStatus::Succeeded),
        ]);

        let state = await_completion(&client, &handle(), &test_config()).await;
        assert_eq!(state, JobState::Succeeded);

        let intervals = client.intervals();
        let expected = [2.0, 3.0, 4.5, 6.75];
        assert_eq!(intervals.len(), expected.len());
        for (got, want) in intervals.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 0.01, "got {}, want {}", got, want);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_times_out_at_deadline() {
        let client = ScriptedClient::new(vec![]);
        let mut config = test_config();
        config.max_wait_secs = 100;

        let start = Instant::now();
        let state = await_completion(&client, &handle(), &config).await;
        let elapsed = start.elapsed().as_secs_f64();

        assert_eq!(state, JobState::TimedOut);
        assert!(elapsed >= 100.0, "timed out too early: {}s", elapsed);
        assert!(elapsed < 101.0, "timed out too late: {}s", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_then_fatal() {
        let client = ScriptedClient::new(vec![None, None, None, None]);
        let state = await_completion(&client, &handle(), &test_config()).await;
        match state {
            JobState::Failed { reason } => {
                assert!(reason.contains("status poll failed"), "reason: {}", reason)
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        // 4 polls happened: initial + 3 retries.
        assert_eq!(client.intervals().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_does_not_grow_interval() {
        let client = ScriptedClient::new(vec![
            Some(RemoteJobStatus::Processing),
            None,
            Some(RemoteJobStatus::Succeeded),
        ]);

        let state = await_completion(&client, &handle(), &test_config()).await;
        assert_eq!(state, JobState::Succeeded);

        // First gap grows off the initial interval; the retry after the
        // transient error reuses the grown interval instead of growing again.
        let intervals = client.intervals();
        assert_eq!(intervals.len(), 2);
        assert!((intervals[0] - 2.0).abs() < 0.01);
        assert!((intervals[1] - 3.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_recovered_poll_after_transient_error() {
        let client = ScriptedClient::new(vec![None, Some(RemoteJobStatus::Succeeded)]);
        let state = await_completion(&client, &handle(), &test_config()).await;
        assert_eq!(state, JobState::Succeeded);
    }
}
