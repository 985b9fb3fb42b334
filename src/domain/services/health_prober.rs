#[cfg(test)]
#[path = "health_prober_test.rs"]
mod tests;

use std::future::Future;
use std::time::Duration;

use tokio::time;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::models::ProbeError;
use crate::domain::models::ProbeTiming;

/// Shortest polling period, a zero interval would spin.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound for a single liveness request.
const MAX_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls `check` every `timing.interval`, starting immediately, until it
/// returns true, `timing.timeout` has elapsed, or `cancel` fires.
pub async fn wait_until_reachable<F, Fut>(
    mut check: F,
    timing: ProbeTiming,
    cancel: &CancellationToken,
) -> Result<(), ProbeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut ticker = time::interval(timing.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            _ = ticker.tick() => {}
        }

        let reachable = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            reachable = check() => reachable,
        };

        if reachable {
            tracing::debug!(elapsed_ms = started.elapsed().as_millis(), "Backend reachable");
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= timing.timeout {
            return Err(ProbeError::Timeout { elapsed });
        }
    }
}

/// A best effort liveness request. Anything other than a 200 counts as not
/// reachable yet, connection errors included.
pub async fn check_liveness(client: reqwest::Client, url: String, timeout: Duration) -> bool {
    let res = client
        .get(&url)
        .timeout(timeout.min(MAX_CHECK_TIMEOUT))
        .send()
        .await;

    match res {
        Ok(res) if res.status() == 200 => return true,
        Ok(res) => {
            tracing::debug!(url, status = res.status().as_u16(), "Liveness check failed");
            return false;
        }
        Err(err) => {
            tracing::debug!(url, error = ?err, "Liveness check failed");
            return false;
        }
    }
}
