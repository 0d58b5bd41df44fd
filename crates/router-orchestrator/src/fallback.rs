//! Fallback Manager (C9): runs one attempt function across a candidate
//! chain, applying the error-kind-driven retry policy from the router's
//! error taxonomy (§7) and a single global deadline shared across attempts.

use rand::Rng;
use router_core::error::{RetryClass, RouterError, RouterResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// One structured observability record per attempt (§4.7).
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub trace_id: String,
    pub candidate: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetriedSameModel,
    MovedToNextModel,
    Terminal,
}

/// Computes the exponential backoff with jitter for a given (1-indexed)
/// retry count: base 0.5s, doubling each retry, capped at 5s, jitter ±20%.
fn backoff_duration(retry_count: u32) -> Duration {
    let exp = BASE_BACKOFF.as_millis() as u64 * 2u64.saturating_pow(retry_count.saturating_sub(1));
    let capped = exp.min(MAX_BACKOFF.as_millis() as u64);
    let jitter_fraction = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (capped as f64 * (1.0 + jitter_fraction)).max(0.0) as u64;
    Duration::from_millis(jittered)
}

/// `Run(candidates[], attempt_fn, deadline) → APIResponse`.
///
/// `attempt_fn` is invoked once per candidate (twice for the primary, since
/// a retryable-same-model error gets one same-model retry before the
/// manager moves on). Returns the first successful response tagged with its
/// `fallback_depth` (0-indexed position in `candidates`), the structured
/// per-attempt log, or the last error if every candidate is exhausted.
pub async fn run<F, Fut>(
    candidates: &[String],
    trace_id: &str,
    deadline: Option<Instant>,
    mut attempt_fn: F,
) -> (RouterResult<(usize, router_core::types::ApiResponse)>, Vec<AttemptRecord>)
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = RouterResult<router_core::types::ApiResponse>>,
{
    let mut records = Vec::new();
    let mut last_err: Option<RouterError> = None;

    for (depth, candidate) in candidates.iter().enumerate() {
        let mut retry_count = 0u32;
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    last_err = Some(RouterError::Cancelled { after_ms: 0 });
                    return (Err(last_err.unwrap()), records);
                }
            }

            let started = Instant::now();
            let result = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match tokio::time::timeout(remaining, attempt_fn(candidate)).await {
                        Ok(result) => result,
                        Err(_) => Err(RouterError::Cancelled {
                            after_ms: started.elapsed().as_millis() as u64,
                        }),
                    }
                }
                None => attempt_fn(candidate).await,
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    records.push(AttemptRecord {
                        trace_id: trace_id.to_string(),
                        candidate: candidate.clone(),
                        attempt: retry_count + 1,
                        outcome: AttemptOutcome::Success,
                        latency_ms,
                    });
                    log::info!(
                        "fallback attempt succeeded: trace_id={trace_id} candidate={candidate} depth={depth} latency_ms={latency_ms}"
                    );
                    return (Ok((depth, response)), records);
                }
                Err(err) => {
                    let class = err.retry_class();
                    match class {
                        RetryClass::Terminal => {
                            records.push(AttemptRecord {
                                trace_id: trace_id.to_string(),
                                candidate: candidate.clone(),
                                attempt: retry_count + 1,
                                outcome: AttemptOutcome::Terminal,
                                latency_ms,
                            });
                            return (Err(err), records);
                        }
                        RetryClass::RetrySameModel if retry_count == 0 => {
                            records.push(AttemptRecord {
                                trace_id: trace_id.to_string(),
                                candidate: candidate.clone(),
                                attempt: retry_count + 1,
                                outcome: AttemptOutcome::RetriedSameModel,
                                latency_ms,
                            });
                            log::warn!(
                                "retryable-same-model failure for trace_id={trace_id} candidate={candidate}: {err}"
                            );
                            retry_count += 1;
                            let wait = backoff_duration(retry_count);
                            if let Some(deadline) = deadline {
                                if Instant::now() + wait >= deadline {
                                    last_err = Some(err);
                                    break;
                                }
                            }
                            tokio::time::sleep(wait).await;
                            continue;
                        }
                        _ => {
                            records.push(AttemptRecord {
                                trace_id: trace_id.to_string(),
                                candidate: candidate.clone(),
                                attempt: retry_count + 1,
                                outcome: AttemptOutcome::MovedToNextModel,
                                latency_ms,
                            });
                            log::warn!(
                                "retryable-next-model failure for trace_id={trace_id} candidate={candidate}: {err}"
                            );
                            last_err = Some(err);
                            break;
                        }
                    }
                }
            }
        }
    }

    let err = last_err.unwrap_or(RouterError::NoCandidate {
        task_type: "unknown".to_string(),
    });
    (Err(err), records)
}
