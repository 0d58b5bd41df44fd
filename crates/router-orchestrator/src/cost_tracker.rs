//! Cost Tracker (C10): turns one completed response into a [`CostEvent`],
//! appends it to a bounded ring buffer, and maintains a running daily total
//! the embedding application resets explicitly.

use router_core::cost_calculator::{self, CostLimits};
use router_core::error::RouterResult;
use router_core::price_table::PriceTable;
use router_core::types::{ApiResponse, CostEvent, Provider, RunStatus, TaskType};
use std::collections::VecDeque;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 10_000;

struct Inner {
    events: VecDeque<CostEvent>,
    daily_total: f64,
}

/// Single mutex guarding the ring buffer and the running daily total; the
/// design calls for the cost tracker to serialize event appends (§5) rather
/// than allow interleaved partial writes across concurrent requests.
pub struct CostTracker {
    inner: Mutex<Inner>,
    capacity: usize,
    price_table: PriceTable,
    limits: CostLimits,
}

impl CostTracker {
    pub fn new(price_table: PriceTable, limits: CostLimits) -> Self {
        CostTracker::with_capacity(price_table, limits, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(price_table: PriceTable, limits: CostLimits, capacity: usize) -> Self {
        CostTracker {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                daily_total: 0.0,
            }),
            capacity: capacity.max(1),
            price_table,
            limits,
        }
    }

    /// Record one completed response, returning the `CostEvent` it produced.
    /// A daily-limit breach is returned as `CostError` but does not prevent
    /// the event from being recorded — the embedding application decides
    /// whether to treat the limit as fatal.
    pub fn record(
        &self,
        response: &ApiResponse,
        model_id: &str,
        provider: Provider,
        model_api_name: &str,
        task_type: TaskType,
        trace_id: &str,
        status: RunStatus,
        fallback_depth: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> RouterResult<CostEvent> {
        let price = self.price_table.require(provider, model_api_name)?;
        let cost = cost_calculator::calculate_cost(response.usage, price)?;
        cost_calculator::validate_single_request(cost, &self.limits)?;

        let event = CostEvent {
            trace_id: trace_id.to_string(),
            timestamp,
            model_id: model_id.to_string(),
            provider,
            task_type,
            prompt_tokens: response.usage.prompt_tokens,
            completion_tokens: response.usage.completion_tokens,
            cost_usd_input: cost.input,
            cost_usd_output: cost.output,
            cost_usd_total: cost.total,
            status,
            fallback_depth,
        };

        let mut inner = self.inner.lock().expect("cost tracker mutex poisoned");
        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());
        inner.daily_total += cost.total;
        let daily_total = inner.daily_total;
        drop(inner);

        cost_calculator::validate_daily_total(daily_total, &self.limits)?;
        Ok(event)
    }

    pub fn daily_total(&self) -> f64 {
        self.inner.lock().expect("cost tracker mutex poisoned").daily_total
    }

    /// Explicitly resets the running daily total. Never called on a timer
    /// the tracker owns; the embedding application decides when a "day"
    /// rolls over.
    pub fn reset_daily_total(&self) {
        self.inner.lock().expect("cost tracker mutex poisoned").daily_total = 0.0;
    }

    pub fn events(&self) -> Vec<CostEvent> {
        self.inner
            .lock()
            .expect("cost tracker mutex poisoned")
            .events
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cost tracker mutex poisoned").events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_core::price_table::ModelPrice;
    use router_core::types::{FinishReason, Usage};

    fn response(prompt: u32, completion: u32) -> ApiResponse {
        ApiResponse {
            content: Some("ok".to_string()),
            tool_call: None,
            usage: Usage::new(prompt, completion),
            model_api_name: "gpt-4o".to_string(),
            finish_reason: FinishReason::Stop,
            raw: None,
        }
    }

    fn tracker() -> CostTracker {
        let mut table = PriceTable::new();
        table.insert(
            Provider::OpenAi,
            "gpt-4o",
            ModelPrice {
                input_per_1k: 0.0025,
                output_per_1k: 0.01,
            },
        );
        CostTracker::new(table, CostLimits::default())
    }

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    #[test]
    fn records_one_event_and_accumulates_daily_total() {
        let tracker = tracker();
        let event = tracker
            .record(
                &response(1000, 500),
                "gpt-4o",
                Provider::OpenAi,
                "gpt-4o",
                TaskType::General,
                "trace-1",
                RunStatus::Success,
                0,
                now(),
            )
            .unwrap();
        assert!((event.cost_usd_total - 0.0075).abs() < 1e-9);
        assert!((tracker.daily_total() - 0.0075).abs() < 1e-9);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn missing_price_entry_is_a_cost_error() {
        let table = PriceTable::new();
        let tracker = CostTracker::new(table, CostLimits::default());
        let result = tracker.record(
            &response(10, 5),
            "mystery",
            Provider::OpenAi,
            "mystery",
            TaskType::General,
            "trace-2",
            RunStatus::Success,
            0,
            now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn ring_buffer_evicts_oldest_past_capacity() {
        let mut table = PriceTable::new();
        table.insert(Provider::OpenAi, "gpt-4o", ModelPrice::FREE);
        let tracker = CostTracker::with_capacity(table, CostLimits::default(), 2);
        for i in 0..3 {
            tracker
                .record(
                    &response(10, 5),
                    "gpt-4o",
                    Provider::OpenAi,
                    "gpt-4o",
                    TaskType::General,
                    &format!("trace-{i}"),
                    RunStatus::Success,
                    0,
                    now(),
                )
                .unwrap();
        }
        assert_eq!(tracker.len(), 2);
        let events = tracker.events();
        assert_eq!(events[0].trace_id, "trace-1");
        assert_eq!(events[1].trace_id, "trace-2");
    }

    #[test]
    fn reset_daily_total_zeroes_the_running_sum() {
        let tracker = tracker();
        tracker
            .record(
                &response(1000, 500),
                "gpt-4o",
                Provider::OpenAi,
                "gpt-4o",
                TaskType::General,
                "trace-3",
                RunStatus::Success,
                0,
                now(),
            )
            .unwrap();
        assert!(tracker.daily_total() > 0.0);
        tracker.reset_daily_total();
        assert_eq!(tracker.daily_total(), 0.0);
    }

    #[test]
    fn daily_limit_breach_still_records_the_event() {
        let mut table = PriceTable::new();
        table.insert(
            Provider::OpenAi,
            "gpt-4o",
            ModelPrice {
                input_per_1k: 1000.0,
                output_per_1k: 1000.0,
            },
        );
        let mut limits = CostLimits::default();
        limits.max_single_request = 1_000_000.0;
        limits.max_daily_total = 1.0;
        let tracker = CostTracker::new(table, limits);
        let result = tracker.record(
            &response(1000, 500),
            "gpt-4o",
            Provider::OpenAi,
            "gpt-4o",
            TaskType::General,
            "trace-4",
            RunStatus::Success,
            0,
            now(),
        );
        assert!(result.is_err());
        assert_eq!(tracker.len(), 1); // recorded despite the daily-limit error
    }
}
