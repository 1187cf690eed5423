//! Scoped tick-phase timing.
//!
//! A tracker is owned by the game loop and passed to whoever needs it;
//! never a process-wide facility. Scopes nest: `begin("tick")`,
//! `begin("los")`, `end()`, `end()` accumulates under "tick" and
//! "tick/los". Disabled trackers cost two branches per call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

pub struct PerfTracker {
    enabled: bool,
    stack: Vec<(&'static str, Instant)>,
    totals: HashMap<String, (Duration, u64)>,
    last_flush: Instant,
}

impl PerfTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stack: Vec::new(),
            totals: HashMap::new(),
            last_flush: Instant::now(),
        }
    }

    pub fn begin(&mut self, name: &'static str) {
        if !self.enabled {
            return;
        }
        self.stack.push((name, Instant::now()));
    }

    pub fn end(&mut self) {
        if !self.enabled {
            return;
        }
        let Some((name, started)) = self.stack.pop() else {
            return;
        };
        let elapsed = started.elapsed();
        let mut path = String::new();
        for (ancestor, _) in &self.stack {
            path.push_str(ancestor);
            path.push('/');
        }
        path.push_str(name);
        let slot = self.totals.entry(path).or_insert((Duration::ZERO, 0));
        slot.0 += elapsed;
        slot.1 += 1;
    }

    /// Log and reset accumulated scopes once per flush interval.
    pub fn maybe_flush(&mut self) {
        if !self.enabled || self.last_flush.elapsed() < FLUSH_INTERVAL {
            return;
        }
        let mut scopes: Vec<_> = self.totals.drain().collect();
        scopes.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, (total, count)) in scopes {
            info!(
                scope = %path,
                total_ms = total.as_secs_f64() * 1000.0,
                calls = count,
                avg_ms = total.as_secs_f64() * 1000.0 / count.max(1) as f64,
                "perf scope"
            );
        }
        self.last_flush = Instant::now();
    }
}
