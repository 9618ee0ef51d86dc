//! The advisor: scores every coin in the universe and recommends the one with
//! the highest predicted growth.
//!
//! Each coin runs the same independent pipeline: fetch history, build features,
//! gate on [`MIN_FEATURE_ROWS`], score. A failure in one coin's pipeline is
//! logged and costs only that coin. Runs are cooperatively cancellable in both
//! execution modes, and a cancelled run never yields a recommendation.
//!
//! Scores are collected by universe index and reduced in universe order, so an
//! exact tie goes to the coin listed first regardless of completion order.

use crate::domain::cancellation::CancellationToken;
use crate::domain::coin::{Coin, Universe};
use crate::domain::features::{MIN_FEATURE_ROWS, build_features};
use crate::domain::scorer::{GrowthScore, Scorer};
use crate::ports::market_data_port::MarketDataPort;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!(
                "unknown mode '{other}', expected 'sequential' or 'concurrent'"
            )),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Concurrent => f.write_str("concurrent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    pub lookback_days: u32,
    pub mode: ExecutionMode,
    /// Upper bound on worker threads; the effective count is also capped by
    /// available parallelism and the universe size.
    pub max_workers: usize,
    /// How often the orchestrator re-checks cancellation while workers run.
    pub poll_interval: Duration,
    /// Total wait for workers before reducing whatever has been scored.
    pub wait_timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            lookback_days: 14,
            mode: ExecutionMode::Concurrent,
            max_workers: 4,
            poll_interval: Duration::from_millis(200),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// Finished without a single usable score.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorReport {
    pub state: RunState,
    /// Successful scores in universe order. Empty for a cancelled run.
    pub scores: Vec<GrowthScore>,
    pub recommendation: Option<String>,
}

impl AdvisorReport {
    fn cancelled() -> Self {
        Self {
            state: RunState::Cancelled,
            scores: Vec::new(),
            recommendation: None,
        }
    }

    fn from_scores(scores: Vec<GrowthScore>) -> Self {
        let recommendation = select_winner(&scores).map(|s| s.symbol.clone());
        let state = if recommendation.is_some() {
            RunState::Completed
        } else {
            RunState::Failed
        };
        Self {
            state,
            scores,
            recommendation,
        }
    }
}

/// Highest growth wins; on equal growth the earlier entry is kept.
pub fn select_winner(scores: &[GrowthScore]) -> Option<&GrowthScore> {
    let mut best: Option<&GrowthScore> = None;
    for score in scores {
        match best {
            Some(b) if score.growth <= b.growth => {}
            _ => best = Some(score),
        }
    }
    best
}

pub struct Advisor {
    market: Arc<dyn MarketDataPort>,
    scorer: Arc<dyn Scorer>,
    config: AdvisorConfig,
    state: Mutex<RunState>,
}

impl Advisor {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        scorer: Arc<dyn Scorer>,
        config: AdvisorConfig,
    ) -> Self {
        Self {
            market,
            scorer,
            config,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// State of the most recent run, `Idle` before the first.
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Recommended symbol, or `None` when the run was cancelled or no coin
    /// could be scored.
    pub fn run(&self, universe: &Universe, token: &CancellationToken) -> Option<String> {
        self.evaluate(universe, token).recommendation
    }

    /// [`Advisor::run`] with the lookback and execution mode given per call
    /// instead of taken from the config.
    pub fn run_with(
        &self,
        universe: &Universe,
        lookback_days: u32,
        mode: ExecutionMode,
        token: &CancellationToken,
    ) -> Option<String> {
        self.evaluate_with(universe, lookback_days, mode, token)
            .recommendation
    }

    pub fn evaluate(&self, universe: &Universe, token: &CancellationToken) -> AdvisorReport {
        self.evaluate_with(universe, self.config.lookback_days, self.config.mode, token)
    }

    pub fn evaluate_with(
        &self,
        universe: &Universe,
        lookback_days: u32,
        mode: ExecutionMode,
        token: &CancellationToken,
    ) -> AdvisorReport {
        *self.state.lock() = RunState::Running;
        info!(
            mode = %mode,
            coins = universe.count(),
            days = lookback_days,
            "advisor run started"
        );

        let report = match mode {
            ExecutionMode::Sequential => self.evaluate_sequential(universe, lookback_days, token),
            ExecutionMode::Concurrent => self.evaluate_concurrent(universe, lookback_days, token),
        };

        match (&report.state, &report.recommendation) {
            (RunState::Cancelled, _) => info!("advisor run cancelled"),
            (_, Some(symbol)) => info!(symbol = %symbol, scored = report.scores.len(), "recommendation"),
            (_, None) => warn!("no coin produced a usable score"),
        }
        *self.state.lock() = report.state;
        report
    }

    fn evaluate_sequential(
        &self,
        universe: &Universe,
        days: u32,
        token: &CancellationToken,
    ) -> AdvisorReport {
        let mut scores = Vec::new();
        for coin in &universe.coins {
            if token.is_cancelled() {
                return AdvisorReport::cancelled();
            }
            if let Some(score) =
                score_coin(self.market.as_ref(), self.scorer.as_ref(), coin, days)
            {
                scores.push(score);
            }
        }
        AdvisorReport::from_scores(scores)
    }

    fn evaluate_concurrent(
        &self,
        universe: &Universe,
        days: u32,
        token: &CancellationToken,
    ) -> AdvisorReport {
        if token.is_cancelled() {
            return AdvisorReport::cancelled();
        }

        let coins = Arc::new(universe.coins.clone());
        let workers = worker_count(self.config.max_workers, coins.len());
        let results: Arc<DashMap<usize, GrowthScore>> = Arc::new(DashMap::new());
        let next = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let coins = Arc::clone(&coins);
            let results = Arc::clone(&results);
            let next = Arc::clone(&next);
            let shutdown = Arc::clone(&shutdown);
            let market = Arc::clone(&self.market);
            let scorer = Arc::clone(&self.scorer);
            let token = token.clone();
            let done = done_tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("advisor-worker-{worker}"))
                .spawn(move || {
                    loop {
                        if token.is_cancelled() || shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::AcqRel);
                        let Some(coin) = coins.get(index) else {
                            break;
                        };
                        if let Some(score) = score_coin(market.as_ref(), scorer.as_ref(), coin, days)
                        {
                            results.insert(index, score);
                        }
                    }
                    let _ = done.send(());
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(worker, error = %e, "failed to spawn advisor worker"),
            }
        }
        drop(done_tx);

        if handles.is_empty() {
            warn!("no workers available, falling back to sequential evaluation");
            return self.evaluate_sequential(universe, days, token);
        }
        debug!(workers = handles.len(), "advisor workers started");

        // `None` when the timeout is too large to represent: wait without a deadline.
        let deadline = Instant::now().checked_add(self.config.wait_timeout);
        let mut finished = 0;
        let mut timed_out = false;
        while finished < handles.len() {
            if token.is_cancelled() {
                shutdown.store(true, Ordering::Release);
                return AdvisorReport::cancelled();
            }
            let mut wait = self.config.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    timed_out = true;
                    break;
                }
                wait = wait.min(deadline - now);
            }
            match done_rx.recv_timeout(wait) {
                Ok(()) => finished += 1,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        shutdown.store(true, Ordering::Release);

        if token.is_cancelled() {
            return AdvisorReport::cancelled();
        }

        if timed_out {
            warn!(
                finished,
                workers = handles.len(),
                timeout_secs = self.config.wait_timeout.as_secs(),
                "timed out waiting for workers, using partial results"
            );
        } else {
            for handle in handles {
                if handle.join().is_err() {
                    error!("advisor worker panicked");
                }
            }
        }

        let mut scored: Vec<(usize, GrowthScore)> = results
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        scored.sort_by_key(|(index, _)| *index);
        AdvisorReport::from_scores(scored.into_iter().map(|(_, score)| score).collect())
    }
}

fn worker_count(max_workers: usize, coins: usize) -> usize {
    max_workers.min(num_cpus::get()).min(coins).max(1)
}

/// One coin's pipeline. Every failure is logged with the coin id and yields `None`.
fn score_coin(
    market: &dyn MarketDataPort,
    scorer: &dyn Scorer,
    coin: &Coin,
    days: u32,
) -> Option<GrowthScore> {
    let series = match market.historical_series(&coin.id, days) {
        Ok(series) => series,
        Err(e) => {
            warn!(coin = %coin.id, error = %e, "failed to fetch history, skipping");
            return None;
        }
    };

    let table = build_features(&series);
    if table.len() < MIN_FEATURE_ROWS {
        warn!(
            coin = %coin.id,
            points = series.len(),
            rows = table.len(),
            minimum = MIN_FEATURE_ROWS,
            "insufficient data, skipping"
        );
        return None;
    }

    match scorer.score(&coin.symbol, &table) {
        Ok(score) if score.growth.is_finite() => Some(score),
        Ok(score) => {
            warn!(coin = %coin.id, growth = score.growth, "non-finite growth, skipping");
            None
        }
        Err(e) => {
            warn!(coin = %coin.id, error = %e, "scoring failed, skipping");
            None
        }
    }
}
