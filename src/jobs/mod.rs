//! Scheduled Jobs
//!
//! Periodic interest accrual over every account.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::LedgerEngine;
use crate::error::LedgerError;
use crate::model::AccountId;

/// Default time between interest runs
pub const DEFAULT_INTEREST_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the interest scheduler
#[derive(Debug, Clone)]
pub struct InterestSchedulerConfig {
    /// Interval between interest runs (default: 1 minute)
    pub interval: Duration,
}

impl Default for InterestSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTEREST_INTERVAL,
        }
    }
}

/// What happened to one account during a run
enum Accrual {
    Credited,
    Unchanged,
}

/// Interest Scheduler - charges interest on every account once per tick.
///
/// Clones share the run guard, so a manual `run_once` on a clone never
/// overlaps the background loop.
#[derive(Clone)]
pub struct InterestScheduler {
    engine: LedgerEngine,
    config: InterestSchedulerConfig,
    run_guard: Arc<Mutex<()>>,
}

impl InterestScheduler {
    /// Create a new scheduler with the default interval
    pub fn new(engine: LedgerEngine) -> Self {
        Self::with_config(engine, InterestSchedulerConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(engine: LedgerEngine, config: InterestSchedulerConfig) -> Self {
        Self {
            engine,
            config,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Start the scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Interest scheduler started"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            if !report.errors.is_empty() {
                tracing::warn!(
                    errors = report.errors.len(),
                    "Interest run completed with errors"
                );
            }
        }
    }

    /// Charge interest on every account once (for the loop, a manual
    /// trigger, or tests). Skipped if another run is in progress.
    pub async fn run_once(&self) -> InterestRunReport {
        let mut report = InterestRunReport::default();

        let _running = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Interest run already in progress, skipping");
                report.skipped_overlap = true;
                report.completed_at = Utc::now();
                return report;
            }
        };

        let accounts = match self.engine.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(error = %e, "Could not list accounts for interest run");
                report.errors.push(format!("Account listing: {}", e));
                report.completed_at = Utc::now();
                return report;
            }
        };

        for account in accounts {
            report.accounts_scanned += 1;
            match self.accrue(account.id()).await {
                Ok(Accrual::Credited) => report.accrued += 1,
                Ok(Accrual::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    tracing::error!(account_id = %account.id(), error = %e, "Interest accrual failed");
                    report.errors.push(format!("Account {}: {}", account.id(), e));
                }
            }
        }

        report.completed_at = Utc::now();
        tracing::info!(
            accounts_scanned = report.accounts_scanned,
            accrued = report.accrued,
            unchanged = report.unchanged,
            errors = report.errors.len(),
            "Interest run finished"
        );
        report
    }

    async fn accrue(&self, account_id: AccountId) -> Result<Accrual, JobError> {
        match self.engine.charge_interest(account_id).await? {
            Some(record) if record.is_success() => Ok(Accrual::Credited),
            Some(record) => Err(JobError::AccrualFailed {
                reference: record.reference().to_string(),
                reason: record
                    .failure_reason()
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            }),
            None => Ok(Accrual::Unchanged),
        }
    }
}

/// Report from one interest run
#[derive(Debug, Clone, Default)]
pub struct InterestRunReport {
    pub accounts_scanned: usize,
    pub accrued: usize,
    pub unchanged: usize,
    pub errors: Vec<String>,
    pub skipped_overlap: bool,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Interest record {reference} failed: {reason}")]
    AccrualFailed { reference: String, reason: String },
}

// =========================================================================
// Tests
// =========================================================================
