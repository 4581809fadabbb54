//! Background Scheduler
//!
//! Cron-gated maintenance over the store, in three phases:
//!
//! 1. **Decay sweep**: batched scan for weak memories; candidates are
//!    re-checked, logged to the pruning log, then deleted.
//! 2. **Graph repair**: re-link nodes with degree below the minimum or
//!    drifted edge weights.
//! 3. **Reinforcement compaction**: truncate log entries past retention.
//!
//! Resource discipline: host CPU and RSS are sampled before the job and
//! after every batch; above the configured ceilings the job sleeps for a
//! backoff window. A job that exceeds `max_processing_time_ms` aborts
//! cleanly after the current batch and resumes from its cursor on the next
//! run. A stop signal is honored at batch boundaries. One job instance runs
//! at a time per scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::SchedulerConfig;
use crate::decay::DecayEngine;
use crate::error::{EngramError, Result};
use crate::graph::WaypointGraphBuilder;
use crate::storage::PersistencePort;

// ============================================================================
// RESOURCE MONITOR
// ============================================================================

/// Samples host CPU% and this process's RSS
struct ResourceMonitor {
    system: sysinfo::System,
    pid: Option<sysinfo::Pid>,
}

impl ResourceMonitor {
    fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// (global CPU %, process RSS in MB)
    fn sample(&mut self) -> (f32, u64) {
        self.system.refresh_cpu();
        let cpu = self.system.global_cpu_info().cpu_usage();
        let mut rss_mb = 0;
        if let Some(pid) = self.pid {
            if self.system.refresh_process(pid) {
                if let Some(process) = self.system.process(pid) {
                    rss_mb = process.memory() / (1024 * 1024);
                }
            }
        }
        (cpu, rss_mb)
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Outcome of one maintenance run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    /// Weak candidates examined by the decay sweep
    pub memories_scanned: usize,
    /// Memories deleted (and logged) as weak
    pub memories_pruned: usize,
    /// Nodes re-linked by graph repair
    pub nodes_repaired: usize,
    /// Reinforcement log rows compacted away
    pub reinforcements_compacted: u64,
    /// Whether the run stopped early (deadline or stop signal)
    pub aborted: bool,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Runs maintenance jobs on a cron schedule
pub struct MaintenanceScheduler {
    port: Arc<dyn PersistencePort>,
    decay: Arc<DecayEngine>,
    graph: Arc<WaypointGraphBuilder>,
    config: SchedulerConfig,
    running: AtomicBool,
    /// Sweep resume point, retained across runs
    cursor: Mutex<Option<String>>,
}

impl MaintenanceScheduler {
    /// Create a scheduler over the engine's store, decay, and graph
    pub fn new(
        port: Arc<dyn PersistencePort>,
        decay: Arc<DecayEngine>,
        graph: Arc<WaypointGraphBuilder>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            port,
            decay,
            graph,
            config,
            running: AtomicBool::new(false),
            cursor: Mutex::new(None),
        }
    }

    /// The persisted sweep cursor, if a previous run stopped mid-scan
    pub fn cursor(&self) -> Option<String> {
        self.cursor.lock().ok().and_then(|c| c.clone())
    }

    /// Run the cron loop until the stop signal flips
    ///
    /// Fires one maintenance run at each schedule match. The in-flight batch
    /// always completes; the cursor survives for the next run.
    pub async fn run_forever(&self, mut stop: watch::Receiver<bool>) {
        let schedule: cron::Schedule = match self.config.cron.parse() {
            Ok(s) => s,
            Err(e) => {
                // Config validation catches this at startup; a scheduler
                // constructed with raw config still fails safe.
                tracing::error!(error = %e, "invalid cron expression, scheduler idle");
                return;
            }
        };

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!("cron schedule has no upcoming fire time, scheduler idle");
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.run_once(Utc::now(), &mut stop.clone()).await {
                        tracing::error!(error = %e, "maintenance run failed");
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        tracing::info!("scheduler stop signal received");
                        return;
                    }
                }
            }
        }
    }

    /// Run one full maintenance job now
    ///
    /// Idempotent: a second run over the same state prunes nothing further.
    pub async fn run_once(
        &self,
        now: DateTime<Utc>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<MaintenanceReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("maintenance already running, skipping");
            return Err(EngramError::ConcurrencyLimit);
        }
        let result = self.run_job(now, stop).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_job(
        &self,
        now: DateTime<Utc>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<MaintenanceReport> {
        let started = std::time::Instant::now();
        let mut report = MaintenanceReport::default();
        let mut monitor = ResourceMonitor::new();

        self.throttle(&mut monitor).await;

        // Phase 1: decay sweep
        let mut cursor = self.cursor();
        loop {
            if *stop.borrow() {
                report.aborted = true;
                break;
            }

            let page = self.port.scan_weak(
                self.decay.config().pruning_threshold,
                self.decay.config(),
                now,
                cursor.as_deref(),
                self.config.batch_size,
            )?;

            for candidate in &page.candidates {
                report.memories_scanned += 1;
                // Recheck right before the delete: a concurrent retrieval may
                // have reinforced the memory past the threshold, and its
                // write wins.
                let Some(current) = self.port.get_memory(&candidate.id)? else {
                    continue;
                };
                if !self.decay.is_prunable(&current, now) {
                    continue;
                }
                self.port
                    .append_pruning(&self.decay.pruning_record(&current, now))?;
                self.port.delete_memory(&current.id)?;
                report.memories_pruned += 1;
            }

            cursor = page.next_cursor;
            self.set_cursor(cursor.clone());
            if cursor.is_none() {
                break;
            }
            // Deadline applies after the in-flight batch, never mid-batch
            if self.should_stop(stop, started) {
                report.aborted = true;
                break;
            }
            self.throttle(&mut monitor).await;
        }

        // Phase 2: graph repair
        if !report.aborted {
            for id in self.graph.repair_candidates()? {
                if self.should_stop(stop, started) {
                    report.aborted = true;
                    break;
                }
                match self.graph.repair_node(&id, now) {
                    Ok(outcome) if outcome.edges_created > 0 => report.nodes_repaired += 1,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(memory_id = %id, error = %e, "graph repair failed"),
                }
            }
            self.throttle(&mut monitor).await;
        }

        // Phase 3: reinforcement compaction
        if !report.aborted {
            let cutoff = now - chrono::Duration::days(self.config.reinforcement_retention_days);
            report.reinforcements_compacted = self.port.compact_reinforcements(cutoff)?;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            scanned = report.memories_scanned,
            pruned = report.memories_pruned,
            repaired = report.nodes_repaired,
            compacted = report.reinforcements_compacted,
            aborted = report.aborted,
            duration_ms = report.duration_ms,
            "maintenance run finished"
        );
        Ok(report)
    }

    fn should_stop(&self, stop: &mut watch::Receiver<bool>, started: std::time::Instant) -> bool {
        if *stop.borrow() {
            return true;
        }
        started.elapsed() >= Duration::from_millis(self.config.max_processing_time_ms)
    }

    /// Sleep for the backoff window while the host is over its ceilings
    async fn throttle(&self, monitor: &mut ResourceMonitor) {
        let (cpu, rss_mb) = monitor.sample();
        if cpu > self.config.max_cpu_percent || rss_mb > self.config.max_memory_mb {
            tracing::debug!(cpu, rss_mb, "resource ceiling hit, backing off");
            tokio::time::sleep(Duration::from_millis(self.config.backoff_ms)).await;
        }
    }

    fn set_cursor(&self, cursor: Option<String>) {
        if let Ok(mut guard) = self.cursor.lock() {
            *guard = cursor;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
