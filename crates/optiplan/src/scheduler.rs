//! Interval-driven background jobs.
//!
//! Every registration gets its own thread running a current-thread tokio
//! runtime. A job fires on its interval or on a manual trigger, and stops as
//! soon as the scheduler shuts down.

use std::collections::HashMap;
use std::future::Future;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::error::WorkerError;

struct Registration {
    trigger: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    jobs: HashMap<String, Registration>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            jobs: HashMap::new(),
        }
    }

    /// Runs `callback` every `interval`, first after one full interval.
    pub fn schedule<F, Fut>(
        &mut self,
        name: &str,
        interval: Duration,
        callback: F,
    ) -> Result<(), WorkerError>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        if self.jobs.contains_key(name) {
            return Err(WorkerError::SpawnFailed(format!(
                "job '{}' is already scheduled",
                name
            )));
        }
        if interval.is_zero() {
            return Err(WorkerError::SpawnFailed(format!(
                "job '{}' needs a positive interval",
                name
            )));
        }

        let (trigger, mut trigger_rx) = broadcast::channel::<()>(4);
        let mut shutdown_rx = self.shutdown.subscribe();
        let job_name = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("scheduler-{}", name))
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("Job '{}' could not start its runtime: {}", job_name, e);
                        return;
                    }
                };

                rt.block_on(async {
                    let mut timer = tokio::time::interval(interval);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    timer.tick().await; // skip immediate first tick

                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }

                        tokio::select! {
                            _ = timer.tick() => {},
                            received = trigger_rx.recv() => match received {
                                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                                    log::info!("Job '{}' triggered manually", job_name);
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            },
                            _ = shutdown_rx.changed() => break,
                        }

                        callback()
                            .instrument(tracing::info_span!("scheduler.run", job = %job_name))
                            .await;
                    }
                    log::debug!("Job '{}' stopped", job_name);
                });
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        log::info!("Scheduled job '{}' every {:?}", name, interval);
        self.jobs
            .insert(name.to_string(), Registration { trigger, handle });
        Ok(())
    }

    /// Runs a job now instead of waiting for its interval. Returns false for
    /// unknown or stopped jobs.
    pub fn trigger(&self, name: &str) -> bool {
        self.jobs
            .get(name)
            .map(|job| job.trigger.send(()).is_ok())
            .unwrap_or(false)
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops every job and waits for its thread. A job in the middle of a run
    /// finishes that run first.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, job) in self.jobs {
            drop(job.trigger);
            if let Err(e) = job.handle.join() {
                log::error!("Job '{}' panicked: {:?}", name, e);
            }
        }
        log::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    fn wait_for(counter: &AtomicUsize, at_least: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if counter.load(Ordering::SeqCst) >= at_least {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_job_runs_on_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule("tick", Duration::from_millis(20), counting_job(&counter))
            .unwrap();

        assert!(wait_for(&counter, 2));
        scheduler.shutdown();
    }

    #[test]
    fn test_manual_trigger() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule("outbox", Duration::from_secs(3600), counting_job(&counter))
            .unwrap();

        assert!(scheduler.trigger("outbox"));
        assert!(wait_for(&counter, 1));
        assert!(!scheduler.trigger("missing"));

        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule("reminders", Duration::from_secs(3600), counting_job(&counter))
            .unwrap();

        let started = Instant::now();
        scheduler.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_and_zero_interval_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler
            .schedule("a", Duration::from_secs(60), counting_job(&counter))
            .unwrap();

        assert!(scheduler
            .schedule("a", Duration::from_secs(60), counting_job(&counter))
            .is_err());
        assert!(scheduler
            .schedule("b", Duration::ZERO, counting_job(&counter))
            .is_err());
        assert_eq!(scheduler.job_names(), vec!["a".to_string()]);

        scheduler.shutdown();
    }
}
