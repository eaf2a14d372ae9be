//! The execution scheduler: parallel-group ordering, live-process registry
//! and two-phase cancellation.
//!
//! Per-job state machine: Pending → Running → {Failed, Successful}; a job
//! interrupted by a stop request returns to Pending so it can be retried.
//! The only state shared between concurrently running jobs is the process
//! registry, guarded by a mutex for every insert/remove/iterate; each Job
//! is mutated exclusively by the one worker executing it.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use ffqueue_core::time::effective_duration;
use ffqueue_core::{CapabilityCache, Job, JobStatus};

use crate::compile::compile_command;
use crate::error::QueueError;
use crate::progress::ProgressDecoder;

/// How long a gracefully stopped process gets to finalize its output
/// before being killed.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle and progress notifications published by the scheduler.
///
/// Consumers drain the receiving end of the channel handed to
/// [`Scheduler::new`]; the scheduler itself never blocks on a slow or
/// dropped consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    QueueStarted,
    JobStarted {
        id: u64,
        name: String,
    },
    JobProgress {
        id: u64,
        info: String,
        fraction: f64,
    },
    JobFinished {
        id: u64,
        status: JobStatus,
    },
    /// Completed jobs over total eligible jobs, in [0, 1].
    TotalProgress(f64),
    QueueFinished,
}

/// A registered live process. The child handle and its stdin are locked
/// separately so a graceful stop can write `q` without blocking the worker
/// that owns the stdout stream.
struct ActiveProcess {
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
}

/// Drives compiled jobs as external processes.
pub struct Scheduler {
    tool_path: PathBuf,
    events: Sender<QueueEvent>,
    registry: Arc<Mutex<HashMap<u64, Arc<ActiveProcess>>>>,
    /// Cooperative queue-level cancellation: checked before each group and
    /// sequential job, never aborts in-flight work by itself.
    cancel: AtomicBool,
    /// A graceful stop is outstanding; a second stop request escalates.
    stopping: AtomicBool,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(tool_path: impl Into<PathBuf>, events: Sender<QueueEvent>) -> Self {
        Self {
            tool_path: tool_path.into(),
            events,
            registry: Arc::new(Mutex::new(HashMap::new())),
            cancel: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs the eligible jobs to completion: parallel groups first in
    /// ascending group order (each group launched together and joined
    /// together), then sequential jobs in ascending key order.
    ///
    /// With `retry_failed_only`, jobs that are not currently Failed are
    /// skipped.
    pub fn run_queue(
        &self,
        cache: &CapabilityCache,
        jobs: &mut BTreeMap<u64, Job>,
        retry_failed_only: bool,
    ) -> Result<(), QueueError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyRunning);
        }
        self.cancel.store(false, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);
        self.emit(QueueEvent::QueueStarted);

        let eligible: Vec<(u64, &mut Job)> = jobs
            .iter_mut()
            .filter(|(_, job)| !retry_failed_only || job.status == JobStatus::Failed)
            .map(|(id, job)| (*id, job))
            .collect();
        let total = eligible.len();

        if total == 0 {
            self.emit(QueueEvent::QueueFinished);
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let mut groups: BTreeMap<u8, Vec<(u64, &mut Job)>> = BTreeMap::new();
        let mut sequential: Vec<(u64, &mut Job)> = Vec::new();
        for (id, job) in eligible {
            if job.parallel_group == 0 {
                sequential.push((id, job));
            } else {
                groups.entry(job.parallel_group).or_default().push((id, job));
            }
        }

        let mut completed = 0usize;

        for (group, members) in groups {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            debug!(group, jobs = members.len(), "launching parallel group");
            let launched = members.len();
            thread::scope(|scope| {
                for (id, job) in members {
                    scope.spawn(move || self.execute_job(id, job, cache));
                }
            });
            completed += launched;
            self.emit(QueueEvent::TotalProgress(completed as f64 / total as f64));
        }

        for (id, job) in sequential {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            self.execute_job(id, job, cache);
            completed += 1;
            self.emit(QueueEvent::TotalProgress(completed as f64 / total as f64));
        }

        self.emit(QueueEvent::TotalProgress(1.0));
        self.emit(QueueEvent::QueueFinished);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn execute_job(&self, id: u64, job: &mut Job, cache: &CapabilityCache) {
        job.status = JobStatus::Running;
        self.emit(QueueEvent::JobStarted {
            id,
            name: job.name.clone(),
        });

        let mut args = compile_command(job, cache, false);
        args.push("-nostats".to_string());
        debug!(job = id, ?args, "spawning tool");

        // Progress fractions are measured against the trimmed output
        // length, not the raw source length.
        let mut effective = 0.0f64;
        for source in &job.sources {
            for stream in source.active_streams() {
                let stream_duration = effective_duration(stream.duration, &stream.trim);
                if stream_duration > effective {
                    effective = stream_duration;
                }
            }
        }
        if effective <= 0.0 {
            effective = job.total_duration;
        }

        let spawned = Command::new(&self.tool_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                warn!(job = id, %err, "failed to spawn tool");
                job.status = JobStatus::Failed;
                job.error_log = format!("failed to spawn {}: {err}", self.tool_path.display());
                self.emit(QueueEvent::JobFinished {
                    id,
                    status: job.status,
                });
                return;
            }
        };

        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");
        let stdin = child.stdin.take();
        let process = Arc::new(ActiveProcess {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
        });
        if let Ok(mut registry) = self.registry.lock() {
            registry.insert(id, Arc::clone(&process));
        }

        // stderr is drained on its own thread so a chatty tool can never
        // deadlock against the stdout progress stream.
        let stderr_reader = thread::spawn(move || {
            let mut log = String::new();
            for line in BufReader::new(stderr).lines().map_while(|line| line.ok()) {
                log.push_str(&line);
                log.push('\n');
            }
            log
        });

        let mut decoder = ProgressDecoder::new(effective);
        for line in BufReader::new(stdout).lines().map_while(|line| line.ok()) {
            if let Some(update) = decoder.ingest_line(&line) {
                self.emit(QueueEvent::JobProgress {
                    id,
                    info: update.info,
                    fraction: update.fraction,
                });
            }
        }

        // Stdout hit EOF: the process is gone or about to be; the child
        // lock is only contended briefly by a stop watchdog.
        let exit_success = match process.child.lock() {
            Ok(mut child) => child.wait().map(|status| status.success()).unwrap_or(false),
            Err(_) => false,
        };
        job.error_log = stderr_reader.join().unwrap_or_default();

        job.status = if exit_success {
            JobStatus::Successful
        } else if self.cancel.load(Ordering::SeqCst) {
            // Interrupted rather than broken: back to Pending, retryable.
            JobStatus::Pending
        } else {
            JobStatus::Failed
        };

        if let Ok(mut registry) = self.registry.lock() {
            registry.remove(&id);
        }
        self.emit(QueueEvent::JobFinished {
            id,
            status: job.status,
        });
    }

    /// Stops the queue.
    ///
    /// Graceful: asks every live process to finalize (a literal `q` line on
    /// stdin, then the pipe closes) and kills whatever has not exited
    /// within [`GRACEFUL_STOP_TIMEOUT`]. Forced — or a second stop request
    /// while a graceful one is outstanding — kills every registered
    /// process immediately. Either way the queue driver stops before
    /// launching anything further.
    pub fn stop(&self, force: bool) {
        self.cancel.store(true, Ordering::SeqCst);
        let escalate = force || self.stopping.swap(true, Ordering::SeqCst);

        let processes: Vec<Arc<ActiveProcess>> = match self.registry.lock() {
            Ok(registry) => registry.values().cloned().collect(),
            Err(_) => return,
        };
        debug!(count = processes.len(), escalate, "stopping live processes");

        for process in processes {
            if escalate {
                kill_process(&process);
            } else {
                graceful_stop(process);
            }
        }
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }
}

fn kill_process(process: &ActiveProcess) {
    if let Ok(mut child) = process.child.lock() {
        let _ = child.kill();
    }
}

fn graceful_stop(process: Arc<ActiveProcess>) {
    if let Ok(mut slot) = process.stdin.lock() {
        if let Some(mut stdin) = slot.take() {
            let _ = writeln!(stdin, "q");
            // Dropping the handle closes the pipe and signals EOF.
        }
    }

    thread::spawn(move || {
        if let Ok(mut child) = process.child.lock() {
            match child.wait_timeout(GRACEFUL_STOP_TIMEOUT) {
                Ok(Some(status)) => {
                    debug!(?status, "process finalized after graceful stop");
                }
                _ => {
                    let _ = child.kill();
                }
            }
        }
    });
}
