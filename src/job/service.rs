use std::{
    collections::HashSet,
    sync::{
        mpsc::{self, Receiver},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use super::{run, AppDescriptor, CancellationToken, DecompileEvent, Outcome};
use crate::{config::Config, dex::Disassembler, errors::JobError};

/// Runs decompilation jobs on background threads, at most one per package id.
#[derive(Clone)]
pub struct Decompiler {
    config: Arc<Config>,
    disassembler: Arc<dyn Disassembler>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Decompiler {
    pub fn new(config: Config, disassembler: Arc<dyn Disassembler>) -> Self {
        Self {
            config: Arc::new(config),
            disassembler,
            active: Arc::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self, package_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(package_id))
            .unwrap_or(false)
    }

    /// Starts a job for `app`. Dropping the handle's event receiver cancels
    /// the job at its next checkpoint.
    pub fn spawn(&self, app: AppDescriptor) -> Result<JobHandle, JobError> {
        self.config.output_dir(&app.package_id)?;
        let guard = ActiveGuard::claim(&self.active, &app.package_id)?;
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        let config = Arc::clone(&self.config);
        let disassembler = Arc::clone(&self.disassembler);
        let token = cancel.clone();
        let worker = thread::Builder::new()
            .name(format!("decompile-{}", app.package_id))
            .spawn(move || {
                // Released before `Finished` goes out, so a caller may start
                // the next job as soon as it sees it.
                let mut guard = Some(guard);
                run(&app, &config, disassembler.as_ref(), &token, |event| {
                    if event.is_finished() {
                        guard.take();
                    }
                    if tx.send(event).is_err() {
                        token.cancel();
                    }
                })
            })
            .map_err(|source| JobError::Io {
                path: Default::default(),
                source,
            })?;

        Ok(JobHandle {
            cancel,
            events: rx,
            worker,
        })
    }
}

/// Keeps a package id marked as running for as long as it lives.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<String>>>,
    package_id: String,
}

impl ActiveGuard {
    fn claim(active: &Arc<Mutex<HashSet<String>>>, package_id: &str) -> Result<Self, JobError> {
        let mut set = active.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(package_id.to_string()) {
            return Err(JobError::AlreadyRunning(package_id.to_string()));
        }
        Ok(Self {
            active: Arc::clone(active),
            package_id: package_id.to_string(),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut set = self.active.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.package_id);
    }
}

pub struct JobHandle {
    cancel: CancellationToken,
    events: Receiver<DecompileEvent>,
    worker: JoinHandle<Outcome>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn events(&self) -> &Receiver<DecompileEvent> {
        &self.events
    }

    /// Blocks until the job ends, discarding events not yet received.
    pub fn wait(self) -> Outcome {
        let JobHandle { events, worker, .. } = self;
        // Drain rather than drop so the job is not cancelled by a closed channel.
        for _ in events.iter() {}
        worker.join().unwrap_or_else(|_| Outcome::Error {
            message: "decompilation worker panicked".to_string(),
        })
    }
}
