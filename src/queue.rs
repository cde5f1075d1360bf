//! Serialized build execution.
//!
//! The initial full build and every rebuild requested by the watcher go
//! through one worker thread, so a single-file rebuild never runs while a
//! full build is writing the same destination tree.

use crate::{
    build::{Builder, Outcome},
    log,
};
use anyhow::{Context, Result, anyhow};
use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
    thread::{self, JoinHandle},
};

/// Unit of work for the build worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildJob {
    /// Walk and build the whole source tree.
    Full,
    /// Rebuild one file, relative to the source root.
    File(PathBuf),
}

/// Handle to the build worker thread.
pub struct BuildQueue {
    sender: mpsc::Sender<BuildJob>,
    worker: JoinHandle<()>,
}

impl BuildQueue {
    pub fn spawn(builder: Arc<Builder>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<BuildJob>();

        let worker = thread::Builder::new()
            .name("build".into())
            .spawn(move || {
                for job in receiver {
                    run_job(&builder, job);
                }
            })
            .context("Failed to spawn build worker")?;

        Ok(Self { sender, worker })
    }

    /// Queue a job; jobs run one at a time in submission order.
    pub fn submit(&self, job: BuildJob) -> Result<()> {
        self.sender
            .send(job)
            .map_err(|_| anyhow!("build worker has stopped"))
    }

    /// A cloneable submitter for other threads.
    pub fn sender(&self) -> mpsc::Sender<BuildJob> {
        self.sender.clone()
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    ///
    /// Senders handed out by [`BuildQueue::sender`] must be dropped first,
    /// otherwise this blocks.
    pub fn shutdown(self) -> Result<()> {
        drop(self.sender);
        self.worker
            .join()
            .map_err(|_| anyhow!("build worker panicked"))
    }
}

fn run_job(builder: &Builder, job: BuildJob) {
    match job {
        BuildJob::Full => {
            if let Err(err) = builder.build_tree() {
                log!("error"; "{err:#}");
            }
        }
        BuildJob::File(rel) => match builder.build_file(&rel) {
            Ok(Outcome::Skipped) => {}
            Ok(_) => log!("watch"; "rebuilt {}", rel.display()),
            Err(err) => log!("error"; "{}: {:#}", rel.display(), err),
        },
    }
}
