//! Shop-floor scanner intake: authenticated image/PDF uploads processed on a
//! background thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use secrecy::{ExposeSecret, SecretString};

use crate::db::price_repo::JobSource;
use crate::error::{IngestError, WorkerError};

use super::ingest::{CancelFlag, DocumentKind, PriceIngestPipeline, PriceUpload};

pub const DEVICE_MAX_BYTES: usize = 25 * 1024 * 1024;

const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct IngestTask {
    pub job_id: String,
    pub cancel: CancelFlag,
}

type InFlight = Arc<Mutex<HashMap<String, CancelFlag>>>;

pub struct DeviceIntake {
    pipeline: Arc<PriceIngestPipeline>,
    secret: SecretString,
    max_bytes: usize,
    queue: Sender<IngestTask>,
    in_flight: InFlight,
}

impl DeviceIntake {
    /// Creates the intake and its ingest thread. The thread exits once the
    /// intake is dropped and the queue is drained.
    pub fn start(
        pipeline: Arc<PriceIngestPipeline>,
        secret: SecretString,
        max_bytes: usize,
    ) -> Result<(Self, JoinHandle<()>), WorkerError> {
        let (queue, receiver) = bounded::<IngestTask>(QUEUE_CAPACITY);
        let in_flight: InFlight = Arc::default();

        let worker_pipeline = Arc::clone(&pipeline);
        let worker_in_flight = Arc::clone(&in_flight);
        let handle = thread::Builder::new()
            .name("price-ingest".to_string())
            .spawn(move || run_ingest_worker(worker_pipeline, receiver, worker_in_flight))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok((
            Self {
                pipeline,
                secret,
                max_bytes,
                queue,
                in_flight,
            },
            handle,
        ))
    }

    /// Authenticates, stores a PENDING job and queues it. Returns the job id.
    pub fn submit(&self, presented_secret: &str, upload: PriceUpload) -> Result<String, IngestError> {
        if !constant_time_eq(presented_secret.as_bytes(), self.secret.expose_secret().as_bytes()) {
            return Err(IngestError::Unauthorized);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(IngestError::TooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }
        match DocumentKind::from_filename(&upload.filename)? {
            DocumentKind::Pdf | DocumentKind::Image => {}
            DocumentKind::Spreadsheet => {
                return Err(IngestError::UnsupportedExtension(upload.filename.clone()))
            }
        }

        let job_id = self.pipeline.create_job(upload, JobSource::Device)?;
        let cancel = CancelFlag::new();
        lock(&self.in_flight).insert(job_id.clone(), cancel.clone());

        if self
            .queue
            .send(IngestTask {
                job_id: job_id.clone(),
                cancel,
            })
            .is_err()
        {
            lock(&self.in_flight).remove(&job_id);
            let err = IngestError::QueueClosed;
            self.pipeline.abandon_job(&job_id, &err);
            return Err(err);
        }

        debug!("Queued device job {}", job_id);
        Ok(job_id)
    }

    /// Requests cancellation of a queued or running job.
    pub fn cancel(&self, job_id: &str) -> bool {
        match lock(&self.in_flight).get(job_id) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, CancelFlag>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_ingest_worker(
    pipeline: Arc<PriceIngestPipeline>,
    receiver: Receiver<IngestTask>,
    in_flight: InFlight,
) {
    info!("Price ingest worker started");
    for task in receiver.iter() {
        match pipeline.process_job(&task.job_id, &task.cancel) {
            Ok(rows) => debug!("Device job {} stored {} row(s)", task.job_id, rows),
            Err(e) => error!("Device job {} failed: {}", task.job_id, e),
        }
        lock(&in_flight).remove(&task.job_id);
    }
    info!("Price ingest worker stopped");
}

/// Length is not secret; content is compared without early exit.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
