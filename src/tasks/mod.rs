//! Background deployment workers
//!
//! Every environment gets one worker task fed by a bounded channel. Requests
//! return as soon as their job is queued; the worker runs jobs one at a time
//! in arrival order, so two deployments to the same environment never touch
//! the stack concurrently. Production and staging workers run independently.
//!
//! Workers are detached: shutting the server down does not wait for a
//! deployment in progress.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::deployment::{Deployer, DeploymentJob};
use crate::types::{Environment, Error, ImageSet, Result};

/// Hands accepted deployments to their environment's worker
#[derive(Clone)]
pub struct DeploymentDispatcher {
    senders: HashMap<Environment, mpsc::Sender<DeploymentJob>>,
    capacity: usize,
}

impl DeploymentDispatcher {
    /// Spawn one worker per environment and return the dispatcher feeding them
    pub fn spawn(deployer: Arc<Deployer>, capacity: usize) -> (Self, Vec<JoinHandle<()>>) {
        let capacity = capacity.max(1);
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for environment in Environment::ALL {
            let (tx, rx) = mpsc::channel(capacity);
            senders.insert(environment, tx);
            handles.push(spawn_environment_worker(environment, deployer.clone(), rx));
        }

        info!(
            workers = handles.len(),
            queue_capacity = capacity,
            "Deployment workers started"
        );

        (Self { senders, capacity }, handles)
    }

    /// Queue a deployment without waiting for it to start.
    /// Returns the deploy id assigned to the job.
    pub fn submit(&self, environment: Environment, images: ImageSet) -> Result<String> {
        let sender = self.senders.get(&environment).ok_or_else(|| {
            Error::Internal(format!("No deployment worker for {}", environment))
        })?;

        let job = DeploymentJob::new(environment, images);
        let deploy_id = job.deploy_id.clone();

        match sender.try_send(job) {
            Ok(()) => {
                info!(
                    deploy_id = %deploy_id,
                    environment = %environment,
                    pending = self.pending(environment),
                    "Deployment queued"
                );
                Ok(deploy_id)
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    environment = %environment,
                    capacity = self.capacity,
                    "Deployment queue full, rejecting request"
                );
                Err(Error::QueueFull {
                    environment,
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                error!(environment = %environment, "Deployment worker has stopped");
                Err(Error::Internal(format!(
                    "Deployment worker for {} is not running",
                    environment
                )))
            }
        }
    }

    /// Number of jobs waiting in an environment's queue
    pub fn pending(&self, environment: Environment) -> usize {
        self.senders
            .get(&environment)
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }
}

/// Drain one environment's queue, running each deployment in its own task so
/// a panic inside a deployment does not take the worker down
fn spawn_environment_worker(
    environment: Environment,
    deployer: Arc<Deployer>,
    mut rx: mpsc::Receiver<DeploymentJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(environment = %environment, "Deployment worker running");

        while let Some(job) = rx.recv().await {
            let deploy_id = job.deploy_id.clone();
            let deployer = deployer.clone();
            let run = tokio::spawn(async move { deployer.run(&job).await });

            match run.await {
                Ok(status) => {
                    debug!(deploy_id = %deploy_id, status = ?status, "Deployment finished")
                }
                Err(e) => error!(
                    deploy_id = %deploy_id,
                    error = %e,
                    "Deployment task aborted unexpectedly"
                ),
            }
        }

        debug!(environment = %environment, "Deployment worker stopped");
    })
}
