//! Container orchestration client
//!
//! The deployment routine talks to the container platform through the
//! [`OrchestrationClient`] trait. [`DockerCli`] shells out to the `docker`
//! binary; tests drive the routine with a recording fake instead.
//!
//! Every method returns the raw [`CommandResult`]. Whether a nonzero exit is
//! fatal is decided by the deployment routine, not here.

mod docker;

pub use docker::DockerCli;

use crate::types::{CommandResult, Result};

#[async_trait::async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Pull an image from its registry
    async fn pull_image(&self, image: &str) -> Result<CommandResult>;

    /// Point a running service at a new image. Fails with a nonzero exit when
    /// the service does not exist yet.
    async fn update_service(&self, service: &str, image: &str) -> Result<CommandResult>;

    /// Deploy (or redeploy) a whole stack from its compose file
    async fn deploy_stack(&self, compose_file: &str, stack: &str) -> Result<CommandResult>;

    /// Remove dangling images
    async fn prune_images(&self) -> Result<CommandResult>;
}

#[cfg(test)]
pub mod testing {
    //! Recording fake used by deployment and HTTP tests

    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    use super::OrchestrationClient;
    use crate::types::{CommandResult, Result};

    /// One call made against the fake
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Pull(String),
        UpdateService { service: String, image: String },
        DeployStack { compose_file: String, stack: String },
        Prune,
    }

    #[derive(Default)]
    struct Behaviour {
        failing_pulls: HashSet<String>,
        missing_services: HashSet<String>,
        failing_stacks: HashSet<String>,
        prune_fails: bool,
    }

    /// Fake client that records calls and answers from a scripted behaviour
    #[derive(Clone, Default)]
    pub struct RecordingClient {
        calls: Arc<Mutex<Vec<Call>>>,
        behaviour: Arc<Mutex<Behaviour>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl RecordingClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Block every pull until a permit is added to the returned semaphore
        pub fn gated() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let client = Self {
                gate: Some(gate.clone()),
                ..Self::default()
            };
            (client, gate)
        }

        pub fn with_missing_service(self, service: &str) -> Self {
            self.behaviour
                .lock()
                .missing_services
                .insert(service.to_string());
            self
        }

        pub fn with_failing_pull(self, image: &str) -> Self {
            self.behaviour.lock().failing_pulls.insert(image.to_string());
            self
        }

        pub fn with_failing_stack(self, stack: &str) -> Self {
            self.behaviour.lock().failing_stacks.insert(stack.to_string());
            self
        }

        pub fn with_failing_prune(self) -> Self {
            self.behaviour.lock().prune_fails = true;
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        /// Poll until at least `count` calls were recorded or the deadline passes
        pub async fn wait_for_calls(&self, count: usize, deadline: Duration) -> Vec<Call> {
            let start = tokio::time::Instant::now();
            loop {
                let calls = self.calls();
                if calls.len() >= count || start.elapsed() >= deadline {
                    return calls;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        fn record(&self, call: Call, command: Vec<&str>, failed: bool) -> Result<CommandResult> {
            self.calls.lock().push(call);
            Ok(CommandResult {
                command: command.into_iter().map(str::to_string).collect(),
                exit_code: Some(if failed { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if failed {
                    "scripted failure".to_string()
                } else {
                    String::new()
                },
                duration: Duration::ZERO,
            })
        }
    }

    #[async_trait::async_trait]
    impl OrchestrationClient for RecordingClient {
        async fn pull_image(&self, image: &str) -> Result<CommandResult> {
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .expect("gate semaphore closed")
                    .forget();
            }
            let failed = self.behaviour.lock().failing_pulls.contains(image);
            self.record(
                Call::Pull(image.to_string()),
                vec!["docker", "pull", image],
                failed,
            )
        }

        async fn update_service(&self, service: &str, image: &str) -> Result<CommandResult> {
            let failed = self.behaviour.lock().missing_services.contains(service);
            self.record(
                Call::UpdateService {
                    service: service.to_string(),
                    image: image.to_string(),
                },
                vec!["docker", "service", "update", "--image", image, service],
                failed,
            )
        }

        async fn deploy_stack(&self, compose_file: &str, stack: &str) -> Result<CommandResult> {
            let failed = self.behaviour.lock().failing_stacks.contains(stack);
            self.record(
                Call::DeployStack {
                    compose_file: compose_file.to_string(),
                    stack: stack.to_string(),
                },
                vec!["docker", "stack", "deploy", "-c", compose_file, stack],
                failed,
            )
        }

        async fn prune_images(&self) -> Result<CommandResult> {
            let failed = self.behaviour.lock().prune_fails;
            self.record(Call::Prune, vec!["docker", "image", "prune", "-f"], failed)
        }
    }
}
