use tracing::debug;

use super::OrchestrationClient;
use crate::execution::CommandExecutor;
use crate::types::{CommandResult, Result};

/// Orchestration client backed by the `docker` command line (swarm mode)
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    executor: CommandExecutor,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, executor: CommandExecutor) -> Self {
        Self {
            binary: binary.into(),
            executor,
        }
    }

    fn argv(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.binary.as_str())
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    async fn run(&self, args: &[&str]) -> Result<CommandResult> {
        let command = self.argv(args);
        debug!(binary = %self.binary, args = ?args, "Invoking docker");
        self.executor.execute(&command).await
    }
}

#[async_trait::async_trait]
impl OrchestrationClient for DockerCli {
    async fn pull_image(&self, image: &str) -> Result<CommandResult> {
        self.run(&["pull", image]).await
    }

    async fn update_service(&self, service: &str, image: &str) -> Result<CommandResult> {
        self.run(&["service", "update", "--image", image, service])
            .await
    }

    async fn deploy_stack(&self, compose_file: &str, stack: &str) -> Result<CommandResult> {
        self.run(&["stack", "deploy", "-c", compose_file, stack])
            .await
    }

    async fn prune_images(&self) -> Result<CommandResult> {
        self.run(&["image", "prune", "-f"]).await
    }
}
