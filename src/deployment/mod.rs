//! Deployment routine
//!
//! A deployment pulls both images, then points each service at its new image.
//! When a service update fails (typically because the stack has never been
//! deployed) the whole stack is deployed from its compose file instead.
//!
//! Checked steps (pulls, stack deploys) abort the routine on a nonzero exit.
//! Unchecked steps (service updates, image pruning) only drive branching or
//! are ignored. There are no retries and no rollback; the outcome is logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::config::{DeployConfig, StackTarget};
use crate::logging;
use crate::orchestration::OrchestrationClient;
use crate::types::{DeploymentStatus, Environment, ImageSet, Result};

/// One accepted deployment request waiting to run
#[derive(Debug, Clone)]
pub struct DeploymentJob {
    pub deploy_id: String,
    pub environment: Environment,
    pub images: ImageSet,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl DeploymentJob {
    pub fn new(environment: Environment, images: ImageSet) -> Self {
        Self {
            deploy_id: generate_deploy_id(),
            environment,
            images,
            received_at: chrono::Utc::now(),
        }
    }
}

/// Per-process counter keeping ids unique within the same millisecond
static DEPLOY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a deployment ID used to correlate log lines
pub fn generate_deploy_id() -> String {
    let now = chrono::Utc::now();
    let sequence = DEPLOY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "deploy-{}-{:03}-{:04}",
        now.format("%Y%m%d-%H%M%S"),
        now.timestamp_subsec_millis(),
        sequence
    )
}

/// Which half of the application a service update concerns
#[derive(Debug, Clone, Copy)]
enum Component {
    Backend,
    Frontend,
}

impl Component {
    fn label(&self) -> &'static str {
        match self {
            Component::Backend => "Backend",
            Component::Frontend => "Frontend",
        }
    }
}

/// Runs the deployment routine against an orchestration client
pub struct Deployer {
    client: Arc<dyn OrchestrationClient>,
    config: DeployConfig,
}

impl Deployer {
    pub fn new(client: Arc<dyn OrchestrationClient>, config: DeployConfig) -> Self {
        Self { client, config }
    }

    /// Run a deployment to completion and report how it ended.
    /// Failures are logged here and never propagated.
    pub async fn run(&self, job: &DeploymentJob) -> DeploymentStatus {
        let span = logging::deployment_span(&job.deploy_id, job.environment);

        async {
            info!(
                backend = %job.images.backend,
                frontend = %job.images.frontend,
                queued_ms = (chrono::Utc::now() - job.received_at).num_milliseconds(),
                status = ?DeploymentStatus::Started,
                "Starting deployment to {}",
                job.environment
            );

            let target = self.config.target(job.environment);
            match self.execute(target, &job.images).await {
                Ok(()) => {
                    info!(
                        status = ?DeploymentStatus::Completed,
                        "{} deployment completed",
                        title_case(job.environment.as_str())
                    );
                    DeploymentStatus::Completed
                }
                Err(e) => {
                    error!(
                        status = ?DeploymentStatus::Failed,
                        error = %e,
                        "Deployment failed"
                    );
                    DeploymentStatus::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, target: &StackTarget, images: &ImageSet) -> Result<()> {
        info!(stack = %target.stack, "Deploying stack");

        self.client.pull_image(&images.backend).await?.check()?;
        self.client.pull_image(&images.frontend).await?.check()?;

        self.update_or_deploy(
            target,
            Component::Backend,
            &target.backend_service,
            &images.backend,
        )
        .await?;
        self.update_or_deploy(
            target,
            Component::Frontend,
            &target.frontend_service,
            &images.frontend,
        )
        .await?;

        if target.prune_images {
            match self.client.prune_images().await {
                Ok(result) if !result.success() => {
                    warn!(exit_code = result.exit_code, "Image prune failed, ignoring")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Image prune could not run, ignoring"),
            }
        }

        Ok(())
    }

    /// Update a live service, falling back to a full stack deploy when the
    /// update is rejected
    async fn update_or_deploy(
        &self,
        target: &StackTarget,
        component: Component,
        service: &str,
        image: &str,
    ) -> Result<()> {
        let update = self.client.update_service(service, image).await?;
        if update.success() {
            info!(service = %service, image = %image, "{} service updated", component.label());
            return Ok(());
        }

        info!(
            service = %service,
            exit_code = update.exit_code,
            "{} service not found, deploying stack...",
            component.label()
        );
        self.client
            .deploy_stack(&target.compose_file, &target.stack)
            .await?
            .check()?;
        Ok(())
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
