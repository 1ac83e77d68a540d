// ABOUTME: Lifecycle orchestrator draining the intent queue and driving fleet state to match
// ABOUTME: Each intent is isolated; failures are requeued with backoff or dead-lettered

use crate::error::{OrchestratorError, Result};
use crate::fleet::{FleetError, FleetProvider};
use runbox_core::{CompletionEvent, FleetNode, LifecycleIntent, Project};
use runbox_storage::{
    CompletionPublisher, InstanceRegistry, IntentQueue, QueuedIntent, StorageError,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Total tries per intent before it is dead-lettered
    pub max_attempts: u32,
    /// Requeue delay, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Bound on every fleet provider call
    pub fleet_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(2000),
            fleet_timeout: Duration::from_secs(120),
        }
    }
}

/// What happened to a single dequeued intent
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Provisioned(FleetNode),
    Decommissioned(FleetNode),
    /// Down intent for an address the registry does not know
    Skipped,
    Requeued { attempt: u32, error: String },
    DeadLettered { error: String },
}

/// Result of tearing down the whole registered fleet
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecommissionReport {
    pub destroyed: Vec<FleetNode>,
    pub failed: Vec<(FleetNode, String)>,
}

pub struct LifecycleOrchestrator {
    queue: Arc<dyn IntentQueue>,
    registry: Arc<dyn InstanceRegistry>,
    fleet: Arc<dyn FleetProvider>,
    publisher: Arc<dyn CompletionPublisher>,
    config: OrchestratorConfig,
}

impl LifecycleOrchestrator {
    pub fn new(
        queue: Arc<dyn IntentQueue>,
        registry: Arc<dyn InstanceRegistry>,
        fleet: Arc<dyn FleetProvider>,
        publisher: Arc<dyn CompletionPublisher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            fleet,
            publisher,
            config,
        }
    }

    /// Consume intents until `cancel` fires. An intent already being handled
    /// is finished first so no provisioned node goes unrecorded.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Lifecycle orchestrator started with {} fleet provider",
            self.fleet.name()
        );

        loop {
            let item = match self.queue.pop(&cancel).await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to dequeue intent: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_backoff) => continue,
                    }
                }
            };

            if let Err(e) = self.handle(item).await {
                error!("Failed to settle intent, it may be lost: {}", e);
            }
        }

        info!("Lifecycle orchestrator stopped");
    }

    /// Process one dequeued intent and settle it: done, requeued or dead-lettered
    pub async fn handle(&self, item: QueuedIntent) -> std::result::Result<IntentOutcome, StorageError> {
        let attempt = item.attempts + 1;
        debug!("Handling intent {} (attempt {})", item.id, attempt);

        let error = match self.process(&item.payload).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        if error.is_retryable() && attempt < self.config.max_attempts {
            let delay = self.config.retry_backoff * attempt;
            warn!(
                "Intent {} failed on attempt {}/{}, retrying in {:?}: {}",
                item.id, attempt, self.config.max_attempts, delay, error
            );
            let message = error.to_string();
            self.queue.requeue(item, &message, delay).await?;
            return Ok(IntentOutcome::Requeued {
                attempt,
                error: message,
            });
        }

        error!(
            "Intent {} dead-lettered after {} attempt(s): {}",
            item.id, attempt, error
        );
        let message = error.to_string();
        self.queue.dead_letter(item, &message).await?;
        Ok(IntentOutcome::DeadLettered { error: message })
    }

    async fn process(&self, payload: &str) -> Result<IntentOutcome> {
        let intent = LifecycleIntent::parse(payload)?;
        info!(
            "Dequeued {} intent for project {}",
            intent.kind(),
            intent.project_id().unwrap_or("-")
        );

        match intent {
            LifecycleIntent::Up { project } => self.bring_up(project).await,
            LifecycleIntent::Down { address, .. } => self.tear_down(&address).await,
        }
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = crate::fleet::Result<T>>,
    {
        match tokio::time::timeout(self.config.fleet_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OrchestratorError::Timeout {
                operation: operation.to_string(),
                timeout: self.config.fleet_timeout,
            }),
        }
    }

    async fn bring_up(&self, project: Project) -> Result<IntentOutcome> {
        let node = match self
            .bounded("provision", self.fleet.provision(&project))
            .await
        {
            Ok(node) => node,
            Err(OrchestratorError::Timeout { timeout, .. }) => {
                error!(
                    "Provisioning for project {} timed out after {:?}; check the fleet for an unregistered node",
                    project.id, timeout
                );
                return Err(OrchestratorError::ProvisionTimeout {
                    project_id: project.id,
                    timeout,
                });
            }
            Err(e) => return Err(e),
        };
        info!(
            "Provisioned node {} at {} for project {}",
            node.node_id, node.address, project.id
        );

        match self.registry.put(&node.address, &node.node_id).await {
            Ok(_) => {}
            Err(e @ StorageError::RegistryConflict { .. }) => {
                // The new node stays up; a duplicate address needs a human
                error!(
                    "Registry conflict for node {} at {}, leaving it running for manual resolution",
                    node.node_id, node.address
                );
                return Err(e.into());
            }
            Err(e) => return Err(self.roll_back(node, e).await),
        }

        let event = CompletionEvent {
            project,
            ip: node.address.clone(),
        };
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                "Node {} registered but completion for project {} was not published: {}",
                node.node_id, event.project.id, e
            );
        }

        Ok(IntentOutcome::Provisioned(node))
    }

    /// Destroy a node that could not be registered so it does not leak
    async fn roll_back(&self, node: FleetNode, source: StorageError) -> OrchestratorError {
        warn!(
            "Failed to register node {} at {}, destroying it: {}",
            node.node_id, node.address, source
        );

        let rolled_back = match self
            .bounded("destroy", self.fleet.destroy(&node.node_id))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Node {} at {} is running but unregistered: {}",
                    node.node_id, node.address, e
                );
                false
            }
        };

        OrchestratorError::RegistrationFailed {
            node,
            rolled_back,
            source,
        }
    }

    async fn tear_down(&self, address: &str) -> Result<IntentOutcome> {
        let Some(node) = self.registry.find(address).await? else {
            info!("No fleet node registered at {}, ignoring down intent", address);
            return Ok(IntentOutcome::Skipped);
        };

        self.destroy_node(&node).await?;
        Ok(IntentOutcome::Decommissioned(node))
    }

    /// Destroy then deregister. The registry entry survives any failed destroy.
    async fn destroy_node(&self, node: &FleetNode) -> Result<()> {
        info!(
            "Decommissioning node {} at {}; project artifacts are not persisted here",
            node.node_id, node.address
        );

        match self
            .bounded("destroy", self.fleet.destroy(&node.node_id))
            .await
        {
            Ok(()) => {}
            // Already gone, e.g. a previous attempt destroyed it but failed to deregister
            Err(OrchestratorError::Fleet(FleetError::NodeNotFound(_))) => {
                warn!(
                    "Fleet no longer knows node {}, dropping its registry entry",
                    node.node_id
                );
            }
            Err(e) => {
                error!(
                    "Failed to destroy node {} at {}, keeping registry entry: {}",
                    node.node_id, node.address, e
                );
                return Err(e);
            }
        }

        self.registry.remove(&node.address).await?;
        info!("Destroyed node {} at {}", node.node_id, node.address);
        Ok(())
    }

    /// Destroy every registered node, deregistering only those destroyed
    pub async fn decommission_all(&self) -> Result<DecommissionReport> {
        let nodes = self.registry.list().await?;
        info!("Decommissioning {} registered node(s)", nodes.len());

        let mut report = DecommissionReport::default();
        for node in nodes {
            match self.destroy_node(&node).await {
                Ok(()) => report.destroyed.push(node),
                Err(e) => report.failed.push((node, e.to_string())),
            }
        }

        Ok(report)
    }
}
