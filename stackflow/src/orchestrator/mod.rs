//! Ordered, fail-fast execution of a deployment plan.

mod result;

pub use result::{AbortInfo, AbortReason, PlanResult, StackReport};

use crate::cancellation::CancellationToken;
use crate::config::DeployConfig;
use crate::errors::{ConfigError, StackflowError};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::lifecycle::{PollConfig, RetryConfig, StackLifecycleController};
use crate::outputs::OutputTable;
use crate::plan::DeploymentPlan;
use crate::provider::ProviderRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Applies the stacks of a plan one at a time, in order.
///
/// Each stack's bindings are resolved from the outputs of stacks that
/// already succeeded in the same run. The first failure stops the run;
/// nothing is rolled back.
pub struct DeploymentOrchestrator {
    providers: ProviderRegistry,
    controller: StackLifecycleController,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("providers", &self.providers)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator with default polling and retry settings.
    #[must_use]
    pub fn new(providers: ProviderRegistry) -> Self {
        Self::with_settings(providers, PollConfig::default(), RetryConfig::default())
    }

    /// Creates an orchestrator using the polling and retry settings of a
    /// deployment config.
    #[must_use]
    pub fn from_config(providers: ProviderRegistry, config: &DeployConfig) -> Self {
        Self::with_settings(providers, config.poll.clone(), config.retry.clone())
    }

    /// Creates an orchestrator with explicit polling and retry settings.
    #[must_use]
    pub fn with_settings(providers: ProviderRegistry, poll: PollConfig, retry: RetryConfig) -> Self {
        let cancel = CancellationToken::new();
        Self {
            providers,
            controller: StackLifecycleController::new(poll, retry).with_cancellation(cancel.clone()),
            events: Arc::new(NoOpEventSink),
            cancel,
        }
    }

    /// Sets the event sink for plan and stack events.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.controller = std::mem::take(&mut self.controller).with_events(events.clone());
        self.events = events;
        self
    }

    /// Sets the cancellation token for the run.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.controller = std::mem::take(&mut self.controller).with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs the plan.
    ///
    /// Stack failures, missing outputs and cancellation are reported in the
    /// returned [`PlanResult`].
    ///
    /// # Errors
    ///
    /// Returns `StackflowError::Config` before contacting any provider if a
    /// region used by the plan has no registered client.
    pub async fn run(&self, plan: &DeploymentPlan) -> Result<PlanResult, StackflowError> {
        self.preflight(plan)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut table = OutputTable::new();
        let mut completed = Vec::with_capacity(plan.len());

        info!(%run_id, plan = plan.name(), stacks = plan.len(), "Starting deployment plan");
        self.events.emit(
            events::PLAN_STARTED,
            Some(serde_json::json!({
                "run_id": run_id.to_string(),
                "plan": plan.name(),
                "stacks": plan.len(),
            })),
        );

        let mut aborted_at = None;
        for (index, spec) in plan.stacks().iter().enumerate() {
            if self.cancel.is_cancelled() {
                aborted_at = Some(AbortInfo {
                    index,
                    stack: spec.name().to_string(),
                    reason: AbortReason::Cancelled {
                        reason: self.cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                    },
                });
                break;
            }

            info!(stack = spec.name(), region = %spec.region(), index, "Deploying stack");
            self.events.emit(
                events::PLAN_STACK_STARTED,
                Some(serde_json::json!({
                    "index": index,
                    "stack": spec.name(),
                    "region": spec.region().as_str(),
                })),
            );

            let parameters = match table.resolve_bindings(spec) {
                Ok(parameters) => parameters,
                Err(missing) => {
                    aborted_at = Some(AbortInfo {
                        index,
                        stack: spec.name().to_string(),
                        reason: AbortReason::MissingOutput(missing),
                    });
                    break;
                }
            };

            let client = self.providers.client(spec.region()).ok_or_else(|| ConfigError::MissingClient {
                region: spec.region().to_string(),
                stack: spec.name().to_string(),
            })?;

            let stack_start = Instant::now();
            let outcome = self.controller.ensure(client.as_ref(), spec, parameters).await;
            let failure = outcome.failure().cloned();
            if let Some(outputs) = outcome.outputs() {
                table.merge(spec.name(), outputs.clone());
            }

            completed.push(StackReport {
                stack: spec.name().to_string(),
                region: spec.region().clone(),
                outcome,
                duration_ms: stack_start.elapsed().as_secs_f64() * 1000.0,
            });

            if let Some(failure) = failure {
                aborted_at = Some(AbortInfo {
                    index,
                    stack: spec.name().to_string(),
                    reason: AbortReason::Failed(failure),
                });
                break;
            }
        }

        let result = PlanResult {
            run_id,
            plan: plan.name().to_string(),
            started_at,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            completed,
            aborted_at,
        };

        match &result.aborted_at {
            Some(abort) => {
                error!(%run_id, stack = %abort.stack, "Deployment plan aborted: {}", abort.reason);
                self.events.emit(
                    events::PLAN_ABORTED,
                    Some(serde_json::json!({
                        "run_id": run_id.to_string(),
                        "index": abort.index,
                        "stack": abort.stack,
                        "reason": abort.reason,
                    })),
                );
            }
            None => {
                info!(%run_id, duration_ms = result.duration_ms, "Deployment plan completed");
                self.events.emit(
                    events::PLAN_COMPLETED,
                    Some(serde_json::json!({
                        "run_id": run_id.to_string(),
                        "duration_ms": result.duration_ms,
                    })),
                );
            }
        }

        Ok(result)
    }

    fn preflight(&self, plan: &DeploymentPlan) -> Result<(), ConfigError> {
        match plan.stacks().iter().find(|s| !self.providers.contains(s.region())) {
            Some(spec) => Err(ConfigError::MissingClient {
                region: spec.region().to_string(),
                stack: spec.name().to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Outcome, Outputs, Region, StackStatus};
    use crate::errors::DeployFailure;
    use crate::events::CollectingEventSink;
    use crate::lifecycle::JitterStrategy;
    use crate::plan::{StackSpec, TemplateHandle, TemplateSet};
    use crate::provider::{CloudProviderClient, MockCloudProviderClient, ProviderOp, SimulatedCloud};
    use crate::testing::{assert_aborted_at, assert_no_change, assert_succeeded, RecordingProvider};
    use pretty_assertions::assert_eq;

    fn exports(pairs: &[(&str, &str)]) -> Outputs {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn templates() -> TemplateSet {
        TemplateSet::new(
            TemplateHandle::new("acm-certificate-stack.yaml", "acm"),
            TemplateHandle::new("portfolio-website-stack.yaml", "site"),
            TemplateHandle::new("cicd-pipeline-stack.yaml", "cicd"),
        )
    }

    fn acm_cloud() -> Arc<SimulatedCloud> {
        Arc::new(
            SimulatedCloud::new()
                .with_settle_after(1)
                .with_exports("acm-certificate-stack", exports(&[("CertificateArn", "arn:cert/1")])),
        )
    }

    fn main_cloud() -> Arc<SimulatedCloud> {
        Arc::new(
            SimulatedCloud::new()
                .with_settle_after(2)
                .with_exports(
                    "portfolio-website-stack",
                    exports(&[("DistributionId", "E2ABC"), ("RootBucketName", "example-root")]),
                ),
        )
    }

    fn orchestrator(acm: Arc<dyn CloudProviderClient>, main: Arc<dyn CloudProviderClient>) -> DeploymentOrchestrator {
        let registry = ProviderRegistry::new()
            .with_client(Region::us_east_1(), acm)
            .with_client(Region::us_west_2(), main);
        DeploymentOrchestrator::with_settings(
            registry,
            PollConfig::new().with_interval_ms(1000).with_max_attempts(10),
            RetryConfig::new().with_base_delay_ms(50).with_jitter(JitterStrategy::None),
        )
    }

    fn chain(names: &[&str]) -> DeploymentPlan {
        let mut builder = DeploymentPlan::builder("chain");
        for name in names {
            builder
                .add_stack(
                    StackSpec::builder(*name, Region::us_west_2(), TemplateHandle::new("t.yaml", *name))
                        .unwrap()
                        .build(),
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_standard_chain() {
        let (acm, main) = (acm_cloud(), main_cloud());
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = orchestrator(acm.clone(), main.clone()).with_events(sink.clone());
        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();

        let result = orchestrator.run(&plan).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.exit_code(), 0);
        assert_eq!(result.completed.len(), 3);
        assert!(result.completed.iter().all(|r| r.outcome.is_success()));
        assert_eq!(
            result.outputs("portfolio-website-stack").unwrap()["DistributionId"],
            "E2ABC"
        );
        assert_eq!(acm.count(ProviderOp::Create, "acm-certificate-stack"), 1);
        assert_eq!(main.count(ProviderOp::Create, "cicd-pipeline-stack"), 1);
        assert_eq!(sink.events_of_type("plan.stack_started").len(), 3);
        assert_eq!(sink.event_types().last().map(String::as_str), Some("plan.completed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_outputs_become_parameters() {
        let acm = acm_cloud();
        let main = Arc::new(
            RecordingProvider::new()
                .with_describes(
                    "portfolio-website-stack",
                    vec![
                        Err(crate::errors::ProviderError::not_found("portfolio-website-stack")),
                        Ok(StackStatus::CreateComplete),
                    ],
                )
                .with_outputs(
                    "portfolio-website-stack",
                    exports(&[("DistributionId", "E2ABC"), ("RootBucketName", "example-root")]),
                )
                .with_describes(
                    "cicd-pipeline-stack",
                    vec![
                        Err(crate::errors::ProviderError::not_found("cicd-pipeline-stack")),
                        Ok(StackStatus::CreateComplete),
                    ],
                ),
        );
        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();

        let result = orchestrator(acm, main.clone()).run(&plan).await.unwrap();
        assert!(result.is_success());

        let requests = main.requests();
        let params: Vec<Vec<(String, String)>> = requests
            .iter()
            .map(|r| r.parameters.iter().map(|p| (p.key.clone(), p.value.clone())).collect())
            .collect();
        assert_eq!(
            params,
            vec![
                vec![
                    ("CertificateArn".to_string(), "arn:cert/1".to_string()),
                    ("DeploymentRegion".to_string(), "us-west-2".to_string()),
                ],
                vec![
                    ("DistributionId".to_string(), "E2ABC".to_string()),
                    ("RootBucketName".to_string(), "example-root".to_string()),
                ],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_is_no_change() {
        let (acm, main) = (acm_cloud(), main_cloud());
        let orchestrator = orchestrator(acm, main);
        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();

        let first = orchestrator.run(&plan).await.unwrap();
        let second = orchestrator.run(&plan).await.unwrap();

        assert!(second.is_success());
        assert_ne!(first.run_id, second.run_id);
        for (before, after) in first.completed.iter().zip(&second.completed) {
            assert_succeeded(&before.outcome);
            assert_eq!(assert_no_change(&after.outcome), before.outcome.outputs().unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_rollback_is_recovered() {
        let acm = acm_cloud();
        let main = Arc::new(
            SimulatedCloud::new()
                .with_exports(
                    "portfolio-website-stack",
                    exports(&[("DistributionId", "E2ABC"), ("RootBucketName", "example-root")]),
                )
                .with_stack("portfolio-website-stack", StackStatus::RollbackComplete),
        );
        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();

        let result = orchestrator(acm, main.clone()).run(&plan).await.unwrap();

        assert!(result.is_success());
        assert_eq!(main.count(ProviderOp::Delete, "portfolio-website-stack"), 1);
        assert_eq!(main.count(ProviderOp::Create, "portfolio-website-stack"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast() {
        let cloud = Arc::new(SimulatedCloud::new());
        cloud.fail_next_apply("a");
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = orchestrator(acm_cloud(), cloud.clone()).with_events(sink.clone());

        let result = orchestrator.run(&chain(&["a", "b", "c"])).await.unwrap();

        assert_aborted_at(&result, "a");
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.completed.len(), 1);
        assert!(matches!(
            result.aborted_at.as_ref().map(|a| &a.reason),
            Some(AbortReason::Failed(DeployFailure::TerminalStatus { .. }))
        ));
        assert!(cloud.calls().iter().all(|c| c.stack == "a"));
        assert_eq!(sink.event_types().last().map(String::as_str), Some("plan.aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_output_aborts_before_provider_call() {
        let acm = Arc::new(SimulatedCloud::new());
        let mut main = MockCloudProviderClient::new();
        main.expect_describe().never();
        main.expect_create().never();
        main.expect_update().never();
        main.expect_delete().never();

        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();
        let result = orchestrator(acm, Arc::new(main)).run(&plan).await.unwrap();

        assert_aborted_at(&result, "portfolio-website-stack");
        let abort = result.aborted_at.as_ref().unwrap();
        assert_eq!(abort.index, 1);
        assert_eq!(
            abort.reason,
            AbortReason::MissingOutput(crate::errors::MissingOutputError::new(
                "acm-certificate-stack",
                "CertificateArn"
            ))
        );
        assert_eq!(result.completed.len(), 1);
        assert!(matches!(result.completed[0].outcome, Outcome::Succeeded { .. }));
        assert!(result.report("cicd-pipeline-stack").is_none());
    }

    #[tokio::test]
    async fn test_preflight_requires_client_for_every_region() {
        let cloud = Arc::new(SimulatedCloud::new());
        let orchestrator = DeploymentOrchestrator::new(
            ProviderRegistry::new().with_client(Region::us_west_2(), cloud.clone()),
        );
        let plan = DeploymentPlan::standard_chain(&DeployConfig::default(), &templates()).unwrap();

        let err = orchestrator.run(&plan).await.unwrap_err();

        assert!(matches!(
            err,
            StackflowError::Config(ConfigError::MissingClient { ref region, .. }) if region == "us-east-1"
        ));
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_never_contacts_provider() {
        let cloud = Arc::new(SimulatedCloud::new());
        let orchestrator = orchestrator(acm_cloud(), cloud.clone());
        orchestrator.cancellation().cancel("operator interrupt");

        let result = orchestrator.run(&chain(&["a", "b"])).await.unwrap();

        assert_aborted_at(&result, "a");
        assert_eq!(
            result.aborted_at.unwrap().reason,
            AbortReason::Cancelled {
                reason: "operator interrupt".to_string()
            }
        );
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_stops_polling() {
        let cloud = Arc::new(SimulatedCloud::new().with_settle_after(100));
        let orchestrator = orchestrator(acm_cloud(), cloud.clone());
        let cancel = orchestrator.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
            cancel.cancel("interrupted");
        });

        let result = orchestrator.run(&chain(&["a", "b"])).await.unwrap();

        assert_aborted_at(&result, "a");
        assert!(matches!(
            result.aborted_at.unwrap().reason,
            AbortReason::Failed(DeployFailure::Cancelled { .. })
        ));
        assert_eq!(cloud.count(ProviderOp::Create, "b"), 0);
    }
}
