use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bidfan_common::account::Account;
use bidfan_common::metrics::MetricsSink;
use tokio::time::Instant as TokioInstant;

use crate::changeset::{HookError, HookResult};
use crate::invocation::{ModuleContexts, ModuleInvocationContext};
use crate::outcome::{
    GroupOutcome, HookAction, HookId, HookOutcome, HookStatus, RejectError, StageOutcome,
    ENTITY_ALL_PROCESSED_BID_RESPONSES, ENTITY_AUCTION_REQUEST, ENTITY_AUCTION_RESPONSE,
    ENTITY_HTTP_REQUEST,
};
use crate::plan::{ExecutionPlanBuilder, Plan};
use crate::stage::Stage;
use crate::stages::{
    AllProcessedBidResponsesHook, AllProcessedBidResponsesPayload, AuctionResponseHook,
    AuctionResponsePayload, BidderRequestHook, BidderRequestPayload, EntrypointHook,
    EntrypointPayload, ProcessedAuctionHook, ProcessedAuctionPayload, ProcessedBidResponseHook,
    ProcessedBidResponsePayload, RawAuctionHook, RawAuctionPayload, RawBidderResponseHook,
    RawBidderResponsePayload,
};

const TIMEOUT_MESSAGE: &str = "Hook execution timeout";

/// Runs the configured hook plan for every stage of one request.
///
/// Stages run sequentially; groups within a stage run sequentially; hooks
/// within a group run as parallel tasks against an immutable payload
/// snapshot. Accepted change sets are applied by the executor alone, in
/// hook-declaration order, between groups.
///
/// Bidder-scoped stages are entered from several tasks at once, so the
/// outcome list sits behind a mutex and module contexts in a concurrent map.
pub struct HookExecutor {
    endpoint: String,
    account: Option<Account>,
    account_id: String,
    plan_builder: Arc<dyn ExecutionPlanBuilder>,
    stage_outcomes: Mutex<Vec<StageOutcome>>,
    module_contexts: Arc<ModuleContexts>,
    metrics: Arc<dyn MetricsSink>,
    deadline: Option<TokioInstant>,
}

impl HookExecutor {
    pub fn new(
        plan_builder: Arc<dyn ExecutionPlanBuilder>,
        endpoint: &str,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        HookExecutor {
            endpoint: endpoint.to_string(),
            account: None,
            account_id: String::new(),
            plan_builder,
            stage_outcomes: Mutex::new(Vec::new()),
            module_contexts: Arc::new(ModuleContexts::default()),
            metrics,
            deadline: None,
        }
    }

    pub fn set_account(&mut self, account: Account) {
        self.account_id = account.id.clone();
        self.account = Some(account);
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Request-scoped wall-clock deadline; group budgets never exceed it.
    pub fn set_deadline(&mut self, deadline: TokioInstant) {
        self.deadline = Some(deadline);
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn module_contexts(&self) -> &ModuleContexts {
        &self.module_contexts
    }

    /// Snapshot of every stage outcome recorded so far, in execution order.
    pub fn outcomes(&self) -> Vec<StageOutcome> {
        self.stage_outcomes
            .lock()
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }

    pub async fn execute_entrypoint_stage(
        &self,
        payload: EntrypointPayload,
    ) -> (EntrypointPayload, Option<RejectError>) {
        let plan = self.plan_builder.plan_for_entrypoint_stage(&self.endpoint);
        if plan.is_empty() {
            return (payload, None);
        }
        self.execute_stage(
            Stage::Entrypoint,
            ENTITY_HTTP_REQUEST,
            plan,
            payload,
            |hook: Arc<dyn EntrypointHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_raw_auction_stage(
        &self,
        body: RawAuctionPayload,
    ) -> (RawAuctionPayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_raw_auction_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (body, None);
        }
        self.execute_stage(
            Stage::RawAuction,
            ENTITY_AUCTION_REQUEST,
            plan,
            body,
            |hook: Arc<dyn RawAuctionHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_processed_auction_stage(
        &self,
        payload: ProcessedAuctionPayload,
    ) -> (ProcessedAuctionPayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_processed_auction_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        self.execute_stage(
            Stage::ProcessedAuction,
            ENTITY_AUCTION_REQUEST,
            plan,
            payload,
            |hook: Arc<dyn ProcessedAuctionHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_bidder_request_stage(
        &self,
        payload: BidderRequestPayload,
    ) -> (BidderRequestPayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_bidder_request_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        let entity = payload.bidder.clone();
        self.execute_stage(
            Stage::BidderRequest,
            &entity,
            plan,
            payload,
            |hook: Arc<dyn BidderRequestHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_raw_bidder_response_stage(
        &self,
        payload: RawBidderResponsePayload,
    ) -> (RawBidderResponsePayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_raw_bidder_response_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        let entity = payload.bidder.clone();
        self.execute_stage(
            Stage::RawBidderResponse,
            &entity,
            plan,
            payload,
            |hook: Arc<dyn RawBidderResponseHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_processed_bid_response_stage(
        &self,
        payload: ProcessedBidResponsePayload,
    ) -> (ProcessedBidResponsePayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_processed_bid_response_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        let entity = payload.bidder.clone();
        self.execute_stage(
            Stage::ProcessedBidResponse,
            &entity,
            plan,
            payload,
            |hook: Arc<dyn ProcessedBidResponseHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_all_processed_bid_responses_stage(
        &self,
        payload: AllProcessedBidResponsesPayload,
    ) -> (AllProcessedBidResponsesPayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_all_processed_bid_responses_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        self.execute_stage(
            Stage::AllProcessedBidResponses,
            ENTITY_ALL_PROCESSED_BID_RESPONSES,
            plan,
            payload,
            |hook: Arc<dyn AllProcessedBidResponsesHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    pub async fn execute_auction_response_stage(
        &self,
        payload: AuctionResponsePayload,
    ) -> (AuctionResponsePayload, Option<RejectError>) {
        let plan = self
            .plan_builder
            .plan_for_auction_response_stage(&self.endpoint, self.account.as_ref());
        if plan.is_empty() {
            return (payload, None);
        }
        self.execute_stage(
            Stage::AuctionResponse,
            ENTITY_AUCTION_RESPONSE,
            plan,
            payload,
            |hook: Arc<dyn AuctionResponseHook>, ctx, payload| async move {
                hook.call(ctx, payload).await
            },
        )
        .await
    }

    async fn execute_stage<H, P, F, Fut>(
        &self,
        stage: Stage,
        entity: &str,
        plan: Plan<H>,
        mut payload: P,
        handler: F,
    ) -> (P, Option<RejectError>)
    where
        H: ?Sized + Send + Sync + 'static,
        P: Clone + Send + 'static,
        F: Fn(Arc<H>, ModuleInvocationContext, P) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<HookResult<P>, HookError>> + Send + 'static,
    {
        let stage_start = Instant::now();
        let mut groups = Vec::with_capacity(plan.groups.len());
        let mut reject: Option<RejectError> = None;

        for group in plan.groups {
            let group_start = Instant::now();
            let deadline = self.group_deadline(group.timeout);

            let mut handles = Vec::with_capacity(group.hooks.len());
            for hw in &group.hooks {
                let hook = hw.hook.clone();
                let handler = handler.clone();
                let payload_in = payload.clone();
                let ctx = ModuleInvocationContext {
                    endpoint: self.endpoint.clone(),
                    account_id: self.account_id.clone(),
                    module_context: self.module_contexts.get(&hw.module),
                };
                let task = tokio::spawn(async move {
                    let started = Instant::now();
                    let result =
                        tokio::time::timeout_at(deadline, handler(hook, ctx, payload_in)).await;
                    (result, started.elapsed())
                });
                handles.push((HookId::new(hw.module.clone(), hw.code.clone()), task));
            }

            // Join in hook-declaration order; completion order is irrelevant
            // because mutations only apply below.
            let mut group_outcome = GroupOutcome::default();
            for (hook_id, task) in handles {
                let (mut outcome, result) = match task.await {
                    Ok((Ok(Ok(result)), elapsed)) => {
                        let mut outcome = HookOutcome::new(hook_id, HookStatus::Success);
                        outcome.execution_time_millis = elapsed.as_millis() as u64;
                        outcome.message = result.message.clone();
                        outcome.errors = result.errors.clone();
                        outcome.warnings = result.warnings.clone();
                        outcome.debug_messages = result.debug_messages.clone();
                        outcome.analytics_tags = result.analytics_tags.clone();
                        (outcome, Some(result))
                    }
                    Ok((Ok(Err(err)), elapsed)) => {
                        let status = match err {
                            HookError::Failure(_) => HookStatus::ExecutionFailure,
                            HookError::Execution(_) => HookStatus::ExecutionError,
                        };
                        let mut outcome = HookOutcome::new(hook_id, status);
                        outcome.execution_time_millis = elapsed.as_millis() as u64;
                        outcome.errors.push(err.to_string());
                        (outcome, None)
                    }
                    Ok((Err(_), elapsed)) => {
                        let mut outcome = HookOutcome::new(hook_id, HookStatus::Timeout);
                        outcome.execution_time_millis = elapsed.as_millis() as u64;
                        outcome.errors.push(TIMEOUT_MESSAGE.to_string());
                        (outcome, None)
                    }
                    Err(join_err) => {
                        let mut outcome = HookOutcome::new(hook_id, HookStatus::ExecutionError);
                        outcome.errors.push(format!("hook task failed: {join_err}"));
                        (outcome, None)
                    }
                };

                if let Some(result) = result {
                    if result.reject {
                        outcome.action = HookAction::Reject;
                        let reject_err = RejectError::new(stage.name(), result.message.clone());
                        outcome.errors.push(reject_err.to_string());
                        if reject.is_none() {
                            reject = Some(reject_err);
                        }
                    } else if !result.change_set.is_empty() {
                        outcome.action = HookAction::Update;
                        for mutation in result.change_set.mutations() {
                            match mutation.apply(payload.clone()) {
                                Ok(updated) => {
                                    payload = updated;
                                    outcome.debug_messages.push(format!(
                                        "Hook mutation successfully applied, affected key: {}, mutation type: {}",
                                        mutation.key(),
                                        mutation.kind(),
                                    ));
                                }
                                Err(err) => {
                                    outcome
                                        .warnings
                                        .push(format!("failed to apply hook mutation: {err}"));
                                }
                            }
                        }
                    }

                    if let Some(module_ctx) = result.module_context {
                        self.module_contexts.put(&outcome.hook_id.module_code, module_ctx);
                    }
                }

                self.metrics.record_hook_execution(
                    &outcome.hook_id.module_code,
                    stage.name(),
                    outcome.status.as_str(),
                    Duration::from_millis(outcome.execution_time_millis),
                );
                group_outcome.invocation_results.push(outcome);
            }

            group_outcome.execution_time_millis = group_start.elapsed().as_millis() as u64;
            groups.push(group_outcome);

            // A reject fixes the stage result; remaining groups are skipped.
            if reject.is_some() {
                break;
            }
        }

        self.push_stage_outcome(StageOutcome {
            stage: stage.name().to_string(),
            entity: entity.to_string(),
            execution_time_millis: stage_start.elapsed().as_millis() as u64,
            groups,
        });

        (payload, reject)
    }

    fn group_deadline(&self, timeout: Duration) -> TokioInstant {
        let group = TokioInstant::now() + timeout;
        match self.deadline {
            Some(request) if request < group => request,
            _ => group,
        }
    }

    fn push_stage_outcome(&self, outcome: StageOutcome) {
        if let Ok(mut outcomes) = self.stage_outcomes.lock() {
            outcomes.push(outcome);
        }
    }
}
