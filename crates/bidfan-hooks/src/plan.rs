use std::sync::Arc;
use std::time::Duration;

use bidfan_common::account::Account;
use bidfan_common::config::ExecutionPlanConfig;

use crate::repository::HookRepository;
use crate::stage::Stage;
use crate::stages::{
    AllProcessedBidResponsesHook, AuctionResponseHook, BidderRequestHook, EntrypointHook,
    ProcessedAuctionHook, ProcessedBidResponseHook, RawAuctionHook, RawBidderResponseHook,
};

/// A hook implementation bound to its place in the plan.
pub struct HookWrapper<H: ?Sized> {
    pub module: String,
    pub code: String,
    pub hook: Arc<H>,
}

impl<H: ?Sized> Clone for HookWrapper<H> {
    fn clone(&self) -> Self {
        HookWrapper {
            module: self.module.clone(),
            code: self.code.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for HookWrapper<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookWrapper")
            .field("module", &self.module)
            .field("code", &self.code)
            .finish()
    }
}

/// Hooks sharing one wall-clock budget, run in parallel.
#[derive(Debug)]
pub struct Group<H: ?Sized> {
    pub timeout: Duration,
    pub hooks: Vec<HookWrapper<H>>,
}

impl<H: ?Sized> Clone for Group<H> {
    fn clone(&self) -> Self {
        Group { timeout: self.timeout, hooks: self.hooks.clone() }
    }
}

/// Ordered groups for one stage on one endpoint for one account.
#[derive(Debug)]
pub struct Plan<H: ?Sized> {
    pub groups: Vec<Group<H>>,
}

impl<H: ?Sized> Clone for Plan<H> {
    fn clone(&self) -> Self {
        Plan { groups: self.groups.clone() }
    }
}

impl<H: ?Sized> Default for Plan<H> {
    fn default() -> Self {
        Plan { groups: Vec::new() }
    }
}

impl<H: ?Sized> Plan<H> {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Resolves the plan to execute for each stage of an endpoint.
pub trait ExecutionPlanBuilder: Send + Sync {
    fn plan_for_entrypoint_stage(&self, endpoint: &str) -> Plan<dyn EntrypointHook>;
    fn plan_for_raw_auction_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn RawAuctionHook>;
    fn plan_for_processed_auction_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn ProcessedAuctionHook>;
    fn plan_for_bidder_request_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn BidderRequestHook>;
    fn plan_for_raw_bidder_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn RawBidderResponseHook>;
    fn plan_for_processed_bid_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn ProcessedBidResponseHook>;
    fn plan_for_all_processed_bid_responses_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn AllProcessedBidResponsesHook>;
    fn plan_for_auction_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn AuctionResponseHook>;
}

/// Builder producing empty plans for every stage; hook execution disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPlanBuilder;

impl ExecutionPlanBuilder for EmptyPlanBuilder {
    fn plan_for_entrypoint_stage(&self, _endpoint: &str) -> Plan<dyn EntrypointHook> {
        Plan::default()
    }

    fn plan_for_raw_auction_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn RawAuctionHook> {
        Plan::default()
    }

    fn plan_for_processed_auction_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn ProcessedAuctionHook> {
        Plan::default()
    }

    fn plan_for_bidder_request_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn BidderRequestHook> {
        Plan::default()
    }

    fn plan_for_raw_bidder_response_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn RawBidderResponseHook> {
        Plan::default()
    }

    fn plan_for_processed_bid_response_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn ProcessedBidResponseHook> {
        Plan::default()
    }

    fn plan_for_all_processed_bid_responses_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn AllProcessedBidResponsesHook> {
        Plan::default()
    }

    fn plan_for_auction_response_stage(
        &self,
        _endpoint: &str,
        _account: Option<&Account>,
    ) -> Plan<dyn AuctionResponseHook> {
        Plan::default()
    }
}

/// Builds per-stage plans by layering host-scope, default-account-scope and
/// account-scope configuration:
///
/// - host-scope groups always come first;
/// - when the account defines groups for the stage/endpoint they follow the
///   host groups and the default-account plan is ignored entirely;
/// - otherwise default-account groups follow.
///
/// Unknown `(module, hook code)` references are dropped silently; a group
/// whose references all drop is omitted.
pub struct PlanBuilder {
    repo: HookRepository,
    host_plan: ExecutionPlanConfig,
    default_account_plan: ExecutionPlanConfig,
}

impl PlanBuilder {
    pub fn new(
        repo: HookRepository,
        host_plan: ExecutionPlanConfig,
        default_account_plan: ExecutionPlanConfig,
    ) -> Self {
        PlanBuilder { repo, host_plan, default_account_plan }
    }

    fn build<H: ?Sized>(
        &self,
        endpoint: &str,
        stage: Stage,
        account: Option<&Account>,
        lookup: impl Fn(&HookRepository, &str, &str) -> Option<Arc<H>>,
    ) -> Plan<H> {
        let mut plan = self.resolve_groups(&self.host_plan, endpoint, stage, &lookup);

        let account_groups = account
            .and_then(|a| a.hooks.as_ref())
            .map(|cfg| cfg.groups(endpoint, stage.name()))
            .unwrap_or(&[]);

        if !account_groups.is_empty() {
            let account_plan = account
                .and_then(|a| a.hooks.as_ref())
                .map(|cfg| self.resolve_groups(cfg, endpoint, stage, &lookup))
                .unwrap_or_default();
            plan.groups.extend(account_plan.groups);
        } else {
            let default_plan =
                self.resolve_groups(&self.default_account_plan, endpoint, stage, &lookup);
            plan.groups.extend(default_plan.groups);
        }

        plan
    }

    fn resolve_groups<H: ?Sized>(
        &self,
        cfg: &ExecutionPlanConfig,
        endpoint: &str,
        stage: Stage,
        lookup: &impl Fn(&HookRepository, &str, &str) -> Option<Arc<H>>,
    ) -> Plan<H> {
        let mut plan = Plan::default();
        for group_cfg in cfg.groups(endpoint, stage.name()) {
            let mut hooks = Vec::with_capacity(group_cfg.hook_sequence.len());
            for hook_ref in &group_cfg.hook_sequence {
                match lookup(&self.repo, &hook_ref.module_code, &hook_ref.hook_impl_code) {
                    Some(hook) => hooks.push(HookWrapper {
                        module: hook_ref.module_code.clone(),
                        code: hook_ref.hook_impl_code.clone(),
                        hook,
                    }),
                    None => {
                        tracing::debug!(
                            module = %hook_ref.module_code,
                            code = %hook_ref.hook_impl_code,
                            stage = %stage,
                            "dropping unknown hook reference from execution plan"
                        );
                    }
                }
            }
            if !hooks.is_empty() {
                plan.groups.push(Group {
                    timeout: Duration::from_millis(group_cfg.timeout),
                    hooks,
                });
            }
        }
        plan
    }
}

impl ExecutionPlanBuilder for PlanBuilder {
    fn plan_for_entrypoint_stage(&self, endpoint: &str) -> Plan<dyn EntrypointHook> {
        self.build(endpoint, Stage::Entrypoint, None, |r, m, c| r.entrypoint_hook(m, c))
    }

    fn plan_for_raw_auction_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn RawAuctionHook> {
        self.build(endpoint, Stage::RawAuction, account, |r, m, c| r.raw_auction_hook(m, c))
    }

    fn plan_for_processed_auction_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn ProcessedAuctionHook> {
        self.build(endpoint, Stage::ProcessedAuction, account, |r, m, c| {
            r.processed_auction_hook(m, c)
        })
    }

    fn plan_for_bidder_request_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn BidderRequestHook> {
        self.build(endpoint, Stage::BidderRequest, account, |r, m, c| {
            r.bidder_request_hook(m, c)
        })
    }

    fn plan_for_raw_bidder_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn RawBidderResponseHook> {
        self.build(endpoint, Stage::RawBidderResponse, account, |r, m, c| {
            r.raw_bidder_response_hook(m, c)
        })
    }

    fn plan_for_processed_bid_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn ProcessedBidResponseHook> {
        self.build(endpoint, Stage::ProcessedBidResponse, account, |r, m, c| {
            r.processed_bid_response_hook(m, c)
        })
    }

    fn plan_for_all_processed_bid_responses_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn AllProcessedBidResponsesHook> {
        self.build(endpoint, Stage::AllProcessedBidResponses, account, |r, m, c| {
            r.all_processed_bid_responses_hook(m, c)
        })
    }

    fn plan_for_auction_response_stage(
        &self,
        endpoint: &str,
        account: Option<&Account>,
    ) -> Plan<dyn AuctionResponseHook> {
        self.build(endpoint, Stage::AuctionResponse, account, |r, m, c| {
            r.auction_response_hook(m, c)
        })
    }
}
