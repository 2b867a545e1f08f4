mod args;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use bidfan_adapters::GenericOrtbBidder;
use bidfan_common::account::{Account, AlternateBidderCodes};
use bidfan_common::config::ExecutionPlanConfig;
use bidfan_common::metrics::InMemoryMetrics;
use bidfan_common::openrtb::BidRequest;
use bidfan_exchange::client_trace::build_http_client;
use bidfan_exchange::{
    run_auction, AuctionDeps, BidRequestOptions, BidderAdapter, BidderAdapterConfig,
    BidderRequest, NilSigner, StaticRates,
};
use bidfan_hooks::stages::{EntrypointPayload, RequestParts};
use bidfan_hooks::{HookExecutor, ModuleBuilder, PlanBuilder};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    bidfan_common::telemetry::init_tracing("bidfan-cli");

    let request_body =
        std::fs::read(&args.request).with_context(|| format!("reading {}", args.request))?;

    let host_plan = match &args.host_plan {
        Some(path) => read_json(path).context("reading host plan")?,
        None => ExecutionPlanConfig::default(),
    };
    let default_account_plan = match &args.default_account_plan {
        Some(path) => read_json(path).context("reading default-account plan")?,
        None => ExecutionPlanConfig::default(),
    };
    let account: Option<Account> = match &args.account {
        Some(path) => Some(read_json(path).context("reading account")?),
        None => None,
    };

    let metrics = Arc::new(InMemoryMetrics::default());
    let client = build_http_client(metrics.clone(), Duration::from_secs(3))
        .context("building http client")?;

    // No modules are bundled; host deployments register builders here.
    let modules = ModuleBuilder::new();
    let repo = modules
        .build(&HashMap::new(), client.clone())
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("building modules")?;
    let plan_builder = Arc::new(PlanBuilder::new(repo, host_plan, default_account_plan));

    let mut hooks = HookExecutor::new(plan_builder, &args.endpoint, metrics.clone());
    let deadline = tokio::time::Instant::now() + Duration::from_millis(args.timeout_ms);
    hooks.set_deadline(deadline);
    let alternate_codes = account
        .as_ref()
        .map(|a| a.alternate_bidder_codes.clone())
        .unwrap_or_else(AlternateBidderCodes::default);
    let bid_adjustments = account
        .as_ref()
        .map(|a| a.bid_adjustments.clone())
        .unwrap_or_default();
    let account_debug_allowed = account.as_ref().is_some_and(|a| a.debug_allow);
    if let Some(account) = account {
        hooks.set_account(account);
    }

    let entry_payload = EntrypointPayload {
        request: RequestParts::new(
            http::Method::POST,
            args.endpoint.parse().unwrap_or_default(),
            http::HeaderMap::new(),
        ),
        body: request_body,
    };
    let (entry_payload, reject) = hooks.execute_entrypoint_stage(entry_payload).await;
    if let Some(reject) = reject {
        bail!("request rejected at {} stage: {}", reject.stage, reject.reason);
    }
    let (raw_body, reject) = hooks.execute_raw_auction_stage(entry_payload.body).await;
    if let Some(reject) = reject {
        bail!("request rejected at {} stage: {}", reject.stage, reject.reason);
    }
    let bid_request: BidRequest =
        serde_json::from_slice(&raw_body).context("parsing bid request")?;

    let mut bidders = Vec::with_capacity(args.bidders.len());
    for spec in &args.bidders {
        let Some((name, endpoint)) = spec.split_once('=') else {
            bail!("invalid --bidder value {spec:?}, expected name=url");
        };
        let adapter = BidderAdapter::new(
            Arc::new(GenericOrtbBidder::new(endpoint)),
            name,
            client.clone(),
            metrics.clone(),
            BidderAdapterConfig::default(),
        );
        let request = BidderRequest { bidder: name.to_string(), ..Default::default() };
        bidders.push((adapter, request));
    }
    if bidders.is_empty() {
        bail!("at least one --bidder name=url is required");
    }

    let deps = AuctionDeps {
        hooks: Arc::new(hooks),
        conversions: Arc::new(StaticRates::new()),
        signer: Arc::new(NilSigner),
        options: BidRequestOptions {
            account_debug_allowed,
            header_debug_allowed: args.debug,
            bid_adjustments,
            ..Default::default()
        },
        extra_info: Default::default(),
        alternate_codes,
        deadline,
    };

    let result = run_auction(bid_request, bidders, deps).await;

    if let Some(reject) = &result.reject {
        tracing::warn!(stage = %reject.stage, reason = %reject.reason, "stage rejected");
    }
    for (bidder, errors) in &result.errors {
        for error in errors {
            tracing::warn!(bidder = %bidder, error = %error, "bidder error");
        }
    }

    println!("{}", serde_json::to_string_pretty(&result.response)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {path}"))
}
