use std::collections::HashMap;
use std::sync::Arc;

use bidfan_adapters::ExtraRequestInfo;
use bidfan_common::account::AlternateBidderCodes;
use bidfan_common::errors::BidderError;
use bidfan_common::openrtb::{BidRequest, BidResponse, SeatBid};
use bidfan_hooks::enricher::enrich_response_ext;
use bidfan_hooks::stages::{
    AllProcessedBidResponsesPayload, AuctionResponsePayload, ProcessedAuctionPayload,
};
use bidfan_hooks::{HookExecutor, RejectError};
use serde_json::Value;
use tokio::time::Instant as TokioInstant;

use crate::adscert::Signer;
use crate::bidder::{BidRequestOptions, BidderAdapter, BidderRequest, NormalizedSeatBid};
use crate::currency::Conversions;

const DEFAULT_CURRENCY: &str = "USD";

/// Request-scoped collaborators shared by every bidder task.
pub struct AuctionDeps {
    pub hooks: Arc<HookExecutor>,
    pub conversions: Arc<dyn Conversions>,
    pub signer: Arc<dyn Signer>,
    pub options: BidRequestOptions,
    pub extra_info: ExtraRequestInfo,
    pub alternate_codes: AlternateBidderCodes,
    pub deadline: TokioInstant,
}

#[derive(Debug, Default)]
pub struct AuctionResult {
    pub response: BidResponse,
    /// Normalized seat bids per bidder, for callers that need more than the
    /// assembled response document.
    pub seat_bids: HashMap<String, Vec<NormalizedSeatBid>>,
    pub errors: HashMap<String, Vec<BidderError>>,
    pub reject: Option<RejectError>,
}

/// Fans one processed bid request out to every selected bidder, runs the
/// aggregate stages and assembles the final response document plus the
/// hook outcome extension. The engine always returns whatever seat bids it
/// has at the deadline; per-bidder failures never abort the auction.
pub async fn run_auction(
    bid_request: BidRequest,
    bidders: Vec<(BidderAdapter, BidderRequest)>,
    deps: AuctionDeps,
) -> AuctionResult {
    let mut result = AuctionResult::default();

    let payload = ProcessedAuctionPayload { bid_request };
    let (payload, reject) = deps.hooks.execute_processed_auction_stage(payload).await;
    let bid_request = payload.bid_request;
    if let Some(reject) = reject {
        result.reject = Some(reject);
        result.response = assemble_response(&bid_request, vec![], DEFAULT_CURRENCY.to_string());
        result.response.ext = enrich_response_ext(
            std::mem::take(&mut result.response.ext),
            &deps.hooks.outcomes(),
            &bid_request,
            deps.hooks.account(),
        );
        return result;
    }

    let mut handles = Vec::with_capacity(bidders.len());
    for (adapter, mut bidder_request) in bidders {
        bidder_request.bid_request = bid_request.clone();
        let hooks = deps.hooks.clone();
        let conversions = deps.conversions.clone();
        let signer = deps.signer.clone();
        let options = deps.options.clone();
        let extra_info = deps.extra_info.clone();
        let alternate_codes = deps.alternate_codes.clone();
        let deadline = deps.deadline;
        let bidder_name = bidder_request.bidder.clone();

        handles.push((
            bidder_name,
            tokio::spawn(async move {
                adapter
                    .request_bids(
                        bidder_request,
                        deadline,
                        conversions.as_ref(),
                        &extra_info,
                        signer.as_ref(),
                        &options,
                        &alternate_codes,
                        hooks.as_ref(),
                    )
                    .await
            }),
        ));
    }

    for (bidder, handle) in handles {
        match handle.await {
            Ok((seats, errs)) => {
                if !errs.is_empty() {
                    result.errors.insert(bidder.clone(), errs);
                }
                result.seat_bids.insert(bidder, seats);
            }
            Err(join_err) => {
                result
                    .errors
                    .entry(bidder)
                    .or_default()
                    .push(BidderError::Generic(format!("bidder task failed: {join_err}")));
            }
        }
    }

    let currency = adopted_currency(&result.seat_bids);

    let responses: HashMap<String, Vec<SeatBid>> = result
        .seat_bids
        .iter()
        .map(|(bidder, seats)| (bidder.clone(), project_seat_bids(seats)))
        .collect();
    let payload = AllProcessedBidResponsesPayload { responses };
    let (payload, aggregate_reject) =
        deps.hooks.execute_all_processed_bid_responses_stage(payload).await;

    let seatbid = if aggregate_reject.is_some() {
        result.reject = aggregate_reject;
        vec![]
    } else {
        let mut seatbid: Vec<SeatBid> = Vec::new();
        let mut bidder_names: Vec<&String> = payload.responses.keys().collect();
        bidder_names.sort();
        for bidder in bidder_names {
            if let Some(seats) = payload.responses.get(bidder) {
                seatbid.extend(seats.iter().cloned());
            }
        }
        seatbid
    };

    let response = assemble_response(&bid_request, seatbid, currency);
    let payload = AuctionResponsePayload { bid_response: response };
    let (payload, response_reject) = deps.hooks.execute_auction_response_stage(payload).await;
    if result.reject.is_none() {
        result.reject = response_reject;
    }
    result.response = payload.bid_response;

    attach_debug_calls(&mut result.response.ext, &result.seat_bids);
    result.response.ext = enrich_response_ext(
        std::mem::take(&mut result.response.ext),
        &deps.hooks.outcomes(),
        &bid_request,
        deps.hooks.account(),
    );

    result
}

fn assemble_response(bid_request: &BidRequest, seatbid: Vec<SeatBid>, cur: String) -> BidResponse {
    BidResponse { id: bid_request.id.clone(), seatbid, cur, ext: Value::Null }
}

/// The currency adopted by the first bidder that normalized any bids; the
/// runner aligns every seat of one bidder on a single request currency.
fn adopted_currency(seat_bids: &HashMap<String, Vec<NormalizedSeatBid>>) -> String {
    seat_bids
        .values()
        .flatten()
        .find(|seat| !seat.bids.is_empty())
        .map(|seat| seat.currency.clone())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

fn project_seat_bids(seats: &[NormalizedSeatBid]) -> Vec<SeatBid> {
    seats
        .iter()
        .filter(|seat| !seat.bids.is_empty())
        .map(|seat| SeatBid {
            seat: seat.seat.clone(),
            bid: seat.bids.iter().map(|b| b.bid.clone()).collect(),
        })
        .collect()
}

/// Surfaces per-bidder call records under `ext.debug.httpcalls.<bidder>`.
/// Emission gating already happened in the runner; bidders without records
/// contribute nothing.
fn attach_debug_calls(ext: &mut Value, seat_bids: &HashMap<String, Vec<NormalizedSeatBid>>) {
    let mut calls = serde_json::Map::new();
    for (bidder, seats) in seat_bids {
        let primary = seats
            .iter()
            .find(|seat| &seat.seat == bidder)
            .or_else(|| seats.first());
        if let Some(primary) = primary {
            if !primary.http_calls.is_empty() {
                if let Ok(value) = serde_json::to_value(&primary.http_calls) {
                    calls.insert(bidder.clone(), value);
                }
            }
        }
    }
    if calls.is_empty() {
        return;
    }

    if !ext.is_object() {
        *ext = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = ext.as_object_mut() {
        let debug = map
            .entry("debug".to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(debug_map) = debug.as_object_mut() {
            debug_map.insert("httpcalls".to_string(), Value::Object(calls));
        }
    }
}
