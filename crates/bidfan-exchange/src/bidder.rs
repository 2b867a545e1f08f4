use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bidfan_adapters::{
    BidMeta, BidType, BidVideo, Bidder, ExtraRequestInfo, RequestData, ResponseData,
};
use bidfan_common::account::AlternateBidderCodes;
use bidfan_common::errors::{BidderError, WarningCode};
use bidfan_common::metrics::MetricsSink;
use bidfan_common::openrtb::{Bid, BidRequest};
use bidfan_common::version;
use bidfan_hooks::stages::{
    BidderRequestPayload, ProcessedBidResponsePayload, RawBidderResponsePayload,
};
use bidfan_hooks::HookExecutor;
use bytes::Bytes;
use flate2::write::GzEncoder;
use http::{HeaderMap, HeaderValue, Method};
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

use crate::adscert::{Signer, SIGN_HEADER};
use crate::currency::Conversions;
use crate::debug::{make_debug_ext, HttpCallDebug};
use crate::native;

/// Wire sentinel carried as the synthesized request body of a stored-response
/// call, kept byte-identical for debug trace consumers.
pub const STORED_RESPONSE_BODY_PREFIX: &str = "Stored bid response for impression id: ";

const DEFAULT_CURRENCY: &str = "USD";
const TIMEOUT_NOTIFICATION_BUDGET: Duration = Duration::from_millis(200);

/// Everything one bidder needs for one auction.
#[derive(Debug, Clone, Default)]
pub struct BidderRequest {
    pub bidder: String,
    pub bid_request: BidRequest,
    /// Pre-recorded responses substituted for live calls, keyed by imp id.
    pub stored_responses: HashMap<String, Bytes>,
    /// Whether a stored bid's imp id is rewritten to the originating imp.
    pub imp_replace_id: HashMap<String, bool>,
}

/// Per-request execution options resolved by the caller.
#[derive(Debug, Clone, Default)]
pub struct BidRequestOptions {
    pub account_debug_allowed: bool,
    /// Debug override header was present and valid; trumps all other gates.
    pub header_debug_allowed: bool,
    pub add_call_sign_header: bool,
    /// Price adjustment factors keyed by seat / bidder name.
    pub bid_adjustments: HashMap<String, f64>,
    pub generate_bid_id: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, Default)]
pub struct TimeoutNotificationConfig {
    pub log: bool,
    pub sampling_rate: f32,
    pub fail_only: bool,
}

#[derive(Debug, Clone)]
pub struct BidderAdapterConfig {
    /// Whether this bidder permits its calls in debug output.
    pub debug_info_allowed: bool,
    pub endpoint_compression: Compression,
    pub timeout_notification: TimeoutNotificationConfig,
}

impl Default for BidderAdapterConfig {
    fn default() -> Self {
        BidderAdapterConfig {
            debug_info_allowed: true,
            endpoint_compression: Compression::None,
            timeout_notification: TimeoutNotificationConfig::default(),
        }
    }
}

/// Snapshot of one outbound call: the request as dispatched, and either the
/// response or the error that ended it.
#[derive(Debug, Clone)]
pub struct HttpCallInfo {
    pub request: RequestData,
    pub response: Option<ResponseData>,
    pub error: Option<BidderError>,
}

/// A live call or a stored-response substitution. The imp id of a stored
/// call rides the variant; the wire sentinel stays on the debug record only.
enum CallOutcome {
    Live(HttpCallInfo),
    Stored { imp_id: String, call: HttpCallInfo },
}

impl CallOutcome {
    fn call(&self) -> &HttpCallInfo {
        match self {
            CallOutcome::Live(call) => call,
            CallOutcome::Stored { call, .. } => call,
        }
    }

    fn stored_imp_id(&self) -> Option<&str> {
        match self {
            CallOutcome::Live(_) => None,
            CallOutcome::Stored { imp_id, .. } => Some(imp_id),
        }
    }
}

/// One accepted bid after currency and adjustment math.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBid {
    pub bid: Bid,
    pub bid_type: BidType,
    pub bid_meta: BidMeta,
    pub bid_video: Option<BidVideo>,
    pub deal_priority: i32,
    /// Price as the bidder quoted it, before adjustment and conversion.
    pub original_bid_cpm: f64,
    pub original_bid_cur: String,
    pub generated_bid_id: Option<String>,
}

/// All bids recorded under one seat, plus that seat's debug call records.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSeatBid {
    pub seat: String,
    pub currency: String,
    pub bids: Vec<NormalizedBid>,
    pub http_calls: Vec<HttpCallDebug>,
}

/// Drives one bidder through an auction: bidder-request stage, adapter
/// encoding, parallel dispatch under the request deadline, stored-response
/// substitution, response stages, currency normalization and seat assembly.
#[derive(Clone)]
pub struct BidderAdapter {
    bidder: Arc<dyn Bidder>,
    bidder_name: String,
    client: reqwest::Client,
    metrics: Arc<dyn MetricsSink>,
    config: BidderAdapterConfig,
}

impl BidderAdapter {
    pub fn new(
        bidder: Arc<dyn Bidder>,
        bidder_name: &str,
        client: reqwest::Client,
        metrics: Arc<dyn MetricsSink>,
        config: BidderAdapterConfig,
    ) -> Self {
        BidderAdapter { bidder, bidder_name: bidder_name.to_string(), client, metrics, config }
    }

    pub fn bidder_name(&self) -> &str {
        &self.bidder_name
    }

    /// Fetches and normalizes bids for one bidder. Errors describe bids (or
    /// no-bids) that were less than ideal; the caller always receives
    /// whatever seat bids survived.
    #[allow(clippy::too_many_arguments)]
    pub async fn request_bids(
        &self,
        bidder_request: BidderRequest,
        deadline: TokioInstant,
        conversions: &dyn Conversions,
        req_info: &ExtraRequestInfo,
        signer: &dyn Signer,
        options: &BidRequestOptions,
        alternate_codes: &AlternateBidderCodes,
        hooks: &HookExecutor,
    ) -> (Vec<NormalizedSeatBid>, Vec<BidderError>) {
        let mut bidder_request = bidder_request;

        let payload = BidderRequestPayload {
            bid_request: bidder_request.bid_request.clone(),
            bidder: bidder_request.bidder.clone(),
        };
        let (payload, reject) = hooks.execute_bidder_request_stage(payload).await;
        if let Some(reject) = reject {
            return (vec![], vec![BidderError::Generic(reject.to_string())]);
        }
        bidder_request.bid_request = payload.bid_request;

        let mut errs: Vec<BidderError> = Vec::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<CallOutcome>();
        let mut expected = 0usize;

        if !bidder_request.bid_request.imp.is_empty() {
            let (mut req_data, adapter_errs) =
                self.bidder.make_requests(&bidder_request.bid_request, req_info);
            errs.extend(adapter_errs);

            if req_data.is_empty() {
                // An adapter producing neither requests nor errors is itself
                // an error.
                if errs.is_empty() {
                    errs.push(BidderError::FailedToRequestBids);
                }
                return (vec![], errs);
            }

            let x_prebid =
                version::x_prebid_header(&bidder_request.bid_request, version::VERSION);
            for data in &mut req_data {
                self.stamp_headers(data, &x_prebid, req_info, options, signer, &mut errs);
            }

            expected += req_data.len();
            let mut req_iter = req_data.into_iter();
            if expected == 1 {
                // A single call runs inline, saving a task.
                if let Some(data) = req_iter.next() {
                    let _ = tx.send(CallOutcome::Live(self.do_request(deadline, data).await));
                }
            } else {
                for data in req_iter {
                    let adapter = self.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let _ =
                            tx.send(CallOutcome::Live(adapter.do_request(deadline, data).await));
                    });
                }
            }
        }

        for (imp_id, stored) in &bidder_request.stored_responses {
            expected += 1;
            let _ = tx.send(prepare_stored_response(imp_id, stored.clone()));
        }
        drop(tx);

        let mut cur_list = bidder_request.bid_request.cur.clone();
        if cur_list.is_empty() {
            cur_list.push(DEFAULT_CURRENCY.to_string());
        }

        let mut seat_bids: HashMap<String, NormalizedSeatBid> = HashMap::new();
        seat_bids.insert(
            bidder_request.bidder.clone(),
            NormalizedSeatBid {
                seat: bidder_request.bidder.clone(),
                currency: DEFAULT_CURRENCY.to_string(),
                bids: Vec::with_capacity(expected),
                http_calls: Vec::with_capacity(expected),
            },
        );

        // Drain everything dispatched; a timeout halfway through still lets
        // the faster calls enter their bids.
        for _ in 0..expected {
            let outcome = match rx.recv().await {
                Some(outcome) => outcome,
                None => break,
            };

            let attach_debug = options.header_debug_allowed
                || (options.account_debug_allowed && self.config.debug_info_allowed);
            if attach_debug {
                if let Some(primary) = seat_bids.get_mut(&bidder_request.bidder) {
                    primary.http_calls.push(make_debug_ext(outcome.call()));
                }
            } else if options.account_debug_allowed {
                errs.push(BidderError::warning(
                    WarningCode::BidderLevelDebugDisabled,
                    "debug turned off for bidder",
                ));
            }

            let call = outcome.call();
            if let Some(error) = &call.error {
                errs.push(error.clone());
                continue;
            }
            let response = match &call.response {
                Some(response) => response,
                None => continue,
            };

            let (parsed, more_errs) =
                self.bidder.make_bids(&bidder_request.bid_request, &call.request, response);
            errs.extend(more_errs);
            let mut parsed = match parsed {
                Some(parsed) => parsed,
                None => continue,
            };
            if parsed.currency.is_empty() {
                parsed.currency = DEFAULT_CURRENCY.to_string();
            }
            let response_currency = parsed.currency.clone();

            let raw_payload = RawBidderResponsePayload {
                bids: std::mem::take(&mut parsed.bids),
                bidder: bidder_request.bidder.clone(),
            };
            let (raw_payload, reject) =
                hooks.execute_raw_bidder_response_stage(raw_payload).await;
            if let Some(reject) = reject {
                errs.push(BidderError::Generic(reject.to_string()));
                continue;
            }
            parsed.bids = raw_payload.bids;

            // First request currency with a known rate wins.
            let mut conversion: Option<(f64, String)> = None;
            let mut conversion_err = None;
            for req_cur in &cur_list {
                match conversions.get_rate(&response_currency, req_cur) {
                    Ok(rate) => {
                        conversion = Some((rate, req_cur.clone()));
                        break;
                    }
                    Err(err) => conversion_err = Some(err),
                }
            }

            if bidder_request.bid_request.app.is_some() {
                for typed in &mut parsed.bids {
                    if typed.bid_type != BidType::Native {
                        continue;
                    }
                    let (markup, native_errs) =
                        native::add_native_types(&typed.bid, &bidder_request.bid_request);
                    errs.extend(native_errs);
                    if let Some(markup) = markup {
                        match serde_json::to_string(&markup) {
                            Ok(adm) => typed.bid.adm = Some(adm),
                            Err(err) => errs.push(BidderError::Generic(err.to_string())),
                        }
                    }
                }
            }

            if let Some(imp_id) = outcome.stored_imp_id() {
                // Rewrite imp ids unless the account opted out for this imp.
                if bidder_request.imp_replace_id.get(imp_id).copied().unwrap_or(true) {
                    for typed in &mut parsed.bids {
                        typed.bid.impid = imp_id.to_string();
                    }
                }
            }

            let processed_payload = ProcessedBidResponsePayload {
                response: parsed,
                bidder: bidder_request.bidder.clone(),
            };
            let (processed_payload, reject) =
                hooks.execute_processed_bid_response_stage(processed_payload).await;
            if let Some(reject) = reject {
                errs.push(BidderError::Generic(reject.to_string()));
                continue;
            }
            let parsed = processed_payload.response;

            let (rate, adopted_currency) = match conversion {
                Some(found) => found,
                None => {
                    // No convertible currency: the whole response is dropped.
                    if let Some(err) = conversion_err {
                        errs.push(BidderError::Generic(err.to_string()));
                    }
                    continue;
                }
            };
            if let Some(primary) = seat_bids.get_mut(&bidder_request.bidder) {
                primary.currency = adopted_currency.clone();
            }

            for typed in parsed.bids {
                let mut bid_meta = typed.bid_meta.unwrap_or_default();
                bid_meta.adapter_code = bidder_request.bidder.clone();

                let seat = if typed.seat.is_empty() {
                    bidder_request.bidder.clone()
                } else {
                    typed.seat.clone()
                };
                if let Err(reason) =
                    alternate_codes.is_valid_bidder_code(&bidder_request.bidder, &seat)
                {
                    errs.push(BidderError::warning(WarningCode::AlternateBidderCode, reason));
                    continue;
                }

                // The alternate seat's adjustment wins over the primary's.
                let adjustment = options
                    .bid_adjustments
                    .get(&seat)
                    .or_else(|| options.bid_adjustments.get(&bidder_request.bidder))
                    .copied()
                    .unwrap_or(1.0);

                let mut bid = typed.bid;
                let original_bid_cpm = bid.price;
                bid.price = bid.price * adjustment * rate;

                let generated_bid_id =
                    options.generate_bid_id.then(|| uuid::Uuid::new_v4().to_string());

                if !seat_bids.contains_key(&seat) {
                    let http_calls = seat_bids
                        .get(&bidder_request.bidder)
                        .map(|primary| primary.http_calls.clone())
                        .unwrap_or_default();
                    seat_bids.insert(
                        seat.clone(),
                        NormalizedSeatBid {
                            seat: seat.clone(),
                            currency: adopted_currency.clone(),
                            bids: Vec::new(),
                            http_calls,
                        },
                    );
                }
                if let Some(entry) = seat_bids.get_mut(&seat) {
                    entry.bids.push(NormalizedBid {
                        bid,
                        bid_type: typed.bid_type,
                        bid_meta,
                        bid_video: typed.bid_video,
                        deal_priority: typed.deal_priority,
                        original_bid_cpm,
                        original_bid_cur: response_currency.clone(),
                        generated_bid_id,
                    });
                }
            }
        }

        (seat_bids.into_values().collect(), errs)
    }

    fn stamp_headers(
        &self,
        data: &mut RequestData,
        x_prebid: &str,
        req_info: &ExtraRequestInfo,
        options: &BidRequestOptions,
        signer: &dyn Signer,
        errs: &mut Vec<BidderError>,
    ) {
        if let Ok(value) = HeaderValue::from_str(x_prebid) {
            data.headers.insert("x-prebid", value);
        }
        if req_info.global_privacy_control_header == "1" {
            data.headers.insert("sec-gpc", HeaderValue::from_static("1"));
        }
        if options.add_call_sign_header {
            let started = Instant::now();
            let signed = signer.sign(&data.uri, &data.body);
            self.metrics.record_ads_cert_sign_time(started.elapsed());
            match signed {
                Ok(signature) if !signature.is_empty() => {
                    if let Ok(value) = HeaderValue::from_str(&signature) {
                        data.headers.insert(SIGN_HEADER, value);
                    }
                    self.metrics.record_ads_cert_request(true);
                }
                Ok(_) => {}
                Err(err) => {
                    self.metrics.record_ads_cert_request(false);
                    errs.push(BidderError::warning(
                        WarningCode::AdsCertSigner,
                        format!("AdsCert signer is enabled but cannot sign the request: {err}"),
                    ));
                }
            }
        }
    }

    /// Dispatches one outbound call under the request deadline.
    pub(crate) async fn do_request(&self, deadline: TokioInstant, req: RequestData) -> HttpCallInfo {
        let mut headers = req.headers.clone();
        let body = match self.config.endpoint_compression {
            Compression::Gzip => {
                headers
                    .insert(http::header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                compress_to_gzip(&req.body)
            }
            Compression::None => req.body.clone(),
        };

        let url = match reqwest::Url::parse(&req.uri) {
            Ok(url) => url,
            Err(err) => {
                return HttpCallInfo {
                    request: req,
                    response: None,
                    error: Some(BidderError::Generic(format!("invalid endpoint url: {err}"))),
                };
            }
        };

        let send = self
            .client
            .request(req.method.clone(), url)
            .headers(headers)
            .body(body)
            .send();

        let response = match tokio::time::timeout_at(deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let error = if err.is_timeout() {
                    self.spawn_timeout_notification(&req);
                    BidderError::Timeout(err.to_string())
                } else {
                    BidderError::Generic(err.to_string())
                };
                return HttpCallInfo { request: req, response: None, error: Some(error) };
            }
            Err(_) => {
                self.spawn_timeout_notification(&req);
                return HttpCallInfo {
                    request: req,
                    response: None,
                    error: Some(BidderError::Timeout("context deadline exceeded".to_string())),
                };
            }
        };

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let body = match tokio::time::timeout_at(deadline, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                return HttpCallInfo {
                    request: req,
                    response: None,
                    error: Some(BidderError::Generic(format!(
                        "failed to read response body: {err}"
                    ))),
                };
            }
            Err(_) => {
                self.spawn_timeout_notification(&req);
                return HttpCallInfo {
                    request: req,
                    response: None,
                    error: Some(BidderError::Timeout("context deadline exceeded".to_string())),
                };
            }
        };

        // Non-2xx/3xx is an error, but the body still rides along for debug.
        let error = if (200..400).contains(&status) {
            None
        } else {
            Some(BidderError::BadServerResponse { status })
        };

        HttpCallInfo {
            request: req,
            response: Some(ResponseData {
                status_code: status,
                body,
                headers: response_headers,
            }),
            error,
        }
    }

    /// Fires the adapter's timeout notification in a detached task so the
    /// out-of-time request is never delayed further.
    fn spawn_timeout_notification(&self, req: &RequestData) {
        if self.bidder.make_timeout_notification(req).is_none() {
            return;
        }
        let adapter = self.clone();
        let req = req.clone();
        tokio::spawn(async move {
            adapter.do_timeout_notification(req).await;
        });
    }

    pub(crate) async fn do_timeout_notification(&self, req: RequestData) {
        let deadline = TokioInstant::now() + TIMEOUT_NOTIFICATION_BUDGET;
        let cfg = &self.config.timeout_notification;

        match self.bidder.make_timeout_notification(&req) {
            None => {}
            Some(Err(reason)) => {
                self.metrics.record_timeout_notice(false);
                if cfg.log {
                    log_random_sample(
                        cfg.sampling_rate,
                        format!("TimeoutNotification: failed to generate timeout request: {reason}"),
                    );
                }
            }
            Some(Ok(notify)) => {
                let url = match reqwest::Url::parse(&notify.uri) {
                    Ok(url) => url,
                    Err(err) => {
                        self.metrics.record_timeout_notice(false);
                        if cfg.log {
                            log_random_sample(
                                cfg.sampling_rate,
                                format!("TimeoutNotification: invalid notify url: {err}"),
                            );
                        }
                        return;
                    }
                };

                let send = self
                    .client
                    .request(notify.method.clone(), url)
                    .headers(notify.headers.clone())
                    .body(notify.body.clone())
                    .send();
                let success = matches!(
                    tokio::time::timeout_at(deadline, send).await,
                    Ok(Ok(response)) if response.status().is_success()
                );
                self.metrics.record_timeout_notice(success);
                if cfg.log && !(cfg.fail_only && success) {
                    log_random_sample(
                        cfg.sampling_rate,
                        format!(
                            "TimeoutNotification: success:({success}) body:{}",
                            String::from_utf8_lossy(&notify.body)
                        ),
                    );
                }
            }
        }
    }
}

fn prepare_stored_response(imp_id: &str, stored: Bytes) -> CallOutcome {
    let body = format!("{STORED_RESPONSE_BODY_PREFIX}{imp_id}");
    CallOutcome::Stored {
        imp_id: imp_id.to_string(),
        call: HttpCallInfo {
            request: RequestData {
                method: Method::POST,
                uri: String::new(),
                body: body.into_bytes(),
                headers: HeaderMap::new(),
            },
            response: Some(ResponseData {
                status_code: 200,
                body: stored,
                headers: HeaderMap::new(),
            }),
            error: None,
        },
    }
}

fn compress_to_gzip(body: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    let _ = encoder.write_all(body);
    encoder.finish().unwrap_or_default()
}

fn log_random_sample(rate: f32, msg: String) {
    if rate >= 1.0 || rand::random::<f32>() < rate {
        tracing::warn!("{msg}");
    }
}
