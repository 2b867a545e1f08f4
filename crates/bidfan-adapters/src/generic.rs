use bidfan_common::errors::BidderError;
use bidfan_common::openrtb::{BidRequest, BidResponse};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};

use crate::bids::{BidType, BidderResponse, TypedBid};
use crate::{Bidder, ExtraRequestInfo, RequestData, ResponseData};

/// Pass-through OpenRTB adapter: POSTs the bid request verbatim to a single
/// configured endpoint and reads a standard OpenRTB bid response back. Bid
/// media type is taken from `bid.ext.prebid.type` when the endpoint sets it.
#[derive(Debug, Clone)]
pub struct GenericOrtbBidder {
    endpoint: String,
    timeout_endpoint: Option<String>,
}

impl GenericOrtbBidder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        GenericOrtbBidder { endpoint: endpoint.into(), timeout_endpoint: None }
    }

    /// Enables timeout notifications, sent as GET to `endpoint`.
    pub fn with_timeout_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.timeout_endpoint = Some(endpoint.into());
        self
    }
}

impl Bidder for GenericOrtbBidder {
    fn make_requests(
        &self,
        request: &BidRequest,
        _info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<BidderError>) {
        let body = match serde_json::to_vec(request) {
            Ok(body) => body,
            Err(e) => {
                return (vec![], vec![BidderError::Generic(format!("failed to encode bid request: {e}"))]);
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let data = RequestData {
            method: Method::POST,
            uri: self.endpoint.clone(),
            body,
            headers,
        };
        (vec![data], vec![])
    }

    fn make_bids(
        &self,
        _request: &BidRequest,
        _request_sent: &RequestData,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<BidderError>) {
        if response.body.is_empty() {
            return (None, vec![]);
        }

        let parsed: BidResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return (None, vec![BidderError::Generic(format!("failed to decode bid response: {e}"))]);
            }
        };

        let mut out = BidderResponse::with_capacity(
            parsed.seatbid.iter().map(|sb| sb.bid.len()).sum(),
        );
        out.currency = parsed.cur.clone();

        for seat_bid in parsed.seatbid {
            for bid in seat_bid.bid {
                let bid_type = bid
                    .ext
                    .get("prebid")
                    .and_then(|p| p.get("type"))
                    .and_then(|t| serde_json::from_value::<BidType>(t.clone()).ok())
                    .unwrap_or_default();

                out.bids.push(TypedBid {
                    bid,
                    bid_type,
                    bid_meta: None,
                    bid_video: None,
                    deal_priority: 0,
                    seat: seat_bid.seat.clone(),
                });
            }
        }

        (Some(out), vec![])
    }

    fn make_timeout_notification(
        &self,
        _request_sent: &RequestData,
    ) -> Option<Result<RequestData, String>> {
        let endpoint = self.timeout_endpoint.as_ref()?;
        Some(Ok(RequestData {
            method: Method::GET,
            uri: endpoint.clone(),
            body: vec![],
            headers: HeaderMap::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidfan_common::openrtb::Imp;

    fn make_request() -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            imp: vec![Imp { id: "imp-1".to_string(), ..Default::default() }],
            ..Default::default()
        }
    }

    #[test]
    fn test_make_requests_encodes_bid_request() {
        let bidder = GenericOrtbBidder::new("https://demand.example/bid");
        let (requests, errors) = bidder.make_requests(&make_request(), &ExtraRequestInfo::default());

        assert!(errors.is_empty());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].uri, "https://demand.example/bid");

        let decoded: BidRequest = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(decoded.id, "req-1");
    }

    #[test]
    fn test_make_bids_decodes_seats_and_types() {
        let bidder = GenericOrtbBidder::new("https://demand.example/bid");
        let body = serde_json::json!({
            "id": "req-1",
            "cur": "EUR",
            "seatbid": [{
                "seat": "seat-x",
                "bid": [
                    {"id": "b1", "impid": "imp-1", "price": 1.25},
                    {"id": "b2", "impid": "imp-1", "price": 0.75, "ext": {"prebid": {"type": "video"}}}
                ]
            }]
        });
        let response = ResponseData {
            status_code: 200,
            body: serde_json::to_vec(&body).unwrap().into(),
            headers: HeaderMap::new(),
        };

        let (parsed, errors) =
            bidder.make_bids(&make_request(), &RequestData::default(), &response);
        assert!(errors.is_empty());
        let parsed = parsed.unwrap();
        assert_eq!(parsed.currency, "EUR");
        assert_eq!(parsed.bids.len(), 2);
        assert_eq!(parsed.bids[0].seat, "seat-x");
        assert_eq!(parsed.bids[0].bid_type, BidType::Banner);
        assert_eq!(parsed.bids[1].bid_type, BidType::Video);
    }

    #[test]
    fn test_make_bids_empty_body_is_no_bid() {
        let bidder = GenericOrtbBidder::new("https://demand.example/bid");
        let response =
            ResponseData { status_code: 204, body: bytes::Bytes::new(), headers: HeaderMap::new() };
        let (parsed, errors) =
            bidder.make_bids(&make_request(), &RequestData::default(), &response);
        assert!(parsed.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_timeout_notification_requires_configuration() {
        let plain = GenericOrtbBidder::new("https://demand.example/bid");
        assert!(plain.make_timeout_notification(&RequestData::default()).is_none());

        let notifying = GenericOrtbBidder::new("https://demand.example/bid")
            .with_timeout_endpoint("https://demand.example/timeout");
        let req = notifying
            .make_timeout_notification(&RequestData::default())
            .unwrap()
            .unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.uri, "https://demand.example/timeout");
    }
}
