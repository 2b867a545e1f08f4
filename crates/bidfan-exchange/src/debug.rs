use std::collections::BTreeMap;

use http::header::AUTHORIZATION;
use http::HeaderMap;
use serde::Serialize;

use crate::bidder::HttpCallInfo;

/// One outbound call as exposed in `response.ext.debug.httpcalls.<bidder>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpCallDebug {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_body: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub status: u16,
}

fn is_zero(v: &u16) -> bool {
    *v == 0
}

/// Drops credentials before anything reaches a debug surface.
pub fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut clone = headers.clone();
    clone.remove(AUTHORIZATION);
    clone
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).to_string());
    }
    map
}

/// Snapshot of one call for the debug extension. Response fields are only
/// present when the call produced a response.
pub fn make_debug_ext(info: &HttpCallInfo) -> HttpCallDebug {
    let mut ext = HttpCallDebug {
        uri: info.request.uri.clone(),
        request_body: String::from_utf8_lossy(&info.request.body).to_string(),
        request_headers: headers_to_map(&filter_headers(&info.request.headers)),
        ..Default::default()
    };

    if info.error.is_none() {
        if let Some(response) = &info.response {
            ext.response_body = String::from_utf8_lossy(&response.body).to_string();
            ext.status = response.status_code;
        }
    }

    ext
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidfan_adapters::{RequestData, ResponseData};
    use bidfan_common::errors::BidderError;
    use http::HeaderValue;

    fn make_info() -> HttpCallInfo {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sekrit"));
        headers.insert("x-prebid", HeaderValue::from_static("bidfan/0.4.0"));

        HttpCallInfo {
            request: RequestData {
                method: http::Method::POST,
                uri: "https://demand.example/bid".to_string(),
                body: b"{\"id\":\"req-1\"}".to_vec(),
                headers,
            },
            response: Some(ResponseData {
                status_code: 200,
                body: bytes::Bytes::from_static(b"{\"id\":\"req-1\",\"seatbid\":[]}"),
                headers: HeaderMap::new(),
            }),
            error: None,
        }
    }

    #[test]
    fn test_authorization_header_scrubbed() {
        let ext = make_debug_ext(&make_info());
        assert!(!ext.request_headers.contains_key("authorization"));
        assert!(ext.request_headers.contains_key("x-prebid"));

        let raw = serde_json::to_string(&ext).unwrap();
        assert!(!raw.contains("sekrit"));
    }

    #[test]
    fn test_response_fields_present_on_success() {
        let ext = make_debug_ext(&make_info());
        assert_eq!(ext.status, 200);
        assert_eq!(ext.uri, "https://demand.example/bid");
        assert!(ext.response_body.contains("seatbid"));
    }

    #[test]
    fn test_response_fields_absent_on_error() {
        let mut info = make_info();
        info.error = Some(BidderError::Timeout("deadline exceeded".to_string()));
        let ext = make_debug_ext(&info);
        assert_eq!(ext.status, 0);
        assert!(ext.response_body.is_empty());
        // The request side is still captured for the trace.
        assert_eq!(ext.request_body, "{\"id\":\"req-1\"}");
    }
}
