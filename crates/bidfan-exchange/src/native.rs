use bidfan_common::errors::BidderError;
use bidfan_common::native::{NativeRequest, NativeRequestAsset, NativeResponse};
use bidfan_common::openrtb::{Bid, BidRequest, NativeImp};

/// Fills missing asset `type` fields on a native bid's markup from the
/// originating impression's native request, matching assets by ID.
///
/// Some bidders return non-compliant markup; when the markup does not parse
/// or carries no assets the bid passes through untouched with no errors.
/// Returns the rewritten markup for the caller to serialize back into `adm`.
pub fn add_native_types(bid: &Bid, request: &BidRequest) -> (Option<NativeResponse>, Vec<BidderError>) {
    let mut errors = Vec::new();

    let adm = match bid.adm.as_deref() {
        Some(adm) if !adm.is_empty() => adm,
        _ => return (None, errors),
    };

    let mut markup: NativeResponse = match serde_json::from_str(adm) {
        Ok(markup) => markup,
        Err(_) => return (None, errors),
    };
    if markup.assets.is_empty() {
        return (None, errors);
    }

    let native_imp = match get_native_imp_by_imp_id(&bid.impid, request) {
        Some(native_imp) => native_imp,
        None => {
            errors.push(BidderError::Generic("Could not find native imp".to_string()));
            return (None, errors);
        }
    };

    let native_payload: NativeRequest = match serde_json::from_str(&native_imp.request) {
        Ok(payload) => payload,
        Err(e) => {
            errors.push(BidderError::Generic(format!("invalid native request payload: {e}")));
            NativeRequest::default()
        }
    };

    for asset in &mut markup.assets {
        if let Err(e) = set_asset_types(asset, &native_payload) {
            errors.push(BidderError::Generic(e));
        }
    }

    (Some(markup), errors)
}

fn set_asset_types(
    asset: &mut bidfan_common::native::NativeResponseAsset,
    payload: &NativeRequest,
) -> Result<(), String> {
    if asset.img.is_some() {
        let id = asset.id.ok_or("Response Image asset doesn't have an ID")?;
        let request_asset = get_asset_by_id(id, &payload.assets)?;
        match &request_asset.img {
            Some(img) if img.asset_type != 0 => {
                if let Some(response_img) = asset.img.as_mut() {
                    response_img.asset_type = Some(img.asset_type);
                }
            }
            Some(_) => {}
            None => {
                return Err(format!(
                    "Response has an Image asset with ID:{id} present that doesn't exist in the request"
                ));
            }
        }
    }

    if asset.data.is_some() {
        let id = asset.id.ok_or("Response Data asset doesn't have an ID")?;
        let request_asset = get_asset_by_id(id, &payload.assets)?;
        match &request_asset.data {
            Some(data) if data.asset_type != 0 => {
                if let Some(response_data) = asset.data.as_mut() {
                    response_data.asset_type = Some(data.asset_type);
                }
            }
            Some(_) => {}
            None => {
                return Err(format!(
                    "Response has a Data asset with ID:{id} present that doesn't exist in the request"
                ));
            }
        }
    }

    Ok(())
}

fn get_native_imp_by_imp_id<'a>(imp_id: &str, request: &'a BidRequest) -> Option<&'a NativeImp> {
    request
        .imp
        .iter()
        .find(|imp| imp.id == imp_id)
        .and_then(|imp| imp.native.as_ref())
}

fn get_asset_by_id(id: i64, assets: &[NativeRequestAsset]) -> Result<&NativeRequestAsset, String> {
    assets
        .iter()
        .find(|asset| asset.id == id)
        .ok_or_else(|| format!("Unable to find asset with ID:{id} in the request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidfan_common::openrtb::Imp;

    fn make_request(native_request: &str) -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            imp: vec![Imp {
                id: "imp-1".to_string(),
                native: Some(NativeImp { request: native_request.to_string(), ver: None }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn make_bid(adm: &str) -> Bid {
        Bid {
            id: "bid-1".to_string(),
            impid: "imp-1".to_string(),
            adm: Some(adm.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_types_copied_from_request_assets() {
        let request = make_request(
            r#"{"assets":[{"id":1,"img":{"type":3}},{"id":2,"data":{"type":4}}]}"#,
        );
        let bid = make_bid(
            r#"{"assets":[{"id":1,"img":{"url":"https://cdn.example/a.png"}},{"id":2,"data":{"value":"Acme"}}]}"#,
        );

        let (markup, errors) = add_native_types(&bid, &request);
        assert!(errors.is_empty());
        let markup = markup.unwrap();
        assert_eq!(markup.assets[0].img.as_ref().unwrap().asset_type, Some(3));
        assert_eq!(markup.assets[1].data.as_ref().unwrap().asset_type, Some(4));
    }

    #[test]
    fn test_zero_request_type_not_copied() {
        let request = make_request(r#"{"assets":[{"id":1,"img":{"type":0}}]}"#);
        let bid = make_bid(r#"{"assets":[{"id":1,"img":{"url":"https://cdn.example/a.png"}}]}"#);

        let (markup, errors) = add_native_types(&bid, &request);
        assert!(errors.is_empty());
        assert_eq!(markup.unwrap().assets[0].img.as_ref().unwrap().asset_type, None);
    }

    #[test]
    fn test_non_compliant_markup_skipped_silently() {
        let request = make_request(r#"{"assets":[{"id":1,"img":{"type":3}}]}"#);
        let bid = make_bid("<div>not json</div>");

        let (markup, errors) = add_native_types(&bid, &request);
        assert!(markup.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_asset_id_is_an_error() {
        let request = make_request(r#"{"assets":[{"id":1,"img":{"type":3}}]}"#);
        let bid = make_bid(r#"{"assets":[{"img":{"url":"https://cdn.example/a.png"}}]}"#);

        let (markup, errors) = add_native_types(&bid, &request);
        assert!(markup.is_some());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("doesn't have an ID"));
    }

    #[test]
    fn test_unmatched_asset_id_is_an_error_but_others_continue() {
        let request = make_request(r#"{"assets":[{"id":1,"img":{"type":3}}]}"#);
        let bid = make_bid(
            r#"{"assets":[{"id":9,"img":{"url":"https://a"}},{"id":1,"img":{"url":"https://b"}}]}"#,
        );

        let (markup, errors) = add_native_types(&bid, &request);
        let markup = markup.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("ID:9"));
        assert_eq!(markup.assets[1].img.as_ref().unwrap().asset_type, Some(3));
    }

    #[test]
    fn test_missing_native_imp_is_an_error() {
        let mut request = make_request(r#"{"assets":[{"id":1,"img":{"type":3}}]}"#);
        request.imp[0].native = None;
        let bid = make_bid(r#"{"assets":[{"id":1,"img":{"url":"https://a"}}]}"#);

        let (markup, errors) = add_native_types(&bid, &request);
        assert!(markup.is_none());
        assert_eq!(errors[0].to_string(), "Could not find native imp");
    }
}
