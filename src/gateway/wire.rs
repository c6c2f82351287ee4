//! JSON shapes of the booking platform.
//!
//! The platform is loose with types (numbers arrive as strings and vice versa),
//! so everything here reads `serde_json::Value` leniently instead of deriving
//! strict structs.

use serde::Serialize;
use serde_json::Value;

use crate::model::*;

/// `actionState`, `is_lock` and ids show up both as numbers and as strings.
pub fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Same leniency in the other direction: numbers become their decimal text.
pub fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn action_state(payload: &Value) -> Option<i64> {
    payload.get("actionState").and_then(lenient_i64)
}

/// Human-readable reason, whichever key the endpoint used.
pub fn message(payload: &Value) -> Option<String> {
    ["msg", "message", "actionMsg"]
        .iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Build a snapshot from `data.openSlice`. A payload without that object is an
/// empty snapshot, not an error.
pub fn snapshot_from_payload(payload: &Value) -> AvailabilitySnapshot {
    let Some(open_slice) = payload
        .get("data")
        .and_then(|d| d.get("openSlice"))
        .and_then(Value::as_object)
    else {
        return AvailabilitySnapshot::default();
    };

    // serde_json is built with preserve_order, so this walks the listing order.
    let entries = open_slice
        .iter()
        .map(|(id, info)| SliceEntry {
            instance_id: id.clone(),
            display_name: info
                .get("slice_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            window: info
                .get("slice_time")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            lock: LockFlag(info.get("is_lock").and_then(lenient_i64)),
        })
        .collect();
    AvailabilitySnapshot::new(entries)
}

pub fn claim_response_from_payload(payload: &Value) -> ClaimResponse {
    let data = payload.get("data").cloned().unwrap_or(Value::Null);
    let payment_handle = data
        .get("codeUrl")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    ClaimResponse {
        status: action_state(payload),
        payment_handle,
        data,
        message: message(payload),
    }
}

/// Body of `order/createOrderBatch`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest<'a> {
    pub api_version: &'a str,
    pub order_type: u8,
    pub user_id: Value,
    pub order_user: u8,
    pub so_openid: &'a str,
    pub phones: [&'a str; 1],
    pub full_path: String,
}

impl<'a> OrderRequest<'a> {
    pub fn new(api_version: &'a str, order_page_url: &str, candidate: &'a Candidate, identity: &'a Identity) -> Self {
        // The platform hands out numeric user ids; send them back as numbers.
        let user_id = identity
            .user_id()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(identity.user_id()));
        Self {
            api_version,
            order_type: 1,
            user_id,
            order_user: 1,
            so_openid: &candidate.instance_id,
            phones: [identity.phone()],
            full_path: format!("{order_page_url}?openid={}", candidate.instance_id),
        }
    }
}
