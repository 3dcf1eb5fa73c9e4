//! Event subscription parameters.

use serde_json::Value;

use crate::events::EventFilter;
use crate::rpc::RpcError;

/// Read the optional `filter` of a `subscribe_events` call.
pub fn parse_filter(params: &Value) -> Result<EventFilter, RpcError> {
    match params.get("filter") {
        None | Some(Value::Null) => Ok(EventFilter::default()),
        Some(filter) => super::parse(filter),
    }
}
