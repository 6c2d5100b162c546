//! JSON-RPC boundary for the filter index
//!
//! Maps `getblockfilter` params to a [`BlockFilterApi`] call and its results
//! to the JSON contract callers depend on:
//!
//! | Condition                    | Code | Message                  |
//! |------------------------------|------|--------------------------|
//! | success                      |      | `{"filter": "<hex>"}`    |
//! | hash not on the active chain | -5   | `Block not found`        |
//! | undefined or disabled type   | -1   | `unknown filter_type`    |
//! | block not indexed yet        | -1   | `Filter not found`       |
//! | malformed hash string        | -8   | `blockhash must be ...`  |
//! | wrong param type             | -3   | `Expected type ...`      |

use serde::Serialize;
use serde_json::{json, Value};
use shared_types::Hash;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{FilterType, TrackerState};
use crate::error::QueryError;
use crate::ports::inbound::BlockFilterApi;

/// Error codes returned by this boundary
pub mod codes {
    /// Generic failure, including unknown filter types
    pub const MISC_ERROR: i32 = -1;
    /// Parameter of the wrong JSON type
    pub const TYPE_ERROR: i32 = -3;
    /// Block hash not on the active chain
    pub const INVALID_ADDRESS_OR_KEY: i32 = -5;
    /// Parameter of the right type but malformed
    pub const INVALID_PARAMETER: i32 = -8;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

pub const GETBLOCKFILTER: &str = "getblockfilter";
pub const GETINDEXINFO: &str = "getindexinfo";

/// RPC error with code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(codes::TYPE_ERROR, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMETER, message)
    }

    pub fn to_json(&self) -> Value {
        json!({ "code": self.code, "message": self.message })
    }
}

impl From<QueryError> for RpcError {
    fn from(err: QueryError) -> Self {
        let code = match &err {
            QueryError::BlockNotFound => codes::INVALID_ADDRESS_OR_KEY,
            QueryError::InvalidFilterType(_) | QueryError::FilterNotFound { .. } => {
                codes::MISC_ERROR
            }
            QueryError::Storage(_) => codes::INTERNAL_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

/// Parse a 64-character hex block hash, case-insensitive.
pub fn parse_hash(name: &str, value: &str) -> Result<Hash, RpcError> {
    if value.len() != 64 {
        return Err(RpcError::invalid_parameter(format!(
            "{} must be of length 64 (not {}, for '{}')",
            name,
            value.len(),
            value
        )));
    }

    let mut hash = [0u8; 32];
    hex::decode_to_slice(value, &mut hash).map_err(|_| {
        RpcError::invalid_parameter(format!(
            "{} must be hexadecimal string (not '{}')",
            name, value
        ))
    })?;
    Ok(hash)
}

/// Filter type selector: an integer, or a type name such as `"basic"`.
/// Defaults to basic when omitted.
fn parse_filter_type(value: Option<&Value>) -> Result<i64, RpcError> {
    match value {
        None | Some(Value::Null) => Ok(i64::from(FilterType::Basic.as_u8())),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| RpcError::new(codes::MISC_ERROR, "unknown filter_type")),
        Some(Value::String(name)) => name
            .parse::<FilterType>()
            .map(|t| i64::from(t.as_u8()))
            .map_err(|_| RpcError::new(codes::MISC_ERROR, "unknown filter_type")),
        Some(_) => Err(RpcError::type_error(
            "Expected type number for filtertype",
        )),
    }
}

/// Dispatches filter index RPC methods.
pub struct RpcHandler<A: BlockFilterApi> {
    api: Arc<A>,
}

impl<A: BlockFilterApi> RpcHandler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn handle(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            GETBLOCKFILTER => self.getblockfilter(params),
            GETINDEXINFO => Ok(self.getindexinfo()),
            _ => Err(RpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    /// `getblockfilter [blockhash, filtertype]`
    pub fn getblockfilter(&self, params: &Value) -> Result<Value, RpcError> {
        let params = match params {
            Value::Array(items) => items.as_slice(),
            Value::Null => &[],
            _ => return Err(RpcError::type_error("Expected params array")),
        };

        let hash_str = match params.first() {
            Some(Value::String(s)) => s,
            Some(_) => return Err(RpcError::type_error("Expected type string for blockhash")),
            None => {
                return Err(RpcError::new(
                    codes::INVALID_PARAMS,
                    "getblockfilter requires a blockhash",
                ))
            }
        };
        let block_hash = parse_hash("blockhash", hash_str)?;
        let filter_type = parse_filter_type(params.get(1))?;

        let filter = self.api.get_block_filter(&block_hash, filter_type)?;
        Ok(json!({ "filter": hex::encode(filter) }))
    }

    /// Indexing progress per filter type.
    pub fn getindexinfo(&self) -> Value {
        let status = self.api.index_status();
        let types: Vec<Value> = status
            .types
            .iter()
            .map(|t| {
                json!({
                    "filter_type": t.filter_type.name(),
                    "state": t.state,
                    "best_block_height": t.best_height,
                    "synced": t.state == TrackerState::Synced,
                })
            })
            .collect();

        json!({
            "tip": status.tip.map(|tip| json!({
                "hash": hex::encode(tip.hash),
                "height": tip.height,
            })),
            "filters": types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndexStatus, TypeStatus};
    use shared_types::BlockRef;

    /// Serves one known block for basic filters only.
    struct StubApi;

    const KNOWN: Hash = [0xAB; 32];

    impl BlockFilterApi for StubApi {
        fn get_block_filter(&self, block_hash: &Hash, filter_type: i64) -> Result<Vec<u8>, QueryError> {
            if *block_hash != KNOWN {
                return Err(QueryError::BlockNotFound);
            }
            match filter_type {
                0 => Ok(vec![0x01, 0xAB, 0xCD]),
                1 => Err(QueryError::FilterNotFound {
                    block_hash: *block_hash,
                    filter_type: FilterType::Extended,
                }),
                other => Err(QueryError::InvalidFilterType(other)),
            }
        }

        fn index_status(&self) -> IndexStatus {
            IndexStatus {
                tip: Some(BlockRef::new(KNOWN, 4)),
                types: vec![TypeStatus {
                    filter_type: FilterType::Basic,
                    state: TrackerState::Synced,
                    best_height: Some(4),
                }],
            }
        }
    }

    fn handler() -> RpcHandler<StubApi> {
        RpcHandler::new(Arc::new(StubApi))
    }

    fn known_hex() -> String {
        hex::encode(KNOWN)
    }

    #[test]
    fn test_success_returns_lowercase_hex() {
        let result = handler()
            .handle(GETBLOCKFILTER, &json!([known_hex(), 0]))
            .unwrap();
        assert_eq!(result, json!({ "filter": "01abcd" }));
    }

    #[test]
    fn test_filter_type_defaults_to_basic() {
        let result = handler().getblockfilter(&json!([known_hex()])).unwrap();
        assert_eq!(result["filter"], "01abcd");
    }

    #[test]
    fn test_uppercase_hash_accepted() {
        let result = handler().getblockfilter(&json!([known_hex().to_uppercase(), 0]));
        assert!(result.is_ok());
    }

    #[test]
    fn test_filter_type_by_name() {
        let result = handler().getblockfilter(&json!([known_hex(), "basic"])).unwrap();
        assert_eq!(result["filter"], "01abcd");

        let err = handler()
            .getblockfilter(&json!([known_hex(), "bloom"]))
            .unwrap_err();
        assert_eq!(err, RpcError::new(-1, "unknown filter_type"));
    }

    #[test]
    fn test_unknown_block() {
        let err = handler()
            .getblockfilter(&json!(["0123456789abcdef".repeat(4), 0]))
            .unwrap_err();
        assert_eq!(err, RpcError::new(-5, "Block not found"));
    }

    #[test]
    fn test_unknown_filter_type() {
        for raw in [-1, 2] {
            let err = handler()
                .getblockfilter(&json!([known_hex(), raw]))
                .unwrap_err();
            assert_eq!(err, RpcError::new(-1, "unknown filter_type"));
        }
    }

    #[test]
    fn test_filter_not_found() {
        let err = handler()
            .getblockfilter(&json!([known_hex(), 1]))
            .unwrap_err();
        assert_eq!(err.code, codes::MISC_ERROR);
        assert_eq!(err.message, "Filter not found");
    }

    #[test]
    fn test_malformed_hash() {
        let err = handler().getblockfilter(&json!(["abc", 0])).unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMETER);
        assert_eq!(err.message, "blockhash must be of length 64 (not 3, for 'abc')");

        let not_hex = "zz".repeat(32);
        let err = handler().getblockfilter(&json!([not_hex, 0])).unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMETER);
        assert!(err.message.starts_with("blockhash must be hexadecimal string"));
    }

    #[test]
    fn test_wrong_param_types() {
        let err = handler().getblockfilter(&json!([42, 0])).unwrap_err();
        assert_eq!(err.code, codes::TYPE_ERROR);

        let err = handler()
            .getblockfilter(&json!([known_hex(), [0]]))
            .unwrap_err();
        assert_eq!(err.code, codes::TYPE_ERROR);
    }

    #[test]
    fn test_unknown_method() {
        let err = handler().handle("getblock", &json!([])).unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_getindexinfo() {
        let info = handler().handle(GETINDEXINFO, &Value::Null).unwrap();
        assert_eq!(info["tip"]["height"], 4);
        assert_eq!(info["filters"][0]["filter_type"], "basic");
        assert_eq!(info["filters"][0]["state"], "synced");
        assert_eq!(info["filters"][0]["synced"], true);
    }
}
