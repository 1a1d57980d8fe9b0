//! JSON-RPC client for the full node.
//!
//! Requests are JSON-RPC 1.0 envelopes POSTed with basic auth. The client is
//! stateless apart from a request id counter; every call stands alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use miner_core::BlockTemplate;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::MinerConfig;
use crate::error::RpcError;

/// The node calls the miner depends on.
///
/// Implemented over HTTP by [`RpcClient`]; tests substitute an in-memory node.
pub trait NodeRpc {
    /// `getnewaddress`: a fresh wallet address for the payout.
    fn get_new_address(&self) -> Result<String, RpcError>;

    /// `validateaddress`: details about `address`, including its script.
    fn validate_address(&self, address: &str) -> Result<AddressInfo, RpcError>;

    /// `getblocktemplate` with the segwit rule set.
    fn get_block_template(&self) -> Result<BlockTemplate, RpcError>;

    /// `submitblock` with a hex-encoded block.
    fn submit_block(&self, block_hex: &str) -> Result<SubmitOutcome, RpcError>;
}

/// The fields of a `validateaddress` response the miner reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddressInfo {
    #[serde(default)]
    pub isvalid: bool,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: Option<String>,
}

/// How the node judged a submitted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// `submitblock` returned null.
    Accepted,
    /// `submitblock` returned a rejection reason such as `duplicate` or `high-hash`.
    Rejected(String),
}

/// HTTP JSON-RPC client.
pub struct RpcClient {
    client: Client,
    url: String,
    user: String,
    password: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for `url` with basic auth and a per-request timeout.
    pub fn new(url: &str, user: &str, password: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(RpcClient {
            client,
            url: url.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            next_id: AtomicU64::new(0),
        })
    }

    /// Create a client from the miner configuration.
    pub fn from_config(config: &MinerConfig) -> Result<Self, RpcError> {
        Self::new(
            &config.rpc_url,
            &config.rpc_user,
            &config.rpc_password,
            config.rpc_timeout,
        )
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one call and return its raw `result` value (possibly null).
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "1.0",
            "id": format!("gbt-miner-{}", id),
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC request");
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        debug!(method, id, status = status.as_u16(), len = body.len(), "RPC response");

        parse_response(status.as_u16(), &body)
    }

    /// Issue a call whose `result` must deserialize into `T`.
    fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        decode_result(method, self.call(method, params)?)
    }
}

impl NodeRpc for RpcClient {
    fn get_new_address(&self) -> Result<String, RpcError> {
        self.call_as("getnewaddress", json!([]))
    }

    fn validate_address(&self, address: &str) -> Result<AddressInfo, RpcError> {
        self.call_as("validateaddress", json!([address]))
    }

    fn get_block_template(&self) -> Result<BlockTemplate, RpcError> {
        let result = self.call("getblocktemplate", json!([{ "rules": ["segwit"] }]))?;
        parse_template(result)
    }

    fn submit_block(&self, block_hex: &str) -> Result<SubmitOutcome, RpcError> {
        let result = self.call("submitblock", json!([block_hex]))?;
        parse_submit_result(result)
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Split an HTTP response into the `result` value or a typed error.
///
/// Bitcoin Core reports RPC errors with a non-2xx status and a JSON body, so
/// the body is consulted before the status code.
fn parse_response(status: u16, body: &str) -> Result<Value, RpcError> {
    let success = (200..300).contains(&status);
    match serde_json::from_str::<RpcResponse>(body) {
        Ok(RpcResponse { error: Some(err), .. }) => Err(RpcError::Node {
            code: err.code,
            message: err.message,
        }),
        Ok(response) if success => Ok(response.result),
        Err(err) if success => Err(RpcError::Protocol(format!("invalid JSON response: {}", err))),
        _ => Err(RpcError::Transport(format!("HTTP status {}", status))),
    }
}

fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, RpcError> {
    if result.is_null() {
        return Err(RpcError::Protocol(format!("{} returned no result", method)));
    }
    serde_json::from_value(result)
        .map_err(|err| RpcError::Protocol(format!("{} result malformed: {}", method, err)))
}

/// The `getblocktemplate` fields used for mining; everything else is ignored.
#[derive(Debug, Deserialize)]
struct TemplateResponse {
    version: i32,
    previousblockhash: String,
    curtime: u32,
    bits: String,
    target: String,
    height: u32,
}

fn parse_template(result: Value) -> Result<BlockTemplate, RpcError> {
    let raw: TemplateResponse = decode_result("getblocktemplate", result)?;
    Ok(BlockTemplate::from_hex_fields(
        raw.version,
        &raw.previousblockhash,
        raw.curtime,
        &raw.bits,
        &raw.target,
        raw.height,
    )?)
}

fn parse_submit_result(result: Value) -> Result<SubmitOutcome, RpcError> {
    match result {
        Value::Null => Ok(SubmitOutcome::Accepted),
        Value::String(reason) => Ok(SubmitOutcome::Rejected(reason)),
        other => Err(RpcError::Protocol(format!(
            "submitblock returned unexpected result: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template() -> Value {
        json!({
            "version": 536870912,
            "previousblockhash": "0000000000000000000000000000000000000000000000000000000000000001",
            "curtime": 1690000000,
            "bits": "207fffff",
            "target": "7fffff0000000000000000000000000000000000000000000000000000000000",
            "height": 100,
            "coinbasevalue": 5000000000u64,
            "transactions": [],
        })
    }

    #[test]
    fn test_parse_response_success() {
        let result = parse_response(200, r#"{"result":"bcrt1qxyz","error":null,"id":"1"}"#).unwrap();
        assert_eq!(result, json!("bcrt1qxyz"));

        let result = parse_response(200, r#"{"result":null,"error":null,"id":"1"}"#).unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn test_parse_response_node_error() {
        let body = r#"{"result":null,"error":{"code":-10,"message":"Bitcoin Core is in initial sync"},"id":"1"}"#;
        match parse_response(500, body) {
            Err(RpcError::Node { code, message }) => {
                assert_eq!(code, -10);
                assert!(message.contains("initial sync"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_http_failure_is_transport() {
        assert!(matches!(parse_response(401, ""), Err(RpcError::Transport(_))));
        assert!(matches!(
            parse_response(503, "<html>busy</html>"),
            Err(RpcError::Transport(_))
        ));
    }

    #[test]
    fn test_parse_response_garbage_is_protocol() {
        assert!(matches!(parse_response(200, "not json"), Err(RpcError::Protocol(_))));
    }

    #[test]
    fn test_parse_template() {
        let template = parse_template(sample_template()).unwrap();
        assert_eq!(template.version, 0x20000000);
        assert_eq!(template.height, 100);
        assert_eq!(template.bits, [0x20, 0x7f, 0xff, 0xff]);
        assert_eq!(template.target[0], 0x7f);
        assert_eq!(template.previous_block_hash[31], 0x01);
    }

    #[test]
    fn test_parse_template_missing_field_is_protocol() {
        let mut value = sample_template();
        value.as_object_mut().unwrap().remove("target");
        assert!(matches!(parse_template(value), Err(RpcError::Protocol(_))));

        assert!(matches!(parse_template(Value::Null), Err(RpcError::Protocol(_))));
    }

    #[test]
    fn test_parse_template_bad_hex_is_protocol() {
        let mut value = sample_template();
        value["bits"] = json!("xyz");
        assert!(matches!(parse_template(value), Err(RpcError::Protocol(_))));
    }

    #[test]
    fn test_parse_submit_result() {
        assert_eq!(parse_submit_result(Value::Null).unwrap(), SubmitOutcome::Accepted);
        assert_eq!(
            parse_submit_result(json!("high-hash")).unwrap(),
            SubmitOutcome::Rejected("high-hash".to_string())
        );
        assert!(parse_submit_result(json!(42)).is_err());
    }

    #[test]
    fn test_decode_address_info() {
        let info: AddressInfo = decode_result(
            "validateaddress",
            json!({"isvalid": true, "address": "bcrt1q", "scriptPubKey": "0014abcd"}),
        )
        .unwrap();
        assert!(info.isvalid);
        assert_eq!(info.script_pub_key.as_deref(), Some("0014abcd"));
    }
}
