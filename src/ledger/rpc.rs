use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, Uri};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::abi::{self, Token};
use crate::error::LedgerError;
use crate::traits::{AgreementContract, AssetContract, LedgerClock, TransactionTracker};
use crate::types::{Address, Amount, Receipt, TxHash};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Ledger backend speaking Ethereum JSON-RPC over HTTP.
///
/// Transactions go through `eth_sendTransaction`, so every participant
/// identity must be an account the node can sign for.
pub struct JsonRpcLedger {
    endpoint: Uri,
    client: Client<HttpConnector>,
    next_id: AtomicU64,
    receipt_poll_interval: Duration,
}

impl JsonRpcLedger {
    pub fn new(endpoint: &str) -> Result<Self, LedgerError> {
        let uri: Uri = endpoint.parse().map_err(|e| LedgerError::Rpc {
            method: "connect".to_string(),
            message: format!("invalid endpoint \"{}\": {}", endpoint, e),
        })?;
        if uri.scheme_str() != Some("http") {
            return Err(LedgerError::Rpc {
                method: "connect".to_string(),
                message: format!("endpoint \"{}\" must use http://", endpoint),
            });
        }

        Ok(Self {
            endpoint: uri,
            client: Client::new(),
            next_id: AtomicU64::new(1),
            receipt_poll_interval: Duration::from_secs(2),
        })
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!("rpc -> {}", payload);

        let transport = |e: String| LedgerError::Rpc {
            method: method.to_string(),
            message: e,
        };

        let body = serde_json::to_vec(&payload).map_err(|e| transport(e.to_string()))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header("content-type", "application/json")
            .body(Body::from(body))
            .map_err(|e| transport(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| transport(e.to_string()))?;
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| transport(e.to_string()))?;
        if !status.is_success() {
            return Err(transport(format!(
                "http {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        parse_response(method, &bytes)
    }

    async fn call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let result = self
            .request(
                "eth_call",
                json!([{ "to": to.to_string(), "data": hex_data(&data) }, "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| LedgerError::EmptyResponse("eth_call".to_string()))?;
        decode_hex_data(raw)
    }

    async fn call_uint(&self, to: &Address, selector: abi::Selector) -> Result<Amount, LedgerError> {
        abi::decode_uint(&self.call(to, abi::encode_call(selector, &[])).await?)
    }

    async fn call_u64(&self, to: &Address, selector: abi::Selector) -> Result<u64, LedgerError> {
        abi::decode_u64(&self.call(to, abi::encode_call(selector, &[])).await?)
    }

    async fn call_address(
        &self,
        to: &Address,
        selector: abi::Selector,
    ) -> Result<Address, LedgerError> {
        abi::decode_address(&self.call(to, abi::encode_call(selector, &[])).await?)
    }

    async fn send_transaction(
        &self,
        from: &Address,
        to: &Address,
        data: Vec<u8>,
    ) -> Result<TxHash, LedgerError> {
        let result = self
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "data": hex_data(&data),
                }]),
            )
            .await?;
        let hash = result
            .as_str()
            .ok_or_else(|| LedgerError::EmptyResponse("eth_sendTransaction".to_string()))?;
        debug!("submitted {} from {}", hash, from);
        Ok(hash.to_string())
    }

    async fn poll_receipt(&self, tx_hash: &str) -> Result<Receipt, LedgerError> {
        loop {
            let receipt = self
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if receipt.is_null() {
                tokio::time::sleep(self.receipt_poll_interval).await;
                continue;
            }

            let block_number = parse_quantity(&receipt["blockNumber"], "blockNumber")?;
            return match receipt["status"].as_str() {
                Some("0x1") | Some("0x01") => Ok(Receipt {
                    tx_hash: tx_hash.to_string(),
                    block_number,
                }),
                _ => Err(LedgerError::Reverted(format!(
                    "{} failed in block {}",
                    tx_hash, block_number
                ))),
            };
        }
    }
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn decode_hex_data(raw: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| LedgerError::Decode(format!("\"{}\": {}", raw, e)))
}

/// Parses a JSON-RPC hex quantity such as `"0x1a"`.
pub(crate) fn parse_quantity(value: &Value, field: &str) -> Result<u64, LedgerError> {
    let raw = value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("missing {}", field)))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("{} \"{}\": {}", field, raw, e)))
}

/// Splits a JSON-RPC envelope into result or classified error.
///
/// A present `null` result is returned as `Value::Null`; a missing one is
/// `EmptyResponse`.
pub(crate) fn parse_response(method: &str, bytes: &[u8]) -> Result<Value, LedgerError> {
    let malformed = |e: serde_json::Error| LedgerError::Rpc {
        method: method.to_string(),
        message: format!("malformed response: {}", e),
    };
    let mut envelope: Value = serde_json::from_slice(bytes).map_err(malformed)?;

    if let Some(raw) = envelope.get("error").filter(|e| !e.is_null()) {
        let err: RpcErrorObject = serde_json::from_value(raw.clone()).map_err(malformed)?;
        if err.message.to_lowercase().contains("revert") {
            return Err(LedgerError::Reverted(err.message));
        }
        return Err(LedgerError::Rpc {
            method: method.to_string(),
            message: format!("{} (code {})", err.message, err.code),
        });
    }

    envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| LedgerError::EmptyResponse(method.to_string()))
}

#[async_trait]
impl LedgerClock for JsonRpcLedger {
    async fn now(&self) -> Result<u64, LedgerError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        if block.is_null() {
            return Err(LedgerError::EmptyResponse("eth_getBlockByNumber".to_string()));
        }
        parse_quantity(&block["timestamp"], "timestamp")
    }
}

#[async_trait]
impl TransactionTracker for JsonRpcLedger {
    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Receipt, LedgerError> {
        match tokio::time::timeout(timeout, self.poll_receipt(tx_hash)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout {
                tx: tx_hash.to_string(),
                waited_secs: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl AgreementContract for JsonRpcLedger {
    async fn current_round(&self, agreement: &Address) -> Result<u64, LedgerError> {
        self.call_u64(agreement, abi::CURR_ROUND).await
    }

    async fn contribution(
        &self,
        agreement: &Address,
        round: u64,
        participant: &Address,
    ) -> Result<Amount, LedgerError> {
        let data = abi::encode_call(
            abi::ROUND_DEPOSITS,
            &[Token::Uint(round as Amount), Token::Address(*participant)],
        );
        abi::decode_amount(&self.call(agreement, data).await?)
    }

    async fn start_time(&self, agreement: &Address) -> Result<u64, LedgerError> {
        self.call_u64(agreement, abi::START_TIME).await
    }

    async fn round_duration(&self, agreement: &Address) -> Result<u64, LedgerError> {
        self.call_u64(agreement, abi::TIME_PER_ROUND).await
    }

    async fn num_rounds(&self, agreement: &Address) -> Result<u64, LedgerError> {
        self.call_u64(agreement, abi::NUM_ROUNDS).await
    }

    async fn installment_size(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        self.call_uint(agreement, abi::INSTALLMENT_SIZE).await
    }

    async fn protocol_reward(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        self.call_uint(agreement, abi::PROTOCOL_REWARD).await
    }

    async fn max_auction_size(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        self.call_uint(agreement, abi::MAX_AUCTION).await
    }

    async fn installment_asset(&self, agreement: &Address) -> Result<Address, LedgerError> {
        self.call_address(agreement, abi::INSTALLMENT_TOKEN).await
    }

    async fn reward_asset(&self, agreement: &Address) -> Result<Address, LedgerError> {
        self.call_address(agreement, abi::PROTOCOL_TOKEN).await
    }

    async fn deposit_round(
        &self,
        agreement: &Address,
        from: &Address,
        round: u64,
        auction_size: Amount,
    ) -> Result<TxHash, LedgerError> {
        let data = abi::encode_call(
            abi::DEPOSIT_ROUND,
            &[
                Token::Uint(round as Amount),
                Token::Uint(auction_size),
                Token::Address(*from),
            ],
        );
        self.send_transaction(from, agreement, data).await
    }

    async fn register(&self, agreement: &Address, from: &Address) -> Result<TxHash, LedgerError> {
        self.send_transaction(from, agreement, abi::encode_call(abi::REGISTER, &[]))
            .await
    }
}

#[async_trait]
impl AssetContract for JsonRpcLedger {
    async fn balance_of(&self, asset: &Address, holder: &Address) -> Result<Amount, LedgerError> {
        let data = abi::encode_call(abi::BALANCE_OF, &[Token::Address(*holder)]);
        abi::decode_amount(&self.call(asset, data).await?)
    }

    async fn allowance(
        &self,
        asset: &Address,
        holder: &Address,
        spender: &Address,
    ) -> Result<Amount, LedgerError> {
        let data = abi::encode_call(
            abi::ALLOWANCE,
            &[Token::Address(*holder), Token::Address(*spender)],
        );
        abi::decode_amount(&self.call(asset, data).await?)
    }

    async fn approve(
        &self,
        asset: &Address,
        from: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<TxHash, LedgerError> {
        let data = abi::encode_call(
            abi::APPROVE,
            &[Token::Address(*spender), Token::Uint(amount)],
        );
        self.send_transaction(from, asset, data).await
    }

    async fn symbol(&self, asset: &Address) -> Result<String, LedgerError> {
        abi::decode_string(&self.call(asset, abi::encode_call(abi::SYMBOL, &[])).await?)
    }

    async fn decimals(&self, asset: &Address) -> Result<u8, LedgerError> {
        abi::decode_u8(&self.call(asset, abi::encode_call(abi::DECIMALS, &[])).await?)
    }
}
