//! JSON-RPC implementation of the call interface.

use super::abi::{self, Token};
use super::{CallError, CallInterface, ReadField, ReadValue, WriteCall};
use crate::domain::{Address, BaseUnits, OperationId, Receipt, RewardData, StakeRecord, TimeSecs};
use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;

/// Ledger reached through an Ethereum-style JSON-RPC node that signs for the session account.
#[derive(Debug)]
pub struct JsonRpcLedger {
    client: Client,
    url: String,
    ledger: Address,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// `ledger` is the staking service address all ledger reads and writes are sent to.
    pub fn new(url: String, ledger: Address) -> Self {
        Self {
            client: Client::new(),
            url,
            ledger,
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CallError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::RemoteUnavailable(format!(
                "HTTP error {}",
                status.as_u16()
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| CallError::Decode(e.to_string()))?;
        parse_rpc_response(body)
    }

    async fn eth_call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, CallError> {
        let result = self
            .rpc(
                "eth_call",
                json!([{ "to": to.as_str(), "data": abi::to_hex(&data) }, "latest"]),
            )
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| CallError::Decode("eth_call result is not a string".to_string()))?;
        abi::from_hex(hex).map_err(|e| CallError::Decode(e.to_string()))
    }

    async fn call_words(
        &self,
        to: &Address,
        signature: &str,
        args: &[Token],
        count: usize,
    ) -> Result<Vec<BigUint>, CallError> {
        let data = abi::encode_call(signature, args).map_err(|e| CallError::Decode(e.to_string()))?;
        let ret = self.eth_call(to, data).await?;
        abi::decode_uints(&ret, count).map_err(|e| CallError::Decode(e.to_string()))
    }

    async fn call_uint(
        &self,
        to: &Address,
        signature: &str,
        args: &[Token],
    ) -> Result<ReadValue, CallError> {
        let mut words = self.call_words(to, signature, args, 1).await?;
        Ok(ReadValue::Uint(BaseUnits::new(words.remove(0))))
    }

    async fn receipt(&self, id: &OperationId) -> Result<ReadValue, CallError> {
        let result = self
            .rpc("eth_getTransactionReceipt", json!([id.as_str()]))
            .await?;
        parse_receipt(id, &result).map(ReadValue::Receipt)
    }
}

#[async_trait]
impl CallInterface for JsonRpcLedger {
    async fn read(&self, field: &ReadField) -> Result<ReadValue, CallError> {
        debug!("Reading {} from {}", field.name(), self.url);

        let ledger = &self.ledger;
        match field {
            ReadField::RewardData { asset } => {
                let w = self
                    .call_words(
                        ledger,
                        "rewardData(address)",
                        &[Token::Address(asset.clone())],
                        4,
                    )
                    .await?;
                Ok(ReadValue::RewardData(RewardData {
                    rate_per_second: BaseUnits::new(w[0].clone()),
                    last_update_time: word_to_time(&w[1])?,
                    accumulated_per_unit: BaseUnits::new(w[2].clone()),
                    period_end: word_to_time(&w[3])?,
                }))
            }
            ReadField::TotalEffectiveStaked { asset } => {
                self.call_uint(
                    ledger,
                    "totalEffectiveStaked(address)",
                    &[Token::Address(asset.clone())],
                )
                .await
            }
            ReadField::TotalActualStaked { asset } => {
                self.call_uint(
                    ledger,
                    "totalActualStaked(address)",
                    &[Token::Address(asset.clone())],
                )
                .await
            }
            ReadField::Earned { asset, account } => {
                self.call_uint(
                    ledger,
                    "earned(address,address)",
                    &[Token::Address(asset.clone()), Token::Address(account.clone())],
                )
                .await
            }
            ReadField::Stakes { asset, account } => {
                let w = self
                    .call_words(
                        ledger,
                        "stakes(address,address)",
                        &[Token::Address(asset.clone()), Token::Address(account.clone())],
                        4,
                    )
                    .await?;
                Ok(ReadValue::Stake(StakeRecord {
                    actual_amount: BaseUnits::new(w[0].clone()),
                    effective_amount: BaseUnits::new(w[1].clone()),
                    stake_timestamp: word_to_time(&w[2])?,
                    multiplier: BaseUnits::new(w[3].clone()),
                }))
            }
            ReadField::MinStakingPeriod => self.call_uint(ledger, "minStakingPeriod()", &[]).await,
            ReadField::EarlyWithdrawalPeriod => {
                self.call_uint(ledger, "earlyWithdrawalPeriod()", &[]).await
            }
            ReadField::EarlyWithdrawalPenalty => {
                self.call_uint(ledger, "earlyWithdrawalPenalty()", &[]).await
            }
            ReadField::TotalRewardsAccumulated { asset } => {
                self.call_uint(
                    ledger,
                    "totalRewardsAccumulated(address)",
                    &[Token::Address(asset.clone())],
                )
                .await
            }
            ReadField::Allowance {
                token,
                owner,
                spender,
            } => {
                self.call_uint(
                    token,
                    "allowance(address,address)",
                    &[Token::Address(owner.clone()), Token::Address(spender.clone())],
                )
                .await
            }
            ReadField::BalanceOf { token, account } => {
                self.call_uint(
                    token,
                    "balanceOf(address)",
                    &[Token::Address(account.clone())],
                )
                .await
            }
            ReadField::Receipt { id } => self.receipt(id).await,
        }
    }

    async fn submit(&self, from: &Address, write: &WriteCall) -> Result<OperationId, CallError> {
        let (to, data) = encode_write(&self.ledger, write)?;
        let tx = json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "data": abi::to_hex(&data),
            "value": "0x0",
        });

        let result = self.rpc("eth_sendTransaction", json!([tx])).await?;
        let hash = result.as_str().ok_or_else(|| {
            CallError::Decode("eth_sendTransaction result is not a string".to_string())
        })?;
        Ok(OperationId::new(hash))
    }
}

/// Target address and calldata for a write.
pub fn encode_write(ledger: &Address, write: &WriteCall) -> Result<(Address, Vec<u8>), CallError> {
    let (to, signature, args) = match write {
        WriteCall::Approve {
            token,
            spender,
            amount,
        } => (
            token.clone(),
            "approve(address,uint256)",
            vec![
                Token::Address(spender.clone()),
                Token::Uint(amount.as_biguint().clone()),
            ],
        ),
        WriteCall::Stake { asset, amount } => (
            ledger.clone(),
            "stake(address,uint256)",
            vec![
                Token::Address(asset.clone()),
                Token::Uint(amount.as_biguint().clone()),
            ],
        ),
        WriteCall::Withdraw { asset, amount } => (
            ledger.clone(),
            "withdraw(address,uint256)",
            vec![
                Token::Address(asset.clone()),
                Token::Uint(amount.as_biguint().clone()),
            ],
        ),
        WriteCall::ClaimReward { asset } => (
            ledger.clone(),
            "claimReward(address)",
            vec![Token::Address(asset.clone())],
        ),
        WriteCall::UpdateUserMultiplier { asset } => (
            ledger.clone(),
            "updateUserMultiplier(address)",
            vec![Token::Address(asset.clone())],
        ),
        WriteCall::WithdrawAll { asset } => (
            ledger.clone(),
            "withdrawAll(address)",
            vec![Token::Address(asset.clone())],
        ),
    };

    let data = abi::encode_call(signature, &args).map_err(|e| CallError::Decode(e.to_string()))?;
    Ok((to, data))
}

fn parse_rpc_response(body: Value) -> Result<Value, CallError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        if code == USER_REJECTED_CODE {
            return Err(CallError::UserRejected(message));
        }
        return Err(CallError::RemoteUnavailable(format!(
            "rpc error {}: {}",
            code, message
        )));
    }

    body.get("result")
        .cloned()
        .ok_or_else(|| CallError::Decode("response has neither result nor error".to_string()))
}

fn parse_receipt(id: &OperationId, result: &Value) -> Result<Option<Receipt>, CallError> {
    if result.is_null() {
        return Ok(None);
    }

    let status = result
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| CallError::Decode("receipt without status".to_string()))?;
    let block_number = result
        .get("blockNumber")
        .and_then(|b| b.as_str())
        .and_then(|b| u64::from_str_radix(b.trim_start_matches("0x"), 16).ok());

    Ok(Some(Receipt {
        operation_id: id.clone(),
        success: status == "0x1",
        block_number,
    }))
}

fn word_to_time(word: &BigUint) -> Result<TimeSecs, CallError> {
    word.to_i64()
        .map(TimeSecs::new)
        .ok_or_else(|| CallError::Decode(format!("timestamp {} out of range", word)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_rpc_user_rejected() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 4001, "message": "User denied"}});
        assert_eq!(
            parse_rpc_response(body),
            Err(CallError::UserRejected("User denied".to_string()))
        );
    }

    #[test]
    fn test_parse_rpc_other_error_is_unavailable() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "header not found"}});
        assert_eq!(
            parse_rpc_response(body),
            Err(CallError::RemoteUnavailable(
                "rpc error -32000: header not found".to_string()
            ))
        );
    }

    #[test]
    fn test_parse_rpc_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0x01"});
        assert_eq!(parse_rpc_response(body), Ok(json!("0x01")));

        let body = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(parse_rpc_response(body), Err(CallError::Decode(_))));
    }

    #[test]
    fn test_parse_receipt_states() {
        let id = OperationId::new("0xabc");
        assert_eq!(parse_receipt(&id, &Value::Null), Ok(None));

        let ok = parse_receipt(&id, &json!({"status": "0x1", "blockNumber": "0x10"}))
            .unwrap()
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.block_number, Some(16));

        let failed = parse_receipt(&id, &json!({"status": "0x0"})).unwrap().unwrap();
        assert!(!failed.success);
        assert_eq!(failed.block_number, None);
    }

    #[test]
    fn test_encode_write_routes_approve_to_token() {
        let ledger = addr("0x22fa4f932595114e2115d85320b6d9152447e226");
        let token = addr("0x38b54f147303887bd2e932373432ffcbd11ff6a5");

        let (to, data) = encode_write(
            &ledger,
            &WriteCall::Approve {
                token: token.clone(),
                spender: ledger.clone(),
                amount: BaseUnits::from(1u64),
            },
        )
        .unwrap();
        assert_eq!(to, token);
        assert_eq!(&data[..4], &abi::selector("approve(address,uint256)"));

        let (to, data) =
            encode_write(&ledger, &WriteCall::WithdrawAll { asset: token }).unwrap();
        assert_eq!(to, ledger);
        assert_eq!(&data[..4], &abi::selector("withdrawAll(address)"));
        assert_eq!(data.len(), 36);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_remote_unavailable() {
        let ledger = JsonRpcLedger::new(
            "http://127.0.0.1:1".to_string(),
            addr("0x22fa4f932595114e2115d85320b6d9152447e226"),
        );
        let result = ledger.read(&ReadField::MinStakingPeriod).await;
        assert!(matches!(result, Err(CallError::RemoteUnavailable(_))));
    }
}
