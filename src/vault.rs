//! Typed call builders for the AgentVault admin surface
//!
//! Each action maps to one contract function and produces the ABI-encoded
//! calldata the transaction pipeline submits. Read-side vault state lives
//! behind the markets API and is not modeled here.

use crate::tx::CallRequest;

use ethers::abi::{encode, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::id;
use serde::Deserialize;

/// Administrative actions the operator can perform on the vault
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VaultAction {
    Pause,
    DisableStrategy {
        #[serde(rename = "strategyId")]
        strategy_id: u64,
    },
    DisableAllActiveStrategies,
    AddStrategy {
        content: String,
        priority: u8,
    },
    UpdateSettings {
        #[serde(rename = "maxTradeAmount")]
        max_trade_amount: u64,
        #[serde(rename = "slippageBps")]
        slippage_bps: u64,
    },
    Withdraw {
        #[serde(rename = "amountWei")]
        amount_wei: U256,
    },
}

impl VaultAction {
    /// Encode into a submission-ready contract call
    pub fn into_call(self) -> CallRequest {
        match self {
            VaultAction::Pause => CallRequest {
                function: "pauseVault",
                calldata: encode_call("pauseVault()", &[]),
            },
            VaultAction::DisableStrategy { strategy_id } => CallRequest {
                function: "disableStrategy",
                calldata: encode_call(
                    "disableStrategy(uint256)",
                    &[Token::Uint(strategy_id.into())],
                ),
            },
            VaultAction::DisableAllActiveStrategies => CallRequest {
                function: "disableAllActiveStrategies",
                calldata: encode_call("disableAllActiveStrategies()", &[]),
            },
            VaultAction::AddStrategy { content, priority } => CallRequest {
                function: "addStrategy",
                calldata: encode_call(
                    "addStrategy(string,uint8)",
                    &[Token::String(content), Token::Uint(priority.into())],
                ),
            },
            VaultAction::UpdateSettings {
                max_trade_amount,
                slippage_bps,
            } => CallRequest {
                function: "updateSettings",
                calldata: encode_call(
                    "updateSettings(uint256,uint256)",
                    &[
                        Token::Uint(max_trade_amount.into()),
                        Token::Uint(slippage_bps.into()),
                    ],
                ),
            },
            VaultAction::Withdraw { amount_wei } => CallRequest {
                function: "withdraw",
                calldata: encode_call("withdraw(uint256)", &[Token::Uint(amount_wei)]),
            },
        }
    }
}

/// Function selector followed by the encoded arguments
fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}
