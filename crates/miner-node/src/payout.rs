//! Payout script resolution.
//!
//! The block reward goes to a fresh address from the node's wallet. The
//! script is resolved once at startup and reused for every coinbase.

use tracing::{info, warn};

use crate::error::ResolutionError;
use crate::rpc::NodeRpc;

/// Length of the random script used when the wallet cannot be reached.
pub const PLACEHOLDER_SCRIPT_LEN: usize = 20;

/// The scriptPubKey that receives the coinbase output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutScript {
    script: Vec<u8>,
    placeholder: bool,
}

impl PayoutScript {
    /// A script obtained from the node.
    pub fn new(script: Vec<u8>) -> Self {
        PayoutScript {
            script,
            placeholder: false,
        }
    }

    /// Random bytes standing in for a real script.
    ///
    /// Blocks mined to a placeholder are valid, but nobody can spend the
    /// reward.
    pub fn placeholder() -> Self {
        let mut script = vec![0u8; PLACEHOLDER_SCRIPT_LEN];
        if let Err(err) = getrandom::getrandom(&mut script) {
            warn!(error = %err, "No OS randomness for placeholder payout script; using zeros");
        }
        PayoutScript {
            script,
            placeholder: true,
        }
    }

    /// Resolve through the node, falling back to a placeholder on any failure.
    pub fn resolve_or_placeholder<R: NodeRpc>(rpc: &R) -> Self {
        match resolve_payout_script(rpc) {
            Ok(script) => {
                info!(script = %hex::encode(script.as_bytes()), "Payout script resolved");
                script
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "Could not resolve payout script; mining to an unspendable placeholder"
                );
                Self::placeholder()
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.script
    }

    /// Whether this is a random placeholder rather than a wallet script.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Ask the node's wallet for a new address and return its scriptPubKey.
pub fn resolve_payout_script<R: NodeRpc>(rpc: &R) -> Result<PayoutScript, ResolutionError> {
    let address = rpc.get_new_address().map_err(ResolutionError::Address)?;
    let info = rpc
        .validate_address(&address)
        .map_err(ResolutionError::Validate)?;

    let script = info
        .script_pub_key
        .filter(|_| info.isvalid)
        .and_then(|script_hex| hex::decode(script_hex).ok())
        .filter(|script| !script.is_empty())
        .ok_or_else(|| ResolutionError::MissingScript(address.clone()))?;

    Ok(PayoutScript::new(script))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::rpc::{AddressInfo, SubmitOutcome};
    use miner_core::BlockTemplate;

    struct WalletNode {
        address: Option<&'static str>,
        info: Option<AddressInfo>,
    }

    impl NodeRpc for WalletNode {
        fn get_new_address(&self) -> Result<String, RpcError> {
            self.address
                .map(str::to_string)
                .ok_or_else(|| RpcError::Transport("connection refused".to_string()))
        }

        fn validate_address(&self, _address: &str) -> Result<AddressInfo, RpcError> {
            self.info.clone().ok_or(RpcError::Node {
                code: -5,
                message: "Invalid address".to_string(),
            })
        }

        fn get_block_template(&self) -> Result<BlockTemplate, RpcError> {
            unreachable!("not used by payout resolution")
        }

        fn submit_block(&self, _block_hex: &str) -> Result<SubmitOutcome, RpcError> {
            unreachable!("not used by payout resolution")
        }
    }

    fn info(script: &str) -> Option<AddressInfo> {
        Some(AddressInfo {
            isvalid: true,
            script_pub_key: Some(script.to_string()),
        })
    }

    #[test]
    fn test_resolves_script_from_wallet() {
        let node = WalletNode {
            address: Some("bcrt1qtest"),
            info: info("0014000102030405060708090a0b0c0d0e0f10111213"),
        };
        let script = resolve_payout_script(&node).unwrap();
        assert!(!script.is_placeholder());
        assert_eq!(script.as_bytes().len(), 22);
        assert_eq!(&script.as_bytes()[..2], &[0x00, 0x14]);
    }

    #[test]
    fn test_address_failure_is_reported() {
        let node = WalletNode {
            address: None,
            info: None,
        };
        assert!(matches!(
            resolve_payout_script(&node),
            Err(ResolutionError::Address(RpcError::Transport(_)))
        ));
    }

    #[test]
    fn test_missing_script_is_reported() {
        let node = WalletNode {
            address: Some("bcrt1qtest"),
            info: Some(AddressInfo {
                isvalid: true,
                script_pub_key: None,
            }),
        };
        assert!(matches!(
            resolve_payout_script(&node),
            Err(ResolutionError::MissingScript(addr)) if addr == "bcrt1qtest"
        ));

        let node = WalletNode {
            address: Some("bcrt1qtest"),
            info: None,
        };
        assert!(matches!(
            resolve_payout_script(&node),
            Err(ResolutionError::Validate(RpcError::Node { code: -5, .. }))
        ));
    }

    #[test]
    fn test_falls_back_to_placeholder() {
        let node = WalletNode {
            address: None,
            info: None,
        };
        let script = PayoutScript::resolve_or_placeholder(&node);
        assert!(script.is_placeholder());
        assert_eq!(script.as_bytes().len(), PLACEHOLDER_SCRIPT_LEN);
    }
}
