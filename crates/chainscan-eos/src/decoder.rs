//! Action decoding backed by the ABI cache.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use chainscan_core::error::ScanError;
use chainscan_core::scanner::ContractDecoder;

use crate::abi::Abi;
use crate::cache::AbiCache;
use crate::chain::{Action, ChainReader};
use crate::codec::Asset;

/// Arguments of a standard token `transfer` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub quantity: Asset,
    pub memo: String,
}

#[derive(Deserialize)]
struct RawTransfer {
    from: String,
    to: String,
    quantity: String,
    #[serde(default)]
    memo: String,
}

/// Decodes actions using contract ABIs, fetching each ABI once.
pub struct ActionDecoder {
    chain: Arc<dyn ChainReader>,
    cache: Arc<dyn AbiCache>,
    key_prefix: String,
}

impl ActionDecoder {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        cache: Arc<dyn AbiCache>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            cache,
            key_prefix: key_prefix.into(),
        }
    }

    /// ABI of `account`, from the cache or the node.
    ///
    /// Concurrent misses for the same account may fetch twice; the last
    /// insert wins and both copies are identical.
    pub async fn get_abi(&self, account: &str) -> Result<Arc<Abi>, ScanError> {
        let key = format!("{}{}", self.key_prefix, account);
        if let Some(abi) = self.cache.get(&key) {
            return Ok(abi);
        }

        let abi = Arc::new(self.chain.get_abi(account).await?);
        tracing::debug!(account, "ABI cached");
        self.cache.insert(key, Arc::clone(&abi));
        Ok(abi)
    }

    /// Decode an action's arguments with its contract's ABI.
    pub async fn decode_action(&self, action: &Action) -> Result<serde_json::Value, ScanError> {
        let abi = self.get_abi(&action.account).await?;
        let data = action.raw_data()?;
        Ok(abi.decode_action(&action.name, &data)?)
    }

    /// Decode a token transfer action.
    pub async fn decode_transfer(&self, action: &Action) -> Result<Transfer, ScanError> {
        let value = self.decode_action(action).await?;
        let raw: RawTransfer = serde_json::from_value(value).map_err(|e| {
            ScanError::Decode(format!(
                "{}::{} is not a token transfer: {e}",
                action.account, action.name
            ))
        })?;
        Ok(Transfer {
            from: raw.from,
            to: raw.to,
            quantity: raw.quantity.parse()?,
            memo: raw.memo,
        })
    }
}

#[async_trait]
impl ContractDecoder for ActionDecoder {
    type Abi = Arc<Abi>;

    async fn abi_info(&self, account: &str) -> Result<Self::Abi, ScanError> {
        self.get_abi(account).await
    }
}
