//! Chain identity and account lookups.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::assets::{resolve_balance, Amount};
use crate::cache::{CacheFill, DEFAULT_TTL};
use crate::client::ChainClient;
use crate::error::CoreError;
use crate::rpc::CallStyle;
use crate::types::Account;

pub const CHAIN_ID_TTL: Duration = Duration::from_secs(1200);

impl ChainClient {
    /// Chain id of the connected network, read from the node's `get_config`
    /// (the last key ending in `_CHAIN_ID`) and cached for [`CHAIN_ID_TTL`].
    pub async fn chain_id(&self) -> Result<String, CoreError> {
        let fill = CacheFill::deferred(async {
            let config = self.node_config().await?;
            chain_id_from_config(&config).map(serde_json::Value::String)
        });
        let cached = self.metadata.get_or_set("chain_id", fill, CHAIN_ID_TTL).await?;
        cached
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| CoreError::domain(format!("cached chain id is not a string: {cached}")))
    }

    /// Normalize a raw balance field using this chain's asset table.
    pub async fn resolve_balance(&self, raw: &serde_json::Value) -> Result<Amount, CoreError> {
        let chain_id = self.chain_id().await?;
        resolve_balance(raw, &chain_id, &self.known_assets)
    }

    /// Look up accounts by name with one RPC.
    ///
    /// Results are cached for the whole (sorted, deduplicated) name set and
    /// for every account individually.
    pub async fn get_accounts<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<HashMap<String, Account>, CoreError> {
        let mut names: Vec<String> = names.iter().map(|n| n.as_ref().to_owned()).collect();
        names.sort();
        names.dedup();
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let key = accounts_cache_key(&names);
        if let Some(hit) = self.accounts.get(&key).await {
            return Ok(hit);
        }

        let raw_accounts = self.fetch_raw_accounts(&names).await?;
        let chain_id = self.chain_id().await?;
        let fields = self.balance_fields();

        let mut accounts = HashMap::with_capacity(raw_accounts.len());
        for raw in raw_accounts {
            let mut account = Account::from_rpc(raw)?;
            for field in &fields {
                let Some(value) = account.raw.get(*field) else {
                    debug!(account = %account.name, field, "balance field absent");
                    continue;
                };
                let amount = resolve_balance(value, &chain_id, &self.known_assets)?;
                account.balances.insert(amount.symbol().to_owned(), amount);
            }

            let single = HashMap::from([(account.name.clone(), account.clone())]);
            self.accounts
                .set(accounts_cache_key(&[account.name.as_str()]), single, DEFAULT_TTL)
                .await;
            accounts.insert(account.name.clone(), account);
        }

        self.accounts.set(key, accounts.clone(), DEFAULT_TTL).await;
        Ok(accounts)
    }

    /// Resolved balances of one account, keyed by symbol.
    pub async fn get_balances(&self, account: &str) -> Result<BTreeMap<String, Amount>, CoreError> {
        let mut accounts = self.get_accounts(&[account]).await?;
        accounts
            .remove(account)
            .map(|a| a.balances)
            .ok_or_else(|| CoreError::domain(format!("account `{account}` not found")))
    }

    async fn fetch_raw_accounts(&self, names: &[String]) -> Result<Vec<serde_json::Value>, CoreError> {
        let result = match self.rpc.call_style() {
            CallStyle::Appbase => {
                let mut found = self
                    .rpc
                    .api_call("database_api", "find_accounts", json!({ "accounts": names }))
                    .await?;
                found
                    .get_mut("accounts")
                    .map(serde_json::Value::take)
                    .unwrap_or(serde_json::Value::Null)
            }
            CallStyle::Legacy => {
                self.rpc
                    .api_call("database_api", "get_accounts", json!([names]))
                    .await?
            }
        };
        match result {
            serde_json::Value::Array(items) => Ok(items),
            other => Err(CoreError::domain(format!(
                "account lookup returned a non-list result: {other}"
            ))),
        }
    }

    /// Liquid, secondary-currency and vesting balance fields for the
    /// configured network.
    fn balance_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["balance"];
        fields.extend(self.network().secondary_balance_field());
        fields.push("vesting_shares");
        fields
    }
}

pub(crate) fn chain_id_from_config(config: &serde_json::Value) -> Result<String, CoreError> {
    let entries = config
        .as_object()
        .ok_or_else(|| CoreError::domain("node config is not an object"))?;
    entries
        .iter()
        .filter(|(key, _)| key.to_ascii_uppercase().ends_with("_CHAIN_ID"))
        .filter_map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
        .last()
        .map(str::to_owned)
        .ok_or_else(|| CoreError::domain("could not find a chain id in the node config"))
}

fn accounts_cache_key<S: AsRef<str>>(names: &[S]) -> String {
    let joined: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!("accounts:{}", joined.join(","))
}
