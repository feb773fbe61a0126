//! Transaction building and sending
//!
//! [`TransactionBuilder`] assembles a standard transaction end to end:
//! pick spendable inputs from the sender's unspent history, compute the
//! fee and change, attach to the current tips, sign with an unlocked
//! key handle and broadcast. Input selection walks the unspent pages in
//! order and skips anything unsafe to spend: unknown or refused
//! transactions, already-spent outputs, and outputs another in-flight
//! transaction is claiming.

use chrono::Utc;
use thiserror::Error;

use crate::client::{ClientError, DagClient};
use crate::core::{
    AddressTxKind, OutputError, Transaction, TxError, TxJson, TxOutput, FEE_DIVISOR,
};
use crate::crypto::{Address, KeyError, KeyHandle, TxId};

/// Unspent history page size used during input selection
const PER_PAGE: usize = 100;

/// Errors produced while building or sending a transaction
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No outputs given")]
    NoOutputs,
    #[error("Sender address does not match the signing key")]
    KeyMismatch,
    #[error("No spendable input found")]
    NoInputFound,
    #[error("Insufficient funds: {available} available, {required} required")]
    InsufficientFunds { available: u128, required: u128 },
    #[error("No provider could answer: {0}")]
    RemoteUnavailable(ClientError),
    #[error("No provider accepted the transaction")]
    BroadcastFailed,
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Assembles, signs and broadcasts one standard transaction
pub struct TransactionBuilder<'a> {
    client: &'a DagClient,
    sender: Option<Address>,
    outputs: Vec<TxOutput>,
    inputs: Option<Vec<TxId>>,
    parents: Option<Vec<TxId>>,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(client: &'a DagClient) -> Self {
        Self {
            client,
            sender: None,
            outputs: Vec::new(),
            inputs: None,
            parents: None,
        }
    }

    /// Set the sender address explicitly. Defaults to the signing
    /// handle's address; setting a different one makes `send` fail
    /// with [`BuildError::KeyMismatch`].
    pub fn sender(mut self, address: Address) -> Self {
        self.sender = Some(address);
        self
    }

    /// Credit `amount` base units to `recipient`. A second call for the
    /// same recipient replaces the earlier amount.
    pub fn output(mut self, recipient: Address, amount: u64) -> Result<Self, BuildError> {
        let output = TxOutput::new(recipient, amount)?;
        if let Some(existing) = self
            .outputs
            .iter_mut()
            .find(|o| o.address() == output.address())
        {
            *existing = output;
        } else {
            self.outputs.push(output);
        }
        Ok(self)
    }

    /// Spend exactly these inputs instead of selecting from the
    /// unspent history. They still go through the usual safety checks.
    pub fn inputs(mut self, inputs: Vec<TxId>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    /// Attach to these parents instead of the current tips
    pub fn parents(mut self, parents: Vec<TxId>) -> Self {
        self.parents = Some(parents);
        self
    }

    /// Build, sign and broadcast the transaction.
    ///
    /// The fee is `outputs_value / 200`, paid implicitly by spending
    /// more input value than the outputs credit. Change above zero goes
    /// back to the sender as a final output.
    pub async fn send(self, key: &KeyHandle) -> Result<Transaction, BuildError> {
        if self.outputs.is_empty() {
            return Err(BuildError::NoOutputs);
        }
        let sender = match &self.sender {
            Some(address) if *address != key.address() => return Err(BuildError::KeyMismatch),
            Some(address) => address.clone(),
            None => key.address(),
        };

        let outputs_value: u128 = self.outputs.iter().map(|o| o.amount() as u128).sum();
        let fee = outputs_value / FEE_DIVISOR as u128;
        let required = outputs_value + fee;

        let (selected, available) = match &self.inputs {
            // Explicit inputs are spent in full, not trimmed to the
            // required value
            Some(inputs) => self.filter_spendable(&sender, inputs, u128::MAX).await?,
            None => self.select_inputs(&sender, required).await?,
        };
        if selected.is_empty() {
            return Err(BuildError::NoInputFound);
        }
        if available < required {
            return Err(BuildError::InsufficientFunds {
                available,
                required,
            });
        }

        let mut outputs = self.outputs;
        let change = available - outputs_value - fee;
        if change > 0 {
            outputs.push(TxOutput::new(sender.clone(), change as u64)?);
        }

        let parents = match self.parents {
            Some(parents) => parents,
            None => self
                .client
                .get_tips()
                .await
                .map_err(BuildError::RemoteUnavailable)?,
        };

        let mut json = TxJson {
            parents: parents.iter().map(|p| p.to_string()).collect(),
            inputs: Some(selected.iter().map(|i| i.to_string()).collect()),
            outputs: outputs.iter().map(|o| o.to_wire_string()).collect(),
            date: Utc::now().timestamp_millis(),
            pub_key: Some(hex::encode(key.public_key().serialize())),
            sig: None,
            parent_beacon: None,
            nonce: None,
            genesis: None,
        };

        let id = json.id()?;
        let signature = key.sign(&id.to_hash())?;
        json.sig = Some(hex::encode(signature));

        self.client
            .broadcast_transaction(&json)
            .await
            .map_err(|_| BuildError::BroadcastFailed)?;

        Ok(Transaction::from_wire(&json, Some(&id))?)
    }

    /// Walk the sender's unspent pages in order, keeping spendable
    /// outputs until their value covers `required` or the history ends
    async fn select_inputs(
        &self,
        sender: &Address,
        required: u128,
    ) -> Result<(Vec<TxId>, u128), BuildError> {
        let mut selected = Vec::new();
        let mut available: u128 = 0;
        let mut page = 1;

        loop {
            let ids = match self
                .client
                .get_address_txs(std::slice::from_ref(sender), AddressTxKind::Unspent, PER_PAGE, page)
                .await
            {
                Ok(mut pages) => pages
                    .remove(sender)
                    .map(|p| p.txs)
                    .unwrap_or_default(),
                // An exhausted history and an unreachable network both
                // surface as NotFound; only the former ends paging
                Err(ClientError::NotFound) => {
                    if self.client.watcher().ready_count().await == 0 {
                        return Err(BuildError::RemoteUnavailable(ClientError::NotFound));
                    }
                    Vec::new()
                }
                Err(e) => return Err(BuildError::RemoteUnavailable(e)),
            };
            if ids.is_empty() {
                break;
            }
            let short_page = ids.len() < PER_PAGE;

            let wanted = required.saturating_sub(available);
            let (mut chosen, value) = self.filter_spendable(sender, &ids, wanted).await?;
            available += value;
            selected.append(&mut chosen);

            if available >= required || short_page {
                break;
            }
            page += 1;
        }

        Ok((selected, available))
    }

    /// Keep the candidates safe to spend, in their given order, until
    /// their value reaches `wanted`. Returns the kept ids and their
    /// total value for the sender.
    async fn filter_spendable(
        &self,
        sender: &Address,
        candidates: &[TxId],
        wanted: u128,
    ) -> Result<(Vec<TxId>, u128), BuildError> {
        if candidates.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let states = self
            .client
            .get_txs_state(candidates)
            .await
            .map_err(BuildError::RemoteUnavailable)?;

        let mut kept = Vec::new();
        let mut value: u128 = 0;
        for id in candidates {
            if value >= wanted {
                break;
            }
            let Some(state) = states.get(id) else {
                continue;
            };
            if !state.is_known() || state.status().is_refused() {
                continue;
            }
            let Some(output) = state.output(sender) else {
                continue;
            };
            if output.is_spent() || output.has_pending_claimer() {
                log::debug!("Skipping contested input {}", id);
                continue;
            }
            value += output.amount() as u128;
            kept.push(id.clone());
        }
        Ok((kept, value))
    }
}
