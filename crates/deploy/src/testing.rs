//! In-memory chain used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_core::primitives::{Address, B256, Bytes, Selector, U64};
use anyhow::Result;

use crate::chain::{CallRequest, ChainClient, TransactionReceipt, TransactionRequest};

#[derive(Debug, Default)]
struct State {
    sent: Vec<TransactionRequest>,
    code: HashMap<Address, Bytes>,
    pending: HashMap<B256, TransactionReceipt>,
    responses: HashMap<Selector, Result<Bytes, String>>,
    mined: usize,
}

/// Chain double recording submissions and answering calls from canned responses.
#[derive(Debug)]
pub struct MockChain {
    chain_id: u64,
    accounts: Vec<Address>,
    /// When false, receipts never appear.
    confirms: bool,
    /// When true, creation receipts report a revert.
    reverts: bool,
    state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            chain_id: 31337,
            accounts: (1..=10u8).map(Address::with_last_byte).collect(),
            confirms: true,
            reverts: false,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn never_confirming(mut self) -> Self {
        self.confirms = false;
        self
    }

    pub fn reverting(mut self) -> Self {
        self.reverts = true;
        self
    }

    pub fn respond(&self, selector: Selector, response: Result<Bytes, String>) {
        self.state.lock().unwrap().responses.insert(selector, response);
    }

    pub fn accounts_list(&self) -> Vec<Address> {
        self.accounts.clone()
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn mined(&self) -> usize {
        self.state.lock().unwrap().mined
    }

    /// Forget all deployed code, as a restarted dev node would.
    pub fn wipe_code(&self) {
        self.state.lock().unwrap().code.clear();
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(tx.clone());
        let nonce = state.sent.len() as u8;
        let hash = B256::with_last_byte(nonce);
        let address = Address::with_last_byte(0xa0 + nonce);

        if !self.reverts {
            state.code.insert(address, Bytes::from_static(&[0x60, 0x80]));
        }
        if self.confirms {
            state.pending.insert(
                hash,
                TransactionReceipt {
                    transaction_hash: hash,
                    block_number: Some(U64::from(nonce)),
                    contract_address: (!self.reverts).then_some(address),
                    status: Some(if self.reverts { U64::ZERO } else { U64::from(1) }),
                    gas_used: Some(U64::from(21_000)),
                },
            );
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        Ok(self.state.lock().unwrap().pending.get(&hash).cloned())
    }

    async fn call(&self, call: CallRequest) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        if !state.code.contains_key(&call.to) {
            return Ok(Bytes::new());
        }
        let selector = Selector::from_slice(&call.data[..4]);
        match state.responses.get(&selector) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(msg)) => anyhow::bail!("{}", msg),
            None => anyhow::bail!("execution reverted"),
        }
    }

    async fn mine(&self) -> Result<()> {
        self.state.lock().unwrap().mined += 1;
        Ok(())
    }
}
