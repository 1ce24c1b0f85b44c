use crate::{Block, Transaction, TransactionId};
use std::collections::HashMap;

/// Transactions submitted by clients but not yet included in any block on the
/// canonical branch. Membership is keyed by transaction id, so resubmitting a
/// transaction is a no-op. Iteration preserves submission order because block
/// creation resolves conflicting transactions in favor of the first one seen.
#[derive(Default)]
pub struct TransactionPool {
    transactions: HashMap<TransactionId, Transaction>,
    // Submission order of the ids still present in `transactions`.
    order: Vec<TransactionId>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            transactions: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.transactions.contains_key(id)
    }

    /// Ensures that the transaction exists in the pool. The first submission
    /// wins; a transaction with an id already present is dropped.
    pub fn insert(&mut self, transaction: Transaction) {
        let id = *transaction.id();
        if self.transactions.insert(id, transaction).is_none() {
            self.order.push(id);
        }
    }

    /// All pending transactions in submission order.
    pub fn all(&self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|id| self.transactions.get(id).cloned())
            .collect()
    }

    /// Drops every transaction that `block` included. Transactions the pool
    /// never saw are skipped, e.g. because they were submitted to a peer.
    pub fn remove_included(&mut self, block: &Block) {
        let mut removed_any = false;
        for transaction in block.all_transactions() {
            removed_any |= self.transactions.remove(transaction.id()).is_some();
        }
        if removed_any {
            let transactions = &self.transactions;
            self.order.retain(|id| transactions.contains_key(id));
        }
    }
}
