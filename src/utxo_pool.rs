use crate::{OutputIndex, Transaction, TransactionId, TransactionOutput};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Identifies an unspent transaction output by the id of the producing
/// transaction and the output's index within it. No two live entries in a
/// pool ever share a key.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct UtxoKey {
    tx_id: TransactionId,
    output_index: OutputIndex,
}

impl UtxoKey {
    pub fn new(tx_id: TransactionId, output_index: OutputIndex) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }

    pub fn tx_id(&self) -> &TransactionId {
        &self.tx_id
    }

    pub fn output_index(&self) -> &OutputIndex {
        &self.output_index
    }
}

impl Display for UtxoKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// A pool of confirmed and unspent transaction outputs, indexed by their
/// transaction id and their index in the transaction.
///
/// Cloning yields a fully independent pool: every key and output is owned, so
/// mutating the clone never affects the source.
#[derive(Debug, Clone, Default)]
pub struct UtxoPool {
    utxos: HashMap<UtxoKey, TransactionOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    pub fn contains(&self, key: &UtxoKey) -> bool {
        self.utxos.contains_key(key)
    }

    pub fn get(&self, key: &UtxoKey) -> Option<&TransactionOutput> {
        self.utxos.get(key)
    }

    pub fn add(&mut self, key: UtxoKey, output: TransactionOutput) {
        self.utxos.insert(key, output);
    }

    pub fn remove(&mut self, key: &UtxoKey) -> Option<TransactionOutput> {
        self.utxos.remove(key)
    }

    /// Adds every output of `transaction` under its fresh `(id, index)` key.
    pub fn add_outputs(&mut self, transaction: &Transaction) {
        for (index, output) in transaction.outputs().iter().enumerate() {
            let key = UtxoKey::new(*transaction.id(), OutputIndex::new(index as u32));
            self.add(key, output.clone());
        }
    }

    /// All unspent outputs in no particular order.
    pub fn all(&self) -> impl Iterator<Item = (&UtxoKey, &TransactionOutput)> {
        self.utxos.iter()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coin, KeyPair, Sha256};

    fn key(tag: &[u8], index: u32) -> UtxoKey {
        UtxoKey::new(
            TransactionId::new(Sha256::digest(tag)),
            OutputIndex::new(index),
        )
    }

    fn output(value: i64) -> TransactionOutput {
        TransactionOutput::new(Coin::new(value), KeyPair::generate().public_key().clone())
    }

    #[test]
    fn add_get_remove() {
        let mut pool = UtxoPool::new();
        let key = key(b"tx", 0);
        let output = output(10);

        assert!(!pool.contains(&key));
        pool.add(key, output.clone());
        assert!(pool.contains(&key));
        assert_eq!(pool.get(&key), Some(&output));
        assert_eq!(pool.remove(&key), Some(output));
        assert!(!pool.contains(&key));
        assert!(pool.is_empty());
    }

    #[test]
    fn clone_is_independent() {
        let mut pool = UtxoPool::new();
        pool.add(key(b"tx", 0), output(10));

        let mut copy = pool.clone();
        copy.remove(&key(b"tx", 0));
        copy.add(key(b"other", 1), output(20));

        assert!(pool.contains(&key(b"tx", 0)));
        assert!(!pool.contains(&key(b"other", 1)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn add_outputs_uses_fresh_keys() {
        let recipient = KeyPair::generate();
        let transaction = Transaction::new(
            vec![],
            vec![
                TransactionOutput::new(Coin::new(10), recipient.public_key().clone()),
                TransactionOutput::new(Coin::new(15), recipient.public_key().clone()),
            ],
        );
        let mut pool = UtxoPool::new();
        pool.add_outputs(&transaction);

        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&UtxoKey::new(*transaction.id(), OutputIndex::new(0))));
        assert!(pool.contains(&UtxoKey::new(*transaction.id(), OutputIndex::new(1))));
    }
}
