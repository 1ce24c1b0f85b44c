use crate::{verify_signature, Coin, Transaction, UtxoKey, UtxoPool};
use log::debug;
use std::collections::HashSet;

/// Validates transactions against a private copy of an unspent-output pool
/// and settles the ones it accepts, so that later candidates in the same
/// batch see the effect of earlier ones.
pub struct TxHandler {
    utxo_pool: UtxoPool,
}

impl TxHandler {
    /// Creates a handler whose pool is a copy of `utxo_pool`. The caller's
    /// pool is never aliased or mutated.
    pub fn new(utxo_pool: &UtxoPool) -> Self {
        Self {
            utxo_pool: utxo_pool.clone(),
        }
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.utxo_pool
    }

    /// Consumes the handler and returns the settled pool.
    pub fn into_utxo_pool(self) -> UtxoPool {
        self.utxo_pool
    }

    /// Returns true iff all of the following hold:
    ///   (1) every output claimed by `transaction` is in the current pool,
    ///   (2) every input carries a valid signature over the transaction's
    ///       signable payload under the referenced output's public key,
    ///   (3) no unspent output is claimed more than once by `transaction`,
    ///   (4) all output values are non-negative, and
    ///   (5) the sum of claimed input values is at least the sum of output
    ///       values.
    pub fn is_valid(&self, transaction: &Transaction) -> bool {
        let mut total_output = Coin::zero();
        for output in transaction.outputs() {
            if output.value().is_negative() {
                debug!("transaction {} has a negative output", transaction);
                return false;
            }
            total_output = match total_output.checked_add(output.value()) {
                Some(total) => total,
                None => {
                    debug!("transaction {} overflows the output total", transaction);
                    return false;
                }
            };
        }

        let message = transaction.signable_payload();
        let mut total_input = Coin::zero();
        let mut claimed_keys = HashSet::new();
        for input in transaction.inputs() {
            let key = UtxoKey::new(*input.prev_tx_id(), *input.output_index());
            let claimed_output = match self.utxo_pool.get(&key) {
                Some(output) => output,
                None => {
                    debug!("transaction {} claims unknown output {}", transaction, key);
                    return false;
                }
            };
            if !claimed_keys.insert(key) {
                debug!("transaction {} claims {} more than once", transaction, key);
                return false;
            }
            let signature = match input.signature() {
                Some(signature) => signature,
                None => {
                    debug!("transaction {} has an unsigned input {}", transaction, key);
                    return false;
                }
            };
            if !verify_signature(claimed_output.recipient(), &message, signature) {
                debug!("transaction {} has a bad signature on {}", transaction, key);
                return false;
            }
            total_input = match total_input.checked_add(claimed_output.value()) {
                Some(total) => total,
                None => {
                    debug!("transaction {} overflows the input total", transaction);
                    return false;
                }
            };
        }

        if total_input < total_output {
            debug!("transaction {} spends more than it claims", transaction);
            return false;
        }
        true
    }

    /// Validates `transaction` and, if it is valid, settles it into the
    /// internal pool: claimed outputs are removed and the transaction's own
    /// outputs are added under their fresh keys.
    pub fn accept(&mut self, transaction: &Transaction) -> bool {
        if !self.is_valid(transaction) {
            return false;
        }
        for input in transaction.inputs() {
            let key = UtxoKey::new(*input.prev_tx_id(), *input.output_index());
            self.utxo_pool.remove(&key);
        }
        self.utxo_pool.add_outputs(transaction);
        true
    }

    /// Processes the candidates in submission order and returns the accepted
    /// subsequence, preserving relative order. Once a candidate is accepted
    /// its effects are visible to every later candidate, so two transactions
    /// claiming the same output resolve in favor of the first one seen.
    pub fn handle_txs(&mut self, candidates: &[Transaction]) -> Vec<Transaction> {
        let mut accepted = Vec::new();
        for transaction in candidates {
            if self.accept(transaction) {
                accepted.push(transaction.clone());
            }
        }
        accepted
    }

    /// Like `handle_txs`, but greedily favors candidates with a higher fee
    /// (claimed input sum minus output sum) instead of submission order.
    /// This is a greedy approximation of the fee-maximizing subset; the exact
    /// combinatorial optimum is out of scope for realistic pool sizes.
    /// The returned transactions keep their relative submission order.
    pub fn handle_txs_max_fee(&mut self, candidates: &[Transaction]) -> Vec<Transaction> {
        let mut by_fee: Vec<&Transaction> = candidates.iter().collect();
        by_fee.sort_by(|a, b| self.fee_of(b).cmp(&self.fee_of(a)));

        let mut accepted_ids = HashSet::new();
        for transaction in by_fee {
            if self.accept(transaction) {
                accepted_ids.insert(*transaction.id());
            }
        }
        candidates
            .iter()
            .filter(|transaction| accepted_ids.contains(transaction.id()))
            .cloned()
            .collect()
    }

    /// The fee `transaction` would pay against the current pool. Claimed
    /// outputs missing from the pool contribute nothing, and a transaction
    /// whose totals overflow counts as paying no fee; `accept` rejects it
    /// regardless of where it sorts.
    fn fee_of(&self, transaction: &Transaction) -> Coin {
        let mut total_input = Coin::zero();
        for input in transaction.inputs() {
            let key = UtxoKey::new(*input.prev_tx_id(), *input.output_index());
            if let Some(output) = self.utxo_pool.get(&key) {
                total_input = match total_input.checked_add(output.value()) {
                    Some(total) => total,
                    None => return Coin::zero(),
                };
            }
        }
        let mut total_output = Coin::zero();
        for output in transaction.outputs() {
            total_output = match total_output.checked_add(output.value()) {
                Some(total) => total,
                None => return Coin::zero(),
            };
        }
        total_input.checked_sub(total_output).unwrap_or_else(Coin::zero)
    }
}
