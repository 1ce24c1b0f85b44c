use crate::{Block, BlockBuilder, BlockTree, PublicKey, Transaction, TxHandler};
use std::sync::{Mutex, MutexGuard};

/// The entry points the propagation and consensus layers call: submit a
/// transaction, submit a block, or mine a new block on top of the canonical
/// tip.
///
/// The block tree and pending pool are shared mutable state, so every
/// operation runs under one mutex and appears atomic to concurrent callers.
/// In particular `create_block` holds the lock across its read-validate-attach
/// sequence, so the tip cannot move between reading the snapshot and attaching
/// the new block; `add_block` still re-validates the parent and cutoff against
/// current state, which keeps externally built stale blocks safe to reject.
pub struct BlockHandler {
    block_tree: Mutex<BlockTree>,
}

impl BlockHandler {
    /// Assumes `block_tree` already holds the genesis block.
    pub fn new(block_tree: BlockTree) -> Self {
        Self {
            block_tree: Mutex::new(block_tree),
        }
    }

    /// Adds the transaction to the pending pool. Always succeeds; resubmitting
    /// a known transaction is a no-op.
    pub fn process_tx(&self, transaction: Transaction) {
        self.block_tree().add_transaction(transaction);
    }

    /// Adds a newly received block to the block tree if it is valid.
    pub fn process_block(&self, block: Block) -> bool {
        self.block_tree().add_block(block)
    }

    /// Creates a new block over the canonical tip: runs the pending
    /// transactions through a validator seeded from the tip's snapshot,
    /// assembles the accepted ones into a block with a coinbase paying
    /// `miner`, and attaches it. Returns the block if it was accepted.
    pub fn create_block(&self, miner: &PublicKey) -> Option<Block> {
        self.create_block_with(miner, |handler, candidates| handler.handle_txs(candidates))
    }

    /// Like `create_block`, but selects pending transactions greedily by fee
    /// instead of submission order.
    pub fn create_block_max_fee(&self, miner: &PublicKey) -> Option<Block> {
        self.create_block_with(miner, |handler, candidates| {
            handler.handle_txs_max_fee(candidates)
        })
    }

    fn create_block_with(
        &self,
        miner: &PublicKey,
        select: impl FnOnce(&mut TxHandler, &[Transaction]) -> Vec<Transaction>,
    ) -> Option<Block> {
        let mut block_tree = self.block_tree();
        let parent_hash = *block_tree.max_height_block().id();
        let mut handler = TxHandler::new(block_tree.max_height_utxo_pool());
        let candidates = block_tree.transaction_pool().all();
        let accepted = select(&mut handler, &candidates);

        let mut builder = BlockBuilder::new(Some(parent_hash), miner.clone());
        for transaction in accepted {
            builder.add_transaction(transaction);
        }
        let block = builder.finalize();
        if block_tree.add_block(block.clone()) {
            Some(block)
        } else {
            None
        }
    }

    fn block_tree(&self) -> MutexGuard<BlockTree> {
        self.block_tree.lock().expect("block tree mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BlockBuilder, Coin, KeyPair, OutputIndex, TransactionInput, TransactionOutput, UtxoKey,
    };

    fn new_handler() -> (KeyPair, BlockHandler) {
        let miner = KeyPair::generate();
        let genesis = BlockBuilder::new(None, miner.public_key().clone()).finalize();
        (miner, BlockHandler::new(BlockTree::new(genesis)))
    }

    fn spend(
        coinbase: &Transaction,
        owner: &KeyPair,
        amounts: &[(i64, &KeyPair)],
    ) -> Transaction {
        let outputs = amounts
            .iter()
            .map(|(value, recipient)| {
                TransactionOutput::new(Coin::new(*value), recipient.public_key().clone())
            })
            .collect();
        let mut transaction = Transaction::new(
            vec![TransactionInput::new(*coinbase.id(), OutputIndex::new(0))],
            outputs,
        );
        transaction.sign_input(0, owner).unwrap();
        transaction
    }

    #[test]
    fn empty_pool_yields_a_coinbase_only_block() {
        let (miner, handler) = new_handler();
        let block = handler.create_block(miner.public_key()).unwrap();

        assert!(block.transactions().is_empty());
        assert_eq!(block.coinbase().outputs()[0].recipient(), miner.public_key());

        let block_tree = handler.block_tree();
        assert_eq!(block_tree.tip(), block.id());
        assert_eq!(block_tree.height(block.id()), Some(2));
    }

    #[test]
    fn pending_transaction_flows_into_the_next_block() {
        let (alice, handler) = new_handler();
        let bob = KeyPair::generate();
        let carol = KeyPair::generate();
        let genesis_coinbase = handler.block_tree().max_height_block().coinbase().clone();

        // Spend the 25-coin genesis coinbase into two 10-coin outputs,
        // paying a fee of 5.
        let transaction = spend(&genesis_coinbase, &alice, &[(10, &bob), (10, &carol)]);
        handler.process_tx(transaction.clone());

        let miner = KeyPair::generate();
        let block = handler.create_block(miner.public_key()).unwrap();
        assert_eq!(block.transactions(), &[transaction.clone()]);

        let block_tree = handler.block_tree();
        let snapshot = block_tree.max_height_utxo_pool();
        assert!(snapshot.contains(&UtxoKey::new(*transaction.id(), OutputIndex::new(0))));
        assert!(snapshot.contains(&UtxoKey::new(*transaction.id(), OutputIndex::new(1))));
        assert!(!snapshot.contains(&UtxoKey::new(
            *genesis_coinbase.id(),
            OutputIndex::new(0)
        )));
        assert!(block_tree.transaction_pool().is_empty());
    }

    #[test]
    fn conflicting_transactions_yield_exactly_one_inclusion() {
        let (alice, handler) = new_handler();
        let bob = KeyPair::generate();
        let carol = KeyPair::generate();
        let genesis_coinbase = handler.block_tree().max_height_block().coinbase().clone();

        let to_bob = spend(&genesis_coinbase, &alice, &[(25, &bob)]);
        let to_carol = spend(&genesis_coinbase, &alice, &[(25, &carol)]);
        handler.process_tx(to_bob.clone());
        handler.process_tx(to_carol.clone());

        let miner = KeyPair::generate();
        let block = handler.create_block(miner.public_key()).unwrap();
        // First seen wins, and the loser is never silently included.
        assert_eq!(block.transactions(), &[to_bob]);
    }

    #[test]
    fn max_fee_block_prefers_the_generous_transaction() {
        let (alice, handler) = new_handler();
        let bob = KeyPair::generate();
        let carol = KeyPair::generate();
        let genesis_coinbase = handler.block_tree().max_height_block().coinbase().clone();

        let cheap = spend(&genesis_coinbase, &alice, &[(25, &bob)]);
        let generous = spend(&genesis_coinbase, &alice, &[(20, &carol)]);
        handler.process_tx(cheap);
        handler.process_tx(generous.clone());

        let miner = KeyPair::generate();
        let block = handler.create_block_max_fee(miner.public_key()).unwrap();
        assert_eq!(block.transactions(), &[generous]);
    }

    #[test]
    fn coinbase_is_spendable_in_the_next_block() {
        let (_, handler) = new_handler();
        let miner = KeyPair::generate();
        let first = handler.create_block(miner.public_key()).unwrap();

        // No maturity period: the freshly mined coinbase can be spent in the
        // very next block.
        let friend = KeyPair::generate();
        let transaction = spend(first.coinbase(), &miner, &[(25, &friend)]);
        handler.process_tx(transaction.clone());

        let second = handler.create_block(miner.public_key()).unwrap();
        assert_eq!(second.transactions(), &[transaction]);
        assert_eq!(second.parent_id(), Some(first.id()));
    }

    #[test]
    fn rejected_external_block_leaves_the_tree_unchanged() {
        let (_, handler) = new_handler();
        let elsewhere = KeyPair::generate();
        let orphan = BlockBuilder::new(
            Some(*BlockBuilder::new(None, elsewhere.public_key().clone())
                .finalize()
                .id()),
            elsewhere.public_key().clone(),
        )
        .finalize();

        assert!(!handler.process_block(orphan));
        let block_tree = handler.block_tree();
        let tip = *block_tree.tip();
        assert_eq!(block_tree.height(&tip), Some(1));
    }
}
