use crate::{Block, BlockHash, Transaction, TransactionPool, TxHandler, UtxoPool};
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Maximum height distance from the tip at which a competing branch may still
/// accept new blocks. Blocks attaching below this window are rejected, and
/// fork entries that fall out of it are pruned.
pub const CUTOFF_AGE: u32 = 10;

const GENESIS_HEIGHT: u32 = 1;

/// A node of the tree. Implementation detail of the block tree, so it's not
/// part of the API.
struct BlockTreeEntry {
    block: Block,
    parent: Option<BlockHash>,
    // All spends up to and including this block. Owned exclusively by this
    // entry; children derive their own copies and never alias it.
    utxo_pool: UtxoPool,
    // Distance to the genesis block, which has height 1.
    height: u32,
}

/// Metadata of the last block in the canonical branch.
struct Tip {
    hash: BlockHash,
    height: u32,
}

/// The ledger of candidate blocks. Blocks form a tree rooted at the genesis
/// block since forks can coexist; any path from the root to a leaf is a
/// branch. The branch with the greatest height is canonical, and the first
/// block seen at a given height keeps the tip on ties.
///
/// Every entry within the recency window carries its own unspent-output
/// snapshot, so a new block can be validated against whichever branch it
/// extends.
pub struct BlockTree {
    tree: HashMap<BlockHash, BlockTreeEntry>,
    tip: Tip,
    // Transactions waiting to be mined. Shared across branches; a pending
    // transaction that only spends outputs of a pruned fork can become
    // permanently unresolvable, which is accepted behavior.
    transaction_pool: TransactionPool,
}

impl BlockTree {
    /// Creates a tree holding just `genesis_block`, which the caller asserts
    /// is valid. Its snapshot contains the outputs of all its transactions;
    /// a genesis block has nothing to consume.
    pub fn new(genesis_block: Block) -> Self {
        let mut utxo_pool = UtxoPool::new();
        for transaction in genesis_block.all_transactions() {
            utxo_pool.add_outputs(transaction);
        }
        let genesis_hash = *genesis_block.id();
        let mut tree = HashMap::new();
        tree.insert(
            genesis_hash,
            BlockTreeEntry {
                block: genesis_block,
                parent: None,
                utxo_pool,
                height: GENESIS_HEIGHT,
            },
        );
        Self {
            tree,
            tip: Tip {
                hash: genesis_hash,
                height: GENESIS_HEIGHT,
            },
            transaction_pool: TransactionPool::new(),
        }
    }

    /// Adds `block` to the tree if it is valid and updates the canonical tip
    /// if needed. Validity requires a known parent within the cutoff window
    /// and every transaction in the block to be valid against the parent's
    /// snapshot, all-or-nothing. Returns whether the block was accepted;
    /// a rejected block leaves no trace.
    pub fn add_block(&mut self, block: Block) -> bool {
        let block_hash = *block.id();
        if self.tree.contains_key(&block_hash) {
            debug!("rejecting block {}: already in the tree", block_hash);
            return false;
        }
        let parent_hash = match block.parent_id() {
            Some(parent_hash) => *parent_hash,
            None => {
                debug!("rejecting block {}: a second genesis block", block_hash);
                return false;
            }
        };
        let parent = match self.tree.get(&parent_hash) {
            Some(parent) => parent,
            None => {
                debug!(
                    "rejecting block {}: unknown parent {}",
                    block_hash, parent_hash
                );
                return false;
            }
        };
        let height = parent.height + 1;
        if height <= self.tip.height.saturating_sub(CUTOFF_AGE) {
            debug!(
                "rejecting block {}: height {} is below the cutoff window at tip height {}",
                block_hash, height, self.tip.height
            );
            return false;
        }

        // All-or-nothing: a single invalid transaction rejects the block.
        // Accepted transactions settle into the handler's pool as we go, so
        // this also catches double spends between the block's transactions.
        let mut handler = TxHandler::new(&parent.utxo_pool);
        for transaction in block.transactions() {
            if !handler.accept(transaction) {
                debug!(
                    "rejecting block {}: invalid transaction {}",
                    block_hash, transaction
                );
                return false;
            }
        }
        let mut utxo_pool = handler.into_utxo_pool();
        utxo_pool.add_outputs(block.coinbase());

        self.transaction_pool.remove_included(&block);
        self.tree.insert(
            block_hash,
            BlockTreeEntry {
                block,
                parent: Some(parent_hash),
                utxo_pool,
                height,
            },
        );
        // Strictly greater: the first block seen at a height keeps the tip.
        if height > self.tip.height {
            info!("tip moved to block {} at height {}", block_hash, height);
            self.tip = Tip {
                hash: block_hash,
                height,
            };
            self.prune_stale_forks();
        }
        true
    }

    /// Ensures that the transaction is in the pending pool. It is not
    /// validated against any branch here; validation happens when a block is
    /// created or received.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transaction_pool.insert(transaction);
    }

    /// The block at the tip of the canonical branch.
    pub fn max_height_block(&self) -> &Block {
        &self.tip_entry().block
    }

    /// The unspent-output snapshot for mining a new block on top of the
    /// canonical tip.
    pub fn max_height_utxo_pool(&self) -> &UtxoPool {
        &self.tip_entry().utxo_pool
    }

    /// The pool of transactions waiting to be mined.
    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.transaction_pool
    }

    /// Returns whether the given block hash exists in the tree.
    pub fn exists(&self, block_hash: &BlockHash) -> bool {
        self.tree.contains_key(block_hash)
    }

    /// Returns the height for the given block hash.
    pub fn height(&self, block_hash: &BlockHash) -> Option<u32> {
        self.tree.get(block_hash).map(|entry| entry.height)
    }

    /// The hash of the last block in the canonical branch.
    pub fn tip(&self) -> &BlockHash {
        &self.tip.hash
    }

    fn tip_entry(&self) -> &BlockTreeEntry {
        self.tree
            .get(&self.tip.hash)
            .expect("the tip is always in the tree")
    }

    /// Drops entries that fell out of the recency window. The genesis block
    /// and the ancestors of the current tip are kept so the canonical branch
    /// always remains walkable back to the root.
    fn prune_stale_forks(&mut self) {
        let cutoff = self.tip.height.saturating_sub(CUTOFF_AGE);
        if cutoff == 0 {
            return;
        }
        let retained = self.tip_ancestors();
        let stale: Vec<BlockHash> = self
            .tree
            .iter()
            .filter(|(hash, entry)| entry.height <= cutoff && !retained.contains(*hash))
            .map(|(hash, _)| *hash)
            .collect();
        for block_hash in stale {
            debug!("pruning stale fork block {}", block_hash);
            self.tree.remove(&block_hash);
        }
    }

    fn tip_ancestors(&self) -> HashSet<BlockHash> {
        let mut ancestors = HashSet::new();
        let mut current = Some(self.tip.hash);
        while let Some(block_hash) = current {
            ancestors.insert(block_hash);
            current = self.tree.get(&block_hash).and_then(|entry| entry.parent);
        }
        ancestors
    }
}
