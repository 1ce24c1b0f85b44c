use crate::{Coin, PublicKey, Sha256, Transaction};
use std::fmt::{Display, Formatter};
use std::iter;

/// The reward paid by every coinbase transaction. Kept constant, whereas in
/// reality it halves roughly every four years.
pub const COINBASE_VALUE: Coin = Coin::new(25);

/// A block hash that identifies the block uniquely and unambiguously, and
/// implicitly all of its ancestors.
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Copy, Clone)]
pub struct BlockHash(Sha256);

impl BlockHash {
    pub fn new(hash: Sha256) -> Self {
        Self(hash)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Display for BlockHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

/// An immutable, hash-identified container of a coinbase transaction plus
/// zero or more ordinary transactions, linked to its parent by the parent's
/// hash. Only the genesis block has no parent.
///
/// Blocks are produced by finalizing a [`BlockBuilder`], so every block in
/// existence has its id computed and can no longer change.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockHash,
    parent_id: Option<BlockHash>,
    coinbase: Transaction,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn id(&self) -> &BlockHash {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&BlockHash> {
        self.parent_id.as_ref()
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    /// The ordinary transactions, coinbase excluded.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The coinbase followed by the ordinary transactions.
    pub fn all_transactions(&self) -> impl Iterator<Item = &Transaction> {
        iter::once(&self.coinbase).chain(self.transactions.iter())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Assembles a block on top of `parent_id` (or a genesis block when there is
/// no parent). The coinbase paying `miner` is created and finalized up front
/// so its outputs can be referenced as soon as the block exists; ordinary
/// transactions are added afterwards. `finalize` consumes the builder, which
/// is what makes "modify after finalize" unrepresentable.
pub struct BlockBuilder {
    parent_id: Option<BlockHash>,
    coinbase: Transaction,
    transactions: Vec<Transaction>,
}

impl BlockBuilder {
    pub fn new(parent_id: Option<BlockHash>, miner: PublicKey) -> Self {
        Self {
            parent_id,
            coinbase: Transaction::coinbase(COINBASE_VALUE, miner),
            transactions: Vec::new(),
        }
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Computes the block id over the parent hash and the raw bytes of every
    /// transaction (coinbase first, signatures included) and yields the
    /// immutable block.
    pub fn finalize(self) -> Block {
        let mut raw_block = Vec::new();
        if let Some(parent_id) = &self.parent_id {
            raw_block.extend_from_slice(parent_id.as_slice());
        }
        raw_block.extend_from_slice(&self.coinbase.raw_bytes());
        for transaction in &self.transactions {
            raw_block.extend_from_slice(&transaction.raw_bytes());
        }
        Block {
            id: BlockHash::new(Sha256::digest(&raw_block)),
            parent_id: self.parent_id,
            coinbase: self.coinbase,
            transactions: self.transactions,
        }
    }
}
