pub mod block;
pub mod block_handler;
pub mod block_tree;
pub mod coin;
pub mod crypto;
pub mod hash;
pub mod transaction;
pub mod transaction_pool;
pub mod tx_handler;
pub mod utxo_pool;

pub use self::{
    block::*, block_handler::*, block_tree::*, coin::*, crypto::*, hash::*, transaction::*,
    transaction_pool::*, tx_handler::*, utxo_pool::*,
};
