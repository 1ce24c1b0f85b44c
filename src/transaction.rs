use crate::{Coin, KeyPair, PublicKey, Sha256, Signature};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// A SHA-256 hash of the transaction data, which identifies the transaction
/// uniquely and unambiguously.
#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct TransactionId(Sha256);

impl TransactionId {
    pub fn new(data: Sha256) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The index of a transaction output, the first one is 0.
#[derive(Debug, Hash, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct OutputIndex(u32);

impl OutputIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }
}

impl Display for OutputIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction output consists of a value and the public key to which it is
/// being paid. Two outputs with the same value and recipient are equal.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    value: Coin,
    recipient: PublicKey,
}

impl TransactionOutput {
    pub fn new(value: Coin, recipient: PublicKey) -> Self {
        Self { value, recipient }
    }

    pub fn value(&self) -> Coin {
        self.value
    }

    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }
}

/// A transaction input references the output it spends by the id of the
/// producing transaction and the output's index within it, never by a direct
/// reference to the output object.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    prev_tx_id: TransactionId,
    output_index: OutputIndex,
    // Must be a valid signature over the transaction's signable payload under
    // the public key stored in the referenced output.
    signature: Option<Signature>,
}

impl TransactionInput {
    pub fn new(prev_tx_id: TransactionId, output_index: OutputIndex) -> Self {
        Self {
            prev_tx_id,
            output_index,
            signature: None,
        }
    }

    pub fn prev_tx_id(&self) -> &TransactionId {
        &self.prev_tx_id
    }

    pub fn output_index(&self) -> &OutputIndex {
        &self.output_index
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }
}

impl Display for TransactionInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.prev_tx_id, self.output_index)
    }
}

/// The fields of an input that are covered by signatures and by the
/// transaction id, i.e. everything except the signature itself.
#[derive(Serialize)]
struct PresignatureInput<'a> {
    prev_tx_id: &'a TransactionId,
    output_index: &'a OutputIndex,
}

#[derive(Serialize)]
struct SignablePayload<'a> {
    inputs: Vec<PresignatureInput<'a>>,
    outputs: &'a [TransactionOutput],
}

#[derive(Serialize)]
struct RawPayload<'a> {
    inputs: &'a [TransactionInput],
    outputs: &'a [TransactionOutput],
}

/// A transaction consumes previously unspent outputs and produces new ones.
/// Its identity is the content hash of its pre-signature inputs and outputs,
/// so two transactions with identical data are equal regardless of where the
/// objects came from.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    is_coinbase: bool,
}

impl Transaction {
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        let id = Self::hash_transaction_data(&inputs, &outputs);
        Self {
            id,
            inputs,
            outputs,
            is_coinbase: false,
        }
    }

    /// Creates the reward transaction paid to the miner. It has no inputs,
    /// exactly one output, and its id is fixed here so that it can be
    /// referenced by UTXO keys as soon as the block is assembled.
    pub fn coinbase(reward: Coin, miner: PublicKey) -> Self {
        let outputs = vec![TransactionOutput::new(reward, miner)];
        let id = Self::hash_transaction_data(&[], &outputs);
        Self {
            id,
            inputs: Vec::new(),
            outputs,
            is_coinbase: true,
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn is_coinbase(&self) -> bool {
        self.is_coinbase
    }

    /// The canonical message that every input's signature must cover: the
    /// pre-signature fields of all inputs plus all outputs.
    pub fn signable_payload(&self) -> Vec<u8> {
        Self::canonical_payload(&self.inputs, &self.outputs)
    }

    /// The full serialized transaction, signatures included. These are the
    /// bytes a block hashes over.
    pub fn raw_bytes(&self) -> Vec<u8> {
        bincode::serialize(&RawPayload {
            inputs: &self.inputs,
            outputs: &self.outputs,
        })
        .expect("serializing a transaction in memory")
    }

    /// Signs the input at `index` with `keypair` and stores the signature.
    /// The id does not change since it only covers pre-signature data.
    pub fn sign_input(&mut self, index: usize, keypair: &KeyPair) -> Result<(), String> {
        let payload = self.signable_payload();
        match self.inputs.get_mut(index) {
            Some(input) => {
                input.signature = Some(keypair.sign(&payload));
                Ok(())
            }
            None => Err(format!(
                "Transaction {} has no input at index {}",
                self.id, index
            )),
        }
    }

    fn canonical_payload(inputs: &[TransactionInput], outputs: &[TransactionOutput]) -> Vec<u8> {
        let payload = SignablePayload {
            inputs: inputs
                .iter()
                .map(|input| PresignatureInput {
                    prev_tx_id: &input.prev_tx_id,
                    output_index: &input.output_index,
                })
                .collect(),
            outputs,
        };
        bincode::serialize(&payload).expect("serializing a transaction in memory")
    }

    fn hash_transaction_data(
        inputs: &[TransactionInput],
        outputs: &[TransactionOutput],
    ) -> TransactionId {
        TransactionId(Sha256::digest(&Self::canonical_payload(inputs, outputs)))
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
