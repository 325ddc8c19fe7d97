use k256::ecdsa::SigningKey;
use rlp::RlpStream;

use crate::chain::Address;
use crate::error::FaucetError;

/// ABI calldata for `requestFaucet(address)`: 4-byte selector followed by the
/// recipient left-padded to 32 bytes.
pub fn request_faucet_calldata(recipient: &Address) -> Vec<u8> {
    let selector = keccak_hash::keccak(b"requestFaucet(address)");
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector.as_bytes()[..4]);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&recipient.0);
    data
}

/// Pre-EIP-1559 transaction shape; the target networks accept it and it keeps
/// the signing path to a single gas-price field.
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

/// The signing identity that pays for claims. Holds the secp256k1 key and the
/// address derived from it; the key material is never logged or displayed.
pub struct OperatorWallet {
    signing_key: SigningKey,
    address: Address,
}

impl OperatorWallet {
    pub fn from_hex_key(key: &str) -> Result<Self, FaucetError> {
        let digits = key.strip_prefix("0x").unwrap_or(key);
        let bytes =
            hex::decode(digits).map_err(|_| FaucetError::Config(vec!["private_key"]))?;
        if bytes.len() != 32 {
            return Err(FaucetError::Config(vec!["private_key"]));
        }
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| FaucetError::Config(vec!["private_key"]))?;

        // Standard derivation: keccak of the uncompressed public key without
        // its 0x04 tag, low 20 bytes.
        let public = signing_key.verifying_key().to_encoded_point(false);
        let digest = keccak_hash::keccak(&public.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest.as_bytes()[12..]);

        Ok(Self {
            signing_key,
            address: Address(address),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs `tx` for `chain_id` per EIP-155 and returns the raw encoded
    /// transaction ready for `eth_sendRawTransaction`.
    pub fn sign_transaction(
        &self,
        tx: &LegacyTransaction,
        chain_id: u64,
    ) -> Result<Vec<u8>, FaucetError> {
        let mut preimage = RlpStream::new_list(9);
        append_tx_fields(&mut preimage, tx);
        preimage.append(&chain_id);
        preimage.append(&0u8);
        preimage.append(&0u8);
        let sighash = keccak_hash::keccak(preimage.out());

        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(sighash.as_bytes())
            .map_err(|e| FaucetError::Node(format!("signing failed: {e}")))?;

        let v = chain_id * 2 + 35 + u64::from(recovery_id.to_byte());

        let mut signed = RlpStream::new_list(9);
        append_tx_fields(&mut signed, tx);
        signed.append(&v);
        signed.append(&trim_leading_zeros(&signature.r().to_bytes()));
        signed.append(&trim_leading_zeros(&signature.s().to_bytes()));

        Ok(signed.out().to_vec())
    }
}

fn append_tx_fields(stream: &mut RlpStream, tx: &LegacyTransaction) {
    stream.append(&tx.nonce);
    stream.append(&trim_be(tx.gas_price));
    stream.append(&tx.gas_limit);
    stream.append(&tx.to.0.to_vec());
    stream.append(&trim_be(tx.value));
    stream.append(&tx.data);
}

/// RLP encodes integers as their minimal big-endian byte string (zero as the
/// empty string), so wide values are appended as trimmed byte strings.
fn trim_be(value: u128) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes())
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}
