//! Block and transaction id functions.

use hsc_crypto::CryptoProvider;

use crate::error::VerifyError;
use crate::wire;
use crate::{BlockHeader, Hash, Tx};

/// The proof-of-work hash: blake2b-256 over the full fixed-size header
/// (preheader || subheader || mask), matched against `bits` by the caller.
pub fn block_header_hash(provider: &dyn CryptoProvider, header: &BlockHeader) -> Hash {
    provider.blake2b_256(&wire::encode_header(header))
}

/// The transaction id: hash of the non-witness encoding.
pub fn txid(provider: &dyn CryptoProvider, tx: &Tx) -> Result<Hash, VerifyError> {
    let bytes = wire::encode_tx(tx, false)?;
    Ok(provider.blake2b_256(&bytes))
}

/// The witness transaction id: hash of the full (witness-bearing) encoding.
pub fn wtxid(provider: &dyn CryptoProvider, tx: &Tx) -> Result<Hash, VerifyError> {
    let bytes = wire::encode_tx(tx, true)?;
    Ok(provider.blake2b_256(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Covenant, Outpoint, TxInput, TxOutput};
    use hsc_crypto::DefaultCryptoProvider;

    #[test]
    fn txid_ignores_witness_but_wtxid_does_not() {
        let p = DefaultCryptoProvider;
        let base = Tx {
            version: 0,
            inputs: vec![TxInput {
                prevout: Outpoint::new([1u8; 32], 0),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                value: 10,
                address: Address::from_program(0, &[2u8; 20]),
                covenant: Covenant::none(),
            }],
            locktime: 0,
            witnesses: vec![vec![vec![1]]],
            coinbase_proofs: vec![],
        };
        let mut other_witness = base.clone();
        other_witness.witnesses = vec![vec![vec![2]]];

        assert_eq!(txid(&p, &base).unwrap(), txid(&p, &other_witness).unwrap());
        assert_ne!(
            wtxid(&p, &base).unwrap(),
            wtxid(&p, &other_witness).unwrap()
        );
    }
}
