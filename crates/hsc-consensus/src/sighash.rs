//! Signature digest and standard witness verification.
//!
//! Only one witness program version is defined: version 0, a plain
//! hash160-of-pubkey program (analogous to P2WPKH) unlocked by a
//! `[signature, pubkey]` witness stack. Anything else is treated as
//! nonstandard at the policy layer but is not itself consensus-invalid —
//! script versioning is left open for a future witness program type.

use hsc_crypto::CryptoProvider;

use crate::error::VerifyError;
use crate::wire;
use crate::{Hash, Tx};

pub const WITNESS_VERSION_HASH160: u8 = 0;

/// Digest committed to by a standard witness signature: the non-witness
/// transaction body plus the specific input being authorized and the value
/// of the coin it spends (binding the signature to the amount, as with
/// segwit's BIP-143 rather than the legacy whole-previous-script model).
pub fn sighash(
    provider: &dyn CryptoProvider,
    tx: &Tx,
    input_index: usize,
    prevout_value: u64,
) -> Result<Hash, VerifyError> {
    let mut preimage = wire::encode_tx(tx, false)?;
    preimage.extend_from_slice(&(input_index as u32).to_le_bytes());
    preimage.extend_from_slice(&prevout_value.to_le_bytes());
    Ok(provider.blake2b_256(&preimage))
}

/// Verifies a `[signature, pubkey]` witness stack against a version-0
/// address program.
pub fn verify_standard_input(
    provider: &dyn CryptoProvider,
    tx: &Tx,
    input_index: usize,
    address_version: u8,
    address_program: &[u8],
    prevout_value: u64,
) -> Result<(), VerifyError> {
    if address_version != WITNESS_VERSION_HASH160 {
        return Err(VerifyError::nonstandard("unknown-witness-version"));
    }
    let witness = tx
        .witnesses
        .get(input_index)
        .ok_or_else(|| VerifyError::invalid("bad-witness-missing"))?;
    let [signature, pubkey] = witness.as_slice() else {
        return Err(VerifyError::invalid("bad-witness-stack-shape"));
    };
    let expected = provider.hash160(pubkey);
    if expected != address_program {
        return Err(VerifyError::invalid("bad-witness-pubkey-mismatch"));
    }
    let digest = sighash(provider, tx, input_index, prevout_value)?;
    let ok = provider
        .verify_secp256k1(pubkey, signature, &digest)
        .map_err(|_| VerifyError::invalid("bad-witness-signature-encoding"))?;
    if !ok {
        return Err(VerifyError::invalid("bad-witness-signature"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Covenant, Outpoint, TxInput, TxOutput};
    use hsc_crypto::DefaultCryptoProvider;

    #[test]
    fn rejects_wrong_stack_shape() {
        let p = DefaultCryptoProvider;
        let tx = Tx {
            version: 0,
            inputs: vec![TxInput {
                prevout: Outpoint::new([1u8; 32], 0),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                value: 1,
                address: Address::from_program(0, &[0u8; 20]),
                covenant: Covenant::none(),
            }],
            locktime: 0,
            witnesses: vec![vec![vec![1, 2, 3]]],
            coinbase_proofs: vec![],
        };
        let err = verify_standard_input(&p, &tx, 0, 0, &[0u8; 20], 100).unwrap_err();
        assert_eq!(err.reason, "bad-witness-stack-shape");
    }

    #[test]
    fn rejects_unknown_witness_version() {
        let p = DefaultCryptoProvider;
        let tx = Tx {
            version: 0,
            inputs: vec![],
            outputs: vec![],
            locktime: 0,
            witnesses: vec![],
            coinbase_proofs: vec![],
        };
        let err = verify_standard_input(&p, &tx, 0, 7, &[0u8; 20], 0).unwrap_err();
        assert_eq!(err.reason, "unknown-witness-version");
    }
}
