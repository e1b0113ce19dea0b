use {super::*, std::cmp::max};

pub(crate) const SCHNORR_SIGNATURE_SIZE: usize = 64;
const DER_SIGNATURE_SIZE: usize = 72;
const COMPRESSED_PUBKEY_SIZE: usize = 33;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct FeeRate(f64);

impl FromStr for FeeRate {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::try_from(f64::from_str(s)?)
  }
}

impl TryFrom<f64> for FeeRate {
  type Error = anyhow::Error;

  fn try_from(rate: f64) -> Result<Self, Self::Error> {
    if rate.is_sign_negative() | rate.is_nan() | rate.is_infinite() {
      anyhow::bail!("invalid fee rate: {rate}")
    }
    Ok(Self(rate))
  }
}

impl FeeRate {
  pub fn n(&self) -> f64 {
    self.0
  }

  pub fn fee(&self, vsize: usize) -> Amount {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    Amount::from_sat((self.0 * vsize as f64).round() as u64)
  }

  /// Fees below the floor would produce transactions the network will not
  /// relay at low values, so the floor wins when the sized fee comes in
  /// under it.
  pub fn fee_with_floor(&self, vsize: usize, floor: Amount) -> Amount {
    max(self.fee(vsize), floor)
  }
}

/// Estimate the size in virtual bytes of a transaction with the given input
/// and output counts. A dummy transaction is assembled and measured rather
/// than summing per-field constants: taproot key path inputs carry a single
/// 64-byte Schnorr signature, other inputs a DER signature plus a compressed
/// public key.
pub fn estimate_virtual_size(
  taproot_inputs: usize,
  non_taproot_inputs: usize,
  outputs: usize,
) -> usize {
  let input = |witness: Witness| TxIn {
    previous_output: OutPoint::null(),
    script_sig: ScriptBuf::new(),
    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
    witness,
  };

  let mut inputs = Vec::new();

  for _ in 0..taproot_inputs {
    inputs.push(input(Witness::from_slice(&[vec![
      0;
      SCHNORR_SIGNATURE_SIZE
    ]])));
  }

  for _ in 0..non_taproot_inputs {
    inputs.push(input(Witness::from_slice(&[
      vec![0; DER_SIGNATURE_SIZE],
      vec![0; COMPRESSED_PUBKEY_SIZE],
    ])));
  }

  Transaction {
    version: Version(2),
    lock_time: LockTime::ZERO,
    input: inputs,
    output: vec![
      TxOut {
        value: Amount::ZERO,
        script_pubkey: dummy_p2tr_script(),
      };
      outputs
    ],
  }
  .vsize()
}

pub(crate) fn dummy_p2tr_script() -> ScriptBuf {
  script::Builder::new()
    .push_opcode(opcodes::all::OP_PUSHNUM_1)
    .push_slice([0; 32])
    .into_script()
}
