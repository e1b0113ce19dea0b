use super::*;

/// The signing work an input will need once the transaction is assembled.
#[derive(Debug, Clone)]
pub enum InputRole {
  /// A key path spend of a legacy or segwit output; the previous output's
  /// script and value ride along as witness metadata.
  SegwitKey,
  /// A taproot key path spend. The internal key is attached untweaked; the
  /// signer applies the BIP341 tweak.
  TaprootKey { internal_key: XOnlyPublicKey },
  /// A taproot script path spend carrying its leaf and control block. No
  /// internal key tweak is ever applied to these.
  TaprootScript {
    leaf_script: ScriptBuf,
    control_block: ControlBlock,
  },
  /// A maker's offer input imported from a decoded offer PSBT, already
  /// signed with `SIGHASH_SINGLE | ANYONECANPAY`.
  MakerOffer {
    internal_key: Option<XOnlyPublicKey>,
    key_sig: Option<taproot::Signature>,
  },
}

/// Whose utxos cover fees for a build: the sender's taproot key, or a
/// dedicated segwit fee key.
#[derive(Debug, Clone, Copy)]
pub enum FeePayer {
  Taproot { internal_key: XOnlyPublicKey },
  Segwit,
}

impl FeePayer {
  pub(crate) fn input_role(&self) -> InputRole {
    match self {
      Self::Taproot { internal_key } => InputRole::TaprootKey {
        internal_key: *internal_key,
      },
      Self::Segwit => InputRole::SegwitKey,
    }
  }

  pub(crate) fn is_segwit(&self) -> bool {
    matches!(self, Self::Segwit)
  }
}

#[derive(Debug, Clone)]
pub struct PlannedInput {
  pub outpoint: OutPoint,
  pub prevout: TxOut,
  pub role: InputRole,
}

impl PlannedInput {
  pub fn from_utxo(utxo: &Utxo, role: InputRole) -> Self {
    Self {
      outpoint: utxo.outpoint(),
      prevout: utxo.tx_out(),
      role,
    }
  }
}

/// The in-progress build as an immutable value: each stage takes an intent
/// and returns a new artifact, so every stage's contract is explicit and
/// independently testable. Output order is preserved exactly as given;
/// downstream consumers locate outputs by position.
#[derive(Debug, Clone)]
pub struct UnsignedPsbtIntent {
  pub inputs: Vec<PlannedInput>,
  pub outputs: Vec<TxOut>,
  pub network: Network,
}

impl UnsignedPsbtIntent {
  pub fn unsigned_tx(&self) -> Transaction {
    Transaction {
      version: Version(2),
      lock_time: LockTime::ZERO,
      input: self
        .inputs
        .iter()
        .map(|input| TxIn {
          previous_output: input.outpoint,
          script_sig: ScriptBuf::new(),
          sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
          witness: Witness::new(),
        })
        .collect(),
      output: self.outputs.clone(),
    }
  }

  pub fn into_psbt(self) -> Result<Psbt, Error> {
    let mut psbt = Psbt::from_unsigned_tx(self.unsigned_tx())?;

    for (index, input) in self.inputs.iter().enumerate() {
      let entry = &mut psbt.inputs[index];

      entry.witness_utxo = Some(input.prevout.clone());

      match &input.role {
        InputRole::SegwitKey => {}
        InputRole::TaprootKey { internal_key } => {
          entry.tap_internal_key = Some(*internal_key);
        }
        InputRole::TaprootScript {
          leaf_script,
          control_block,
        } => {
          entry.tap_scripts.insert(
            control_block.clone(),
            (leaf_script.clone(), LeafVersion::TapScript),
          );
        }
        InputRole::MakerOffer {
          internal_key,
          key_sig,
        } => {
          entry.tap_internal_key = *internal_key;
          entry.tap_key_sig = *key_sig;
          entry.sighash_type = Some(TapSighashType::SinglePlusAnyoneCanPay.into());
        }
      }
    }

    Ok(psbt)
  }
}

/// Change policy shared by every builder: emit a change output only when the
/// excess clears the dust limit, otherwise absorb it into the fee. A
/// sub-dust output is never emitted.
pub fn change_output(
  gathered: Amount,
  spend: Amount,
  fee: Amount,
  change_address: &Address,
) -> Result<Option<TxOut>, Error> {
  let excess = gathered
    .checked_sub(spend.checked_add(fee).ok_or(Error::ValueOverflow)?)
    .ok_or(Error::ValueOverflow)?;

  Ok((excess > DUST_LIMIT).then(|| TxOut {
    value: excess,
    script_pubkey: change_address.script_pubkey(),
  }))
}

pub fn psbt_hex(psbt: &Psbt) -> String {
  hex::encode(psbt.serialize())
}

pub fn psbt_base64(psbt: &Psbt) -> String {
  base64_encode(&psbt.serialize())
}

pub fn psbt_from_hex(hex: &str) -> Result<Psbt, Error> {
  Ok(Psbt::deserialize(&hex::decode(hex).map_err(|err| {
    Error::Client { source: err.into() }
  })?)?)
}

pub fn psbt_from_base64(base64: &str) -> Result<Psbt, Error> {
  Ok(Psbt::deserialize(&base64_decode(base64)?)?)
}
