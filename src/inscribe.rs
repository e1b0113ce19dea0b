use super::*;

pub(crate) const COMMIT_FEE_FLOOR: Amount = Amount::from_sat(200);
pub(crate) const REVEAL_FEE_FLOOR: Amount = Amount::from_sat(200);
pub(crate) const TRANSFER_FEE_FLOOR: Amount = Amount::from_sat(300);

/// The inscribe flow as externally observable states. Transitions are
/// strictly sequential and never retried: a failed confirmation wait is
/// fatal to the flow, since rebuilding the commit would double-spend funds
/// already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InscribeState {
  Idle,
  CommitBuilt,
  CommitBroadcast,
  CommitConfirmed,
  RevealBuilt,
  RevealBroadcast,
  RevealConfirmed,
  Done,
}

impl InscribeState {
  pub fn advance(self) -> Self {
    let next = match self {
      Self::Idle => Self::CommitBuilt,
      Self::CommitBuilt => Self::CommitBroadcast,
      Self::CommitBroadcast => Self::CommitConfirmed,
      Self::CommitConfirmed => Self::RevealBuilt,
      Self::RevealBuilt => Self::RevealBroadcast,
      Self::RevealBroadcast => Self::RevealConfirmed,
      Self::RevealConfirmed => Self::Done,
      Self::Done => panic!("invariant: no transition out of done"),
    };

    log::info!("inscribe state: {self} -> {next}");

    next
  }
}

impl Display for InscribeState {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Idle => "idle",
        Self::CommitBuilt => "commit-built",
        Self::CommitBroadcast => "commit-broadcast",
        Self::CommitConfirmed => "commit-confirmed",
        Self::RevealBuilt => "reveal-built",
        Self::RevealBroadcast => "reveal-broadcast",
        Self::RevealConfirmed => "reveal-confirmed",
        Self::Done => "done",
      }
    )
  }
}

#[derive(Debug)]
pub struct CommitPlan {
  pub intent: UnsignedPsbtIntent,
  pub psbt: Psbt,
  pub commit_address: Address,
  pub commit_value: Amount,
  pub fee: Amount,
  pub reveal_fee: Amount,
  pub change: Option<Amount>,
  pub consumed: Vec<OutPoint>,
}

#[derive(Debug)]
pub struct RevealPlan {
  pub tx: Transaction,
  pub txid: Txid,
  pub raw_hex: String,
  pub fee: Amount,
}

#[derive(Debug)]
pub struct TransferPlan {
  pub intent: UnsignedPsbtIntent,
  pub psbt: Psbt,
  pub fee: Amount,
  pub change: Option<Amount>,
}

/// The fee the reveal transaction will pay, sized against the real reveal
/// shape: a dummy signature, the leaf script, and the control block in the
/// witness. Both the commit builder and the reveal builder call this, so the
/// commit output funds exactly what the reveal spends.
pub fn reveal_fee(envelope: &InscriptionEnvelope, fee_rate: FeeRate) -> Amount {
  let mut witness = Witness::new();

  witness.push(
    taproot::Signature::from_slice(&[0; SCHNORR_SIGNATURE_SIZE])
      .unwrap()
      .to_vec(),
  );
  witness.push(&envelope.leaf_script);
  witness.push(envelope.control_block.serialize());

  let reveal_tx = Transaction {
    version: Version(2),
    lock_time: LockTime::ZERO,
    input: vec![TxIn {
      previous_output: OutPoint::null(),
      script_sig: ScriptBuf::new(),
      sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
      witness,
    }],
    output: vec![TxOut {
      value: DUST_LIMIT,
      script_pubkey: dummy_p2tr_script(),
    }],
  };

  fee_rate.fee_with_floor(reveal_tx.vsize(), REVEAL_FEE_FLOOR)
}

/// Build the commit transaction: fund a single taproot output paying to the
/// envelope's commit address, worth the reveal fee plus the inscription
/// postage. Returns the outpoints consumed so the follow-up send never
/// re-spends them as fee inputs.
pub fn build_commit(
  envelope: &InscriptionEnvelope,
  candidates: &[Utxo],
  exclude: &BTreeSet<SatPoint>,
  fee_payer: FeePayer,
  change_address: &Address,
  fee_rate: FeeRate,
  network: Network,
) -> Result<CommitPlan, Error> {
  let fee = fee_rate.fee_with_floor(estimate_virtual_size(3, 0, 2), COMMIT_FEE_FLOOR);
  let reveal_fee = reveal_fee(envelope, fee_rate);

  let commit_value = reveal_fee
    .checked_add(INSCRIPTION_POSTAGE)
    .ok_or(Error::ValueOverflow)?;

  let target = fee.checked_add(commit_value).ok_or(Error::ValueOverflow)?;

  let selection = select_utxos(candidates, target, exclude)?;

  let mut outputs = vec![TxOut {
    value: commit_value,
    script_pubkey: envelope.commit_script_pubkey(),
  }];

  let change = change_output(selection.total, commit_value, fee, change_address)?;
  let change_value = change.as_ref().map(|output| output.value);
  outputs.extend(change);

  let consumed = selection.outpoints();

  let intent = UnsignedPsbtIntent {
    inputs: selection
      .selected
      .iter()
      .map(|utxo| PlannedInput::from_utxo(utxo, fee_payer.input_role()))
      .collect(),
    outputs,
    network,
  };

  log::info!(
    "commit pays {commit_value} to {} with {} inputs",
    envelope.commit_address,
    intent.inputs.len(),
  );

  Ok(CommitPlan {
    psbt: intent.clone().into_psbt()?,
    intent,
    commit_address: envelope.commit_address.clone(),
    commit_value,
    fee,
    reveal_fee,
    change: change_value,
    consumed,
  })
}

/// Build and sign the reveal transaction directly, bypassing the PSBT path:
/// a script path spend with a bespoke witness is simpler to construct than
/// to round-trip through PSBT metadata. The leaf is reconstructed from the
/// same envelope derivation the commit used; the keypair is used untweaked,
/// as script path spends always are.
pub fn build_reveal(
  envelope: &InscriptionEnvelope,
  commit_txid: Txid,
  commit_value: Amount,
  receiver: &Address,
  keypair: &Keypair,
) -> Result<RevealPlan, Error> {
  let secp = Secp256k1::new();

  let public_key = XOnlyPublicKey::from_keypair(keypair).0;
  assert_eq!(
    public_key, envelope.public_key,
    "invariant: reveal key matches envelope key"
  );

  let mut reveal_tx = Transaction {
    version: Version(2),
    lock_time: LockTime::ZERO,
    input: vec![TxIn {
      previous_output: OutPoint {
        txid: commit_txid,
        vout: 0,
      },
      script_sig: ScriptBuf::new(),
      sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
      witness: Witness::new(),
    }],
    output: vec![TxOut {
      value: DUST_LIMIT,
      script_pubkey: receiver.script_pubkey(),
    }],
  };

  let prevouts = [TxOut {
    value: commit_value,
    script_pubkey: envelope.commit_script_pubkey(),
  }];

  let mut sighash_cache = SighashCache::new(&mut reveal_tx);

  let sighash = sighash_cache.taproot_script_spend_signature_hash(
    0,
    &Prevouts::All(&prevouts),
    envelope.tapleaf_hash(),
    TapSighashType::Default,
  )?;

  let signature = secp.sign_schnorr(&Message::from_digest_slice(sighash.as_ref())?, keypair);

  let witness = sighash_cache
    .witness_mut(0)
    .expect("getting mutable witness reference should work");

  witness.push(
    taproot::Signature {
      signature,
      sighash_type: TapSighashType::Default,
    }
    .to_vec(),
  );
  witness.push(&envelope.leaf_script);
  witness.push(envelope.control_block.serialize());

  let fee = commit_value
    .checked_sub(DUST_LIMIT)
    .ok_or(Error::ValueOverflow)?;

  Ok(RevealPlan {
    txid: reveal_tx.compute_txid(),
    raw_hex: consensus::encode::serialize_hex(&reveal_tx),
    tx: reveal_tx,
    fee,
  })
}

/// Build the transaction that completes a transfer after the reveal
/// confirms: spend the reveal output to the final receiver at postage value,
/// funded by fresh fee inputs. Outpoints consumed by the commit are barred
/// from fee selection.
pub fn build_transfer_send(
  inscription_outpoint: OutPoint,
  inscription_prevout: TxOut,
  inscription_internal_key: XOnlyPublicKey,
  receiver: &Address,
  candidates: &[Utxo],
  exclude: &BTreeSet<SatPoint>,
  consumed: &[OutPoint],
  fee_payer: FeePayer,
  change_address: &Address,
  fee_rate: FeeRate,
  network: Network,
) -> Result<TransferPlan, Error> {
  let non_taproot_inputs = if fee_payer.is_segwit() { 2 } else { 0 };

  let fee = fee_rate.fee_with_floor(
    estimate_virtual_size(2, non_taproot_inputs, 2),
    TRANSFER_FEE_FLOOR,
  );

  let available = candidates
    .iter()
    .filter(|utxo| !consumed.contains(&utxo.outpoint()) && utxo.outpoint() != inscription_outpoint)
    .cloned()
    .collect::<Vec<Utxo>>();

  let selection = select_utxos(&available, fee, exclude)?;

  let mut inputs = vec![PlannedInput {
    outpoint: inscription_outpoint,
    prevout: inscription_prevout.clone(),
    role: InputRole::TaprootKey {
      internal_key: inscription_internal_key,
    },
  }];

  inputs.extend(
    selection
      .selected
      .iter()
      .map(|utxo| PlannedInput::from_utxo(utxo, fee_payer.input_role())),
  );

  let mut outputs = vec![TxOut {
    value: inscription_prevout.value,
    script_pubkey: receiver.script_pubkey(),
  }];

  let change = change_output(selection.total, Amount::ZERO, fee, change_address)?;
  let change_value = change.as_ref().map(|output| output.value);
  outputs.extend(change);

  let intent = UnsignedPsbtIntent {
    inputs,
    outputs,
    network,
  };

  Ok(TransferPlan {
    psbt: intent.clone().into_psbt()?,
    intent,
    fee,
    change: change_value,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn envelope() -> InscriptionEnvelope {
    InscriptionEnvelope::new(
      internal_key(1),
      Brc20Transfer::MEDIA_TYPE,
      &Brc20Transfer::new("ordi", "1000").encode(),
      Network::Bitcoin,
    )
  }

  #[test]
  fn states_advance_in_order() {
    let mut state = InscribeState::Idle;
    let mut seen = vec![state];

    while state != InscribeState::Done {
      state = state.advance();
      seen.push(state);
    }

    assert_eq!(
      seen,
      vec![
        InscribeState::Idle,
        InscribeState::CommitBuilt,
        InscribeState::CommitBroadcast,
        InscribeState::CommitConfirmed,
        InscribeState::RevealBuilt,
        InscribeState::RevealBroadcast,
        InscribeState::RevealConfirmed,
        InscribeState::Done,
      ]
    );
  }

  #[test]
  #[should_panic(expected = "invariant: no transition out of done")]
  fn done_is_terminal() {
    InscribeState::Done.advance();
  }

  #[test]
  fn reveal_fee_floors_at_low_rates() {
    assert_eq!(
      reveal_fee(&envelope(), FeeRate::try_from(1.0).unwrap()),
      REVEAL_FEE_FLOOR
    );
  }

  #[test]
  fn reveal_fee_scales_with_rate() {
    let envelope = envelope();

    assert!(
      reveal_fee(&envelope, FeeRate::try_from(10.0).unwrap())
        > reveal_fee(&envelope, FeeRate::try_from(1.0).unwrap())
    );
  }

  #[test]
  fn commit_funds_reveal_and_postage() {
    let envelope = envelope();
    let candidates = vec![utxo(1, 50_000, taproot_address(1))];

    let plan = build_commit(
      &envelope,
      &candidates,
      &BTreeSet::new(),
      FeePayer::Taproot {
        internal_key: internal_key(1),
      },
      &taproot_address(1),
      FeeRate::try_from(1.0).unwrap(),
      Network::Bitcoin,
    )
    .unwrap();

    assert_eq!(plan.fee, COMMIT_FEE_FLOOR);
    assert_eq!(plan.reveal_fee, REVEAL_FEE_FLOOR);
    assert_eq!(plan.commit_value, plan.reveal_fee + INSCRIPTION_POSTAGE);

    assert_eq!(plan.intent.outputs.len(), 2);
    assert_eq!(plan.intent.outputs[0].value, plan.commit_value);
    assert_eq!(
      plan.intent.outputs[0].script_pubkey,
      envelope.commit_script_pubkey()
    );
    assert_eq!(
      plan.change,
      Some(Amount::from_sat(50_000) - plan.commit_value - plan.fee)
    );

    assert_eq!(plan.consumed, vec![outpoint(1)]);
    assert_eq!(plan.psbt.inputs[0].tap_internal_key, Some(internal_key(1)));
  }

  #[test]
  fn commit_with_insufficient_funds_fails() {
    assert_matches!(
      build_commit(
        &envelope(),
        &[utxo(1, 900, taproot_address(1))],
        &BTreeSet::new(),
        FeePayer::Taproot {
          internal_key: internal_key(1),
        },
        &taproot_address(1),
        FeeRate::try_from(1.0).unwrap(),
        Network::Bitcoin,
      ),
      Err(Error::InsufficientFunds { .. })
    );
  }

  #[test]
  fn reveal_spends_commit_output_zero_to_postage() {
    let envelope = envelope();

    let plan = build_reveal(
      &envelope,
      txid(2),
      Amount::from_sat(746),
      &recipient(),
      &keypair(1),
    )
    .unwrap();

    assert_eq!(
      plan.tx.input[0].previous_output,
      OutPoint {
        txid: txid(2),
        vout: 0
      }
    );
    assert_eq!(plan.tx.output.len(), 1);
    assert_eq!(plan.tx.output[0].value, DUST_LIMIT);
    assert_eq!(
      plan.tx.output[0].script_pubkey,
      recipient().script_pubkey()
    );
    assert_eq!(plan.fee, Amount::from_sat(200));
    assert_eq!(plan.txid, plan.tx.compute_txid());
  }

  #[test]
  fn reveal_witness_carries_signature_script_and_control_block() {
    let envelope = envelope();

    let plan = build_reveal(
      &envelope,
      txid(2),
      Amount::from_sat(746),
      &recipient(),
      &keypair(1),
    )
    .unwrap();

    let witness = plan.tx.input[0].witness.iter().collect::<Vec<&[u8]>>();

    assert_eq!(witness.len(), 3);
    assert_eq!(witness[0].len(), SCHNORR_SIGNATURE_SIZE);
    assert_eq!(witness[1], envelope.leaf_script.as_bytes());
    assert_eq!(witness[2], envelope.control_block.serialize());
  }

  #[test]
  fn reveal_signature_verifies_against_envelope_key() {
    let envelope = envelope();
    let commit_value = Amount::from_sat(746);

    let plan = build_reveal(&envelope, txid(2), commit_value, &recipient(), &keypair(1)).unwrap();

    let prevouts = [TxOut {
      value: commit_value,
      script_pubkey: envelope.commit_script_pubkey(),
    }];

    let sighash = SighashCache::new(&plan.tx)
      .taproot_script_spend_signature_hash(
        0,
        &Prevouts::All(&prevouts),
        envelope.tapleaf_hash(),
        TapSighashType::Default,
      )
      .unwrap();

    let signature =
      secp256k1::schnorr::Signature::from_slice(plan.tx.input[0].witness.iter().next().unwrap())
        .unwrap();

    assert!(Secp256k1::new()
      .verify_schnorr(
        &signature,
        &Message::from_digest_slice(sighash.as_ref()).unwrap(),
        &envelope.public_key,
      )
      .is_ok());
  }

  #[test]
  fn transfer_send_moves_postage_and_pays_fees_from_fresh_utxos() {
    let candidates = vec![
      utxo(3, 10_000, taproot_address(1)),
      utxo(4, 10_000, taproot_address(1)),
    ];

    let plan = build_transfer_send(
      outpoint(2),
      TxOut {
        value: DUST_LIMIT,
        script_pubkey: taproot_address(1).script_pubkey(),
      },
      internal_key(1),
      &recipient(),
      &candidates,
      &BTreeSet::new(),
      &[outpoint(3)],
      FeePayer::Taproot {
        internal_key: internal_key(1),
      },
      &taproot_address(1),
      FeeRate::try_from(1.0).unwrap(),
      Network::Bitcoin,
    )
    .unwrap();

    assert_eq!(plan.fee, TRANSFER_FEE_FLOOR);

    assert_eq!(plan.intent.inputs[0].outpoint, outpoint(2));
    assert_eq!(
      plan.intent.inputs[1].outpoint,
      outpoint(4),
      "commit-consumed outpoints are barred from fee selection"
    );

    assert_eq!(plan.intent.outputs[0].value, DUST_LIMIT);
    assert_eq!(
      plan.intent.outputs[0].script_pubkey,
      recipient().script_pubkey()
    );
    assert_eq!(
      plan.change,
      Some(Amount::from_sat(10_000) - TRANSFER_FEE_FLOOR)
    );
  }
}
