use super::*;

const SEND_TAPROOT_FEE_FLOOR: Amount = Amount::from_sat(200);
const SEND_SEGWIT_FEE_FLOOR: Amount = Amount::from_sat(250);
const SEND_MIXED_FEE_FLOOR: Amount = Amount::from_sat(300);
const COLLECTIBLE_FEE_FLOOR: Amount = Amount::from_sat(200);
const COLLECTIBLE_SEGWIT_FEE_FLOOR: Amount = Amount::from_sat(250);

/// The engine's facade: owns the collaborator clients and strings the
/// builders, the signing dispatcher, and broadcast together. Each call
/// operates on a fresh utxo snapshot and returns new artifacts; no mutable
/// state persists between calls.
pub struct Wallet {
  settings: Settings,
  utxo_source: Box<dyn UtxoSource>,
  node: Box<dyn NodeClient>,
  inscription_index: Box<dyn InscriptionIndex>,
}

#[derive(Debug, Clone)]
pub enum EncodedPsbt {
  Hex(String),
  Base64(String),
}

impl EncodedPsbt {
  pub fn parse(&self) -> Result<Psbt, Error> {
    match self {
      Self::Hex(hex) => psbt_from_hex(hex),
      Self::Base64(base64) => psbt_from_base64(base64),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct PushOutput {
  pub txid: Txid,
  pub raw_tx: String,
}

#[derive(Debug, Serialize)]
pub struct SendOutput {
  pub txid: Txid,
  pub raw_tx: String,
  pub psbt_hex: String,
  pub psbt_base64: String,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub fee: Amount,
  #[serde(with = "bitcoin::amount::serde::as_sat::opt")]
  pub change: Option<Amount>,
}

#[derive(Debug, Serialize)]
pub struct Brc20Output {
  pub commit: Txid,
  pub reveal: Txid,
  pub transfer: Txid,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub total_fees: Amount,
}

impl Wallet {
  pub fn new(
    settings: Settings,
    utxo_source: Box<dyn UtxoSource>,
    node: Box<dyn NodeClient>,
    inscription_index: Box<dyn InscriptionIndex>,
  ) -> Self {
    Self {
      settings,
      utxo_source,
      node,
      inscription_index,
    }
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn network(&self) -> Network {
    self.settings.network()
  }

  pub(crate) fn fee_rate_or_estimate(&self, fee_rate: Option<FeeRate>) -> Result<FeeRate, Error> {
    match fee_rate {
      Some(fee_rate) => Ok(fee_rate),
      None => Ok(FeeRate::try_from(
        self
          .utxo_source
          .fee_estimate(self.settings.fee_target_blocks)?,
      )?),
    }
  }

  /// Fetch and enrich the utxo set for an address: previous output scripts
  /// joined in from transaction lookups, inscriptions attached by outpoint.
  /// An entry whose output cannot be matched is skipped, not fatal.
  pub fn utxo_artifacts(&self, address: &Address) -> Result<Vec<Utxo>, Error> {
    let address_type = AddressType::from_address(address)?;
    let entries = self.utxo_source.list_utxos(address)?;
    let inscriptions = self.inscription_index.address_inscriptions(address)?;

    let mut utxos = Vec::new();

    for entry in entries {
      let info = self.utxo_source.tx_info(entry.txid)?;

      let Some(tx_out) = info.vout.get(usize::try_from(entry.vout).unwrap()) else {
        log::warn!("utxo {}:{} missing from its transaction", entry.txid, entry.vout);
        continue;
      };

      let outpoint = OutPoint {
        txid: entry.txid,
        vout: entry.vout,
      };

      utxos.push(Utxo {
        txid: entry.txid,
        vout: entry.vout,
        value: Amount::from_sat(entry.value),
        script_pubkey: tx_out.scriptpubkey.clone(),
        confirmations: u32::from(entry.confirmed),
        address: address.clone(),
        address_type,
        inscriptions: inscriptions
          .iter()
          .filter(|inscription| inscription.satpoint.outpoint == outpoint)
          .cloned()
          .collect(),
      });
    }

    Ok(utxos)
  }

  pub fn balance(&self, address: &Address) -> Result<Amount, Error> {
    Ok(calculate_balance(&self.utxo_artifacts(address)?))
  }

  /// Build, sign, and broadcast a plain value transfer.
  pub fn send_btc(&self, options: &SendOptions, signer: &Signer) -> Result<SendOutput, Error> {
    if options.pay_fees_with_segwit && options.segwit_fee_public_key.is_none() {
      return Err(Error::InvalidSegwitFeeConfig);
    }

    let primary = AddressType::from_address(&options.sender_address)?;
    let fee_rate = self.fee_rate_or_estimate(options.fee_rate)?;

    let (intent, fee, change) = self.build_send_intent(options, primary, fee_rate)?;

    let psbt = intent.into_psbt()?;
    let signed = dispatch(psbt, primary, options.pay_fees_with_segwit, signer)?;
    let (psbt_hex, psbt_base64) = (psbt_hex(&signed), psbt_base64(&signed));
    let push = self.push_signed(signed, false)?;

    Ok(SendOutput {
      txid: push.txid,
      raw_tx: push.raw_tx,
      psbt_hex,
      psbt_base64,
      fee,
      change,
    })
  }

  fn build_send_intent(
    &self,
    options: &SendOptions,
    primary: AddressType,
    fee_rate: FeeRate,
  ) -> Result<(UnsignedPsbtIntent, Amount, Option<Amount>), Error> {
    let utxos = self.utxo_artifacts(&options.sender_address)?;
    let exclude = inscription_satpoints(&utxos);
    let candidates = by_value_descending(&utxos);

    let sender_role = match primary {
      AddressType::Taproot => InputRole::TaprootKey {
        internal_key: options.sender_internal_key.ok_or(Error::MissingKey {
          address_type: AddressType::Taproot,
        })?,
      },
      _ => InputRole::SegwitKey,
    };

    if options.pay_fees_with_segwit {
      let fee_key = options
        .segwit_fee_public_key
        .ok_or(Error::InvalidSegwitFeeConfig)?;
      let fee_address = Address::p2wpkh(&CompressedPublicKey(fee_key), self.network());
      let fee_utxos = by_value_descending(&self.utxo_artifacts(&fee_address)?);

      let fee = fee_rate.fee_with_floor(estimate_virtual_size(2, 2, 3), SEND_MIXED_FEE_FLOOR);

      let amount_selection = select_utxos(&candidates, options.amount, &exclude)?;
      let fee_selection = select_utxos(&fee_utxos, fee, &exclude)?;

      let mut inputs = amount_selection
        .selected
        .iter()
        .map(|utxo| PlannedInput::from_utxo(utxo, sender_role.clone()))
        .collect::<Vec<PlannedInput>>();

      inputs.extend(
        fee_selection
          .selected
          .iter()
          .map(|utxo| PlannedInput::from_utxo(utxo, InputRole::SegwitKey)),
      );

      let mut outputs = vec![TxOut {
        value: options.amount,
        script_pubkey: options.receiver_address.script_pubkey(),
      }];

      outputs.extend(change_output(
        amount_selection.total,
        options.amount,
        Amount::ZERO,
        &options.sender_address,
      )?);

      let fee_change = change_output(fee_selection.total, Amount::ZERO, fee, &fee_address)?;
      let change = fee_change.as_ref().map(|output| output.value);
      outputs.extend(fee_change);

      Ok((
        UnsignedPsbtIntent {
          inputs,
          outputs,
          network: self.network(),
        },
        fee,
        change,
      ))
    } else {
      let (shape, floor) = match primary {
        AddressType::Taproot => ((2, 0), SEND_TAPROOT_FEE_FLOOR),
        _ => ((0, 2), SEND_SEGWIT_FEE_FLOOR),
      };

      let fee = fee_rate.fee_with_floor(estimate_virtual_size(shape.0, shape.1, 2), floor);

      let target = options
        .amount
        .checked_add(fee)
        .ok_or(Error::ValueOverflow)?;

      let selection = select_utxos(&candidates, target, &exclude)?;

      let mut outputs = vec![TxOut {
        value: options.amount,
        script_pubkey: options.receiver_address.script_pubkey(),
      }];

      let change = change_output(
        selection.total,
        options.amount,
        fee,
        &options.sender_address,
      )?;
      let change_value = change.as_ref().map(|output| output.value);
      outputs.extend(change);

      Ok((
        UnsignedPsbtIntent {
          inputs: selection
            .selected
            .iter()
            .map(|utxo| PlannedInput::from_utxo(utxo, sender_role.clone()))
            .collect(),
          outputs,
          network: self.network(),
        },
        fee,
        change_value,
      ))
    }
  }

  /// Inscribe and deliver a BRC-20 transfer: commit, wait, reveal, wait,
  /// then send the revealed transfer inscription to the receiver. Each wait
  /// is bounded; a timeout is fatal to the flow and surfaced, never retried,
  /// since rebuilding the commit would double-spend committed funds.
  pub fn send_brc20(
    &self,
    options: &Brc20TransferOptions,
    signer: &Signer,
  ) -> Result<Brc20Output, Error> {
    if options.pay_fees_with_segwit && options.segwit_fee_public_key.is_none() {
      return Err(Error::InvalidSegwitFeeConfig);
    }

    let mut state = InscribeState::Idle;
    let primary = AddressType::from_address(&options.sender_address)?;
    let fee_rate = self.fee_rate_or_estimate(options.fee_rate)?;
    let internal_key = signer.taproot_internal_key()?;

    let payload = Brc20Transfer::new(&options.ticker, &options.amount);
    let envelope = InscriptionEnvelope::new(
      internal_key,
      Brc20Transfer::MEDIA_TYPE,
      &payload.encode(),
      self.network(),
    );

    let sender_utxos = self.utxo_artifacts(&options.sender_address)?;
    let exclude = inscription_satpoints(&sender_utxos);

    let (fee_payer, fee_candidates, change_address) = if options.pay_fees_with_segwit {
      let fee_key = options
        .segwit_fee_public_key
        .ok_or(Error::InvalidSegwitFeeConfig)?;
      let fee_address = Address::p2wpkh(&CompressedPublicKey(fee_key), self.network());
      let fee_utxos = self.utxo_artifacts(&fee_address)?;
      (FeePayer::Segwit, fee_utxos, fee_address)
    } else {
      (
        FeePayer::Taproot { internal_key },
        sender_utxos.clone(),
        options.sender_address.clone(),
      )
    };

    let fee_candidates = by_value_descending(&fee_candidates);

    let commit = build_commit(
      &envelope,
      &fee_candidates,
      &exclude,
      fee_payer,
      &change_address,
      fee_rate,
      self.network(),
    )?;
    state = state.advance();

    let signed_commit = dispatch(
      commit.psbt.clone(),
      primary,
      options.pay_fees_with_segwit,
      signer,
    )?;
    let commit_push = self.push_signed(signed_commit, false)?;
    state = state.advance();

    self.wait_for_transaction(commit_push.txid)?;
    state = state.advance();

    let commit_output = self.output_entry(commit_push.txid, 0)?;
    let reveal = build_reveal(
      &envelope,
      commit_push.txid,
      Amount::from_sat(commit_output.value),
      &options.sender_address,
      signer.taproot_keypair()?,
    )?;
    state = state.advance();

    let reveal_txid = self.push_raw(&reveal.raw_hex)?;
    state = state.advance();

    self.wait_for_transaction(reveal_txid)?;
    state = state.advance();

    let reveal_output = self.output_entry(reveal_txid, 0)?;

    let transfer = build_transfer_send(
      OutPoint {
        txid: reveal_txid,
        vout: 0,
      },
      TxOut {
        value: Amount::from_sat(reveal_output.value),
        script_pubkey: reveal_output.scriptpubkey.clone(),
      },
      internal_key,
      &options.receiver_address,
      &fee_candidates,
      &exclude,
      &commit.consumed,
      fee_payer,
      &change_address,
      fee_rate,
      self.network(),
    )?;

    let signed_transfer = dispatch(
      transfer.psbt.clone(),
      primary,
      options.pay_fees_with_segwit,
      signer,
    )?;
    let transfer_push = self.push_signed(signed_transfer, false)?;
    state = state.advance();

    assert_eq!(state, InscribeState::Done, "invariant: flow runs to done");

    Ok(Brc20Output {
      commit: commit_push.txid,
      reveal: reveal_txid,
      transfer: transfer_push.txid,
      total_fees: commit.fee + reveal.fee + transfer.fee,
    })
  }

  /// Send an inscribed collectible. Preconditions: the inscription index
  /// says the sender owns it, and its output is unspent.
  pub fn send_collectible(
    &self,
    options: &CollectibleSendOptions,
    signer: &Signer,
  ) -> Result<SendOutput, Error> {
    if options.pay_fees_with_segwit && options.segwit_fee_public_key.is_none() {
      return Err(Error::InvalidSegwitFeeConfig);
    }

    let primary = AddressType::from_address(&options.sender_address)?;
    let fee_rate = self.fee_rate_or_estimate(options.fee_rate)?;

    let details = self.inscription_index.inscription(options.inscription_id)?;

    if details.address != options.sender_address.to_string() {
      return Err(Error::InscriptionNotOwned {
        inscription_id: options.inscription_id,
      });
    }

    let satpoint = details.satpoint;

    let outspends = self.utxo_source.tx_outspends(satpoint.outpoint.txid)?;
    if outspends
      .get(usize::try_from(satpoint.outpoint.vout).unwrap())
      .is_some_and(|outspend| outspend.spent)
    {
      return Err(Error::InscriptionAlreadySpent {
        inscription_id: options.inscription_id,
      });
    }

    let inscription_output = self.output_entry(satpoint.outpoint.txid, satpoint.outpoint.vout)?;

    let inscription_role = match primary {
      AddressType::Taproot => InputRole::TaprootKey {
        internal_key: options.sender_internal_key.ok_or(Error::MissingKey {
          address_type: AddressType::Taproot,
        })?,
      },
      _ => InputRole::SegwitKey,
    };

    let utxos = self.utxo_artifacts(&options.sender_address)?;
    let exclude = inscription_satpoints(&utxos);

    let (fee_payer, fee_candidates, change_address, fee) = if options.pay_fees_with_segwit {
      let fee_key = options
        .segwit_fee_public_key
        .ok_or(Error::InvalidSegwitFeeConfig)?;
      let fee_address = Address::p2wpkh(&CompressedPublicKey(fee_key), self.network());
      let fee_utxos = self.utxo_artifacts(&fee_address)?;
      let fee = fee_rate.fee_with_floor(estimate_virtual_size(2, 1, 3), COLLECTIBLE_SEGWIT_FEE_FLOOR);
      (FeePayer::Segwit, fee_utxos, fee_address, fee)
    } else {
      let internal_key = options.sender_internal_key.ok_or(Error::MissingKey {
        address_type: AddressType::Taproot,
      })?;
      let fee = fee_rate.fee_with_floor(estimate_virtual_size(3, 0, 2), COLLECTIBLE_FEE_FLOOR);
      (
        FeePayer::Taproot { internal_key },
        utxos.clone(),
        options.sender_address.clone(),
        fee,
      )
    };

    let candidates = by_value_descending(&fee_candidates)
      .into_iter()
      .filter(|utxo| utxo.outpoint() != satpoint.outpoint)
      .collect::<Vec<Utxo>>();

    let selection = select_utxos(&candidates, fee, &exclude)?;

    let mut inputs = vec![PlannedInput {
      outpoint: satpoint.outpoint,
      prevout: TxOut {
        value: Amount::from_sat(inscription_output.value),
        script_pubkey: inscription_output.scriptpubkey.clone(),
      },
      role: inscription_role,
    }];

    inputs.extend(
      selection
        .selected
        .iter()
        .map(|utxo| PlannedInput::from_utxo(utxo, fee_payer.input_role())),
    );

    let mut outputs = vec![TxOut {
      value: Amount::from_sat(inscription_output.value),
      script_pubkey: options.receiver_address.script_pubkey(),
    }];

    let change = change_output(selection.total, Amount::ZERO, fee, &change_address)?;
    let change_value = change.as_ref().map(|output| output.value);
    outputs.extend(change);

    let intent = UnsignedPsbtIntent {
      inputs,
      outputs,
      network: self.network(),
    };

    let signed = dispatch(
      intent.into_psbt()?,
      primary,
      options.pay_fees_with_segwit,
      signer,
    )?;
    let (psbt_hex, psbt_base64) = (psbt_hex(&signed), psbt_base64(&signed));
    let push = self.push_signed(signed, false)?;

    Ok(SendOutput {
      txid: push.txid,
      raw_tx: push.raw_tx,
      psbt_hex,
      psbt_base64,
      fee,
      change: change_value,
    })
  }

  /// Build an unsigned purchase of a listed offer. The caller signs and
  /// pushes the returned plan.
  pub fn build_offer_purchase(&self, options: &OfferOptions) -> Result<SwapPlan, Error> {
    let builder = SwapBuilder::new(
      options.taker_address.clone(),
      options.taker_internal_key,
      self.network(),
    )?;

    let utxos = self.utxo_artifacts(&options.taker_address)?;
    let exclude = inscription_satpoints(&utxos);

    builder.build(&options.order, &utxos, &exclude)
  }

  /// Chain a further purchase off the outputs of a prior one.
  pub fn chain_offer_purchase(
    &self,
    options: &OfferOptions,
    previous_txid: Txid,
    remaining: Amount,
  ) -> Result<SwapPlan, Error> {
    let builder = SwapBuilder::new(
      options.taker_address.clone(),
      options.taker_internal_key,
      self.network(),
    )?;

    builder.build_chained(&options.order, previous_txid, remaining)
  }

  /// Split funds into the padding shape marketplace purchases require.
  pub fn prepare_wallet(&self, options: &OfferOptions) -> Result<PreparePlan, Error> {
    let builder = SwapBuilder::new(
      options.taker_address.clone(),
      options.taker_internal_key,
      self.network(),
    )?;

    let utxos = self.utxo_artifacts(&options.taker_address)?;
    let exclude = inscription_satpoints(&utxos);

    builder.prepare(&utxos, &exclude)
  }

  pub fn is_wallet_prepared(&self, address: &Address) -> Result<bool, Error> {
    Ok(SwapBuilder::is_prepared(&self.utxo_artifacts(address)?))
  }

  /// Sign a PSBT with the dispatcher's decision table and finalize it.
  pub fn sign_psbt(
    &self,
    encoded: &EncodedPsbt,
    primary: AddressType,
    pay_fees_with_segwit: bool,
    signer: &Signer,
  ) -> Result<Psbt, Error> {
    dispatch(encoded.parse()?, primary, pay_fees_with_segwit, signer)
  }

  /// Extract the final transaction and broadcast it, pre-checking with the
  /// node's mempool accept test. A rejection fails loudly with the node's
  /// reason; a concurrent build that double-selected a utxo surfaces here.
  pub fn push_psbt(&self, encoded: &EncodedPsbt, dry_run: bool) -> Result<PushOutput, Error> {
    self.push_signed(encoded.parse()?, dry_run)
  }

  pub(crate) fn push_signed(&self, psbt: Psbt, dry_run: bool) -> Result<PushOutput, Error> {
    ensure_finalized(&psbt)?;

    let tx = psbt.extract_tx()?;
    let txid = tx.compute_txid();
    let raw_tx = consensus::encode::serialize_hex(&tx);

    let check = self.node.test_accept(&raw_tx)?;
    if !check.allowed {
      return Err(Error::MempoolRejected {
        reason: check
          .reject_reason
          .unwrap_or_else(|| "rejected by mempool accept test".into()),
      });
    }

    if dry_run {
      log::info!("dry run: transaction {txid} passes the accept test");
      return Ok(PushOutput { txid, raw_tx });
    }

    self.node.send_raw_transaction(&raw_tx)?;

    log::info!("broadcast transaction {txid}");

    Ok(PushOutput { txid, raw_tx })
  }

  pub(crate) fn push_raw(&self, raw_tx: &str) -> Result<Txid, Error> {
    let check = self.node.test_accept(raw_tx)?;
    if !check.allowed {
      return Err(Error::MempoolRejected {
        reason: check
          .reject_reason
          .unwrap_or_else(|| "rejected by mempool accept test".into()),
      });
    }

    Ok(self.node.send_raw_transaction(raw_tx)?)
  }

  /// Poll until the transaction confirms, bounded by the configured attempt
  /// count and interval. The timeout is surfaced, never swallowed: the
  /// caller decides whether to resume with fresh inputs.
  pub fn wait_for_transaction(&self, txid: Txid) -> Result<(), Error> {
    for attempt in 0..self.settings.poll_attempts {
      match self.utxo_source.tx_info(txid) {
        Ok(info) if info.confirmed => {
          log::info!("transaction {txid} confirmed after {attempt} polls");
          return Ok(());
        }
        Ok(_) => {}
        Err(err) => log::debug!("poll {attempt} for {txid}: {err}"),
      }

      thread::sleep(self.settings.poll_interval());
    }

    Err(Error::ConfirmationTimeout { txid })
  }

  pub fn decode_psbt(&self, psbt_base64: &str) -> Result<serde_json::Value, Error> {
    Ok(self.node.decode_psbt(psbt_base64)?)
  }

  fn output_entry(&self, txid: Txid, vout: u32) -> Result<TxOutEntry, Error> {
    self
      .utxo_source
      .tx_info(txid)?
      .vout
      .get(usize::try_from(vout).unwrap())
      .cloned()
      .ok_or_else(|| Error::Client {
        source: anyhow::anyhow!("output {vout} of {txid} not found"),
      })
  }
}
