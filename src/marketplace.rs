use super::*;

/// The maker's pre-signed input sits at this index of the offer PSBT by
/// marketplace convention, and spends output zero of its own transaction.
pub(crate) const MAKER_INPUT_INDEX: usize = 2;

/// The maker's payment sits at this output index of the offer PSBT.
pub(crate) const MAKER_PAYMENT_VOUT: usize = 2;

pub(crate) const PADDING_OUTPUT_COUNT: usize = 2;
pub(crate) const PADDING_RETURN: Amount = Amount::from_sat(1_200);

/// A maker's listed offer: their partially signed PSBT and the asking price.
#[derive(Debug, Clone)]
pub struct SwapOrder {
  pub psbt_base64: String,
  pub price: Amount,
}

#[derive(Debug)]
pub struct SwapPlan {
  pub intent: UnsignedPsbtIntent,
  pub psbt: Psbt,
  pub psbt_hex: String,
  pub psbt_base64: String,
  pub maker_address: Address,
  pub remainder: Amount,
}

#[derive(Debug)]
pub struct PreparePlan {
  pub intent: UnsignedPsbtIntent,
  pub psbt: Psbt,
  pub psbt_hex: String,
  pub psbt_base64: String,
  pub remainder: Amount,
}

/// Builds taker-side purchase transactions against maker offers signed with
/// `SIGHASH_SINGLE | ANYONECANPAY`.
///
/// Output order is load-bearing: the inscription rides the sats between
/// offsets 1200 and 1746, so the first two outputs must be the 1200-sat
/// padding return followed by the 546-sat output that receives it, with the
/// maker's payment third. Chained purchases index outputs 3, 4, and 5 of the
/// previous purchase.
#[derive(Debug)]
pub struct SwapBuilder {
  taker_address: Address,
  taker_internal_key: XOnlyPublicKey,
  taker_script: ScriptBuf,
  network: Network,
}

impl SwapBuilder {
  pub fn new(
    taker_address: Address,
    taker_internal_key: XOnlyPublicKey,
    network: Network,
  ) -> Result<Self, Error> {
    if AddressType::from_address(&taker_address)? != AddressType::Taproot {
      return Err(Error::NotTaproot {
        address: taker_address.to_string(),
      });
    }

    let secp = Secp256k1::new();
    let taker_script = Address::p2tr(&secp, taker_internal_key, None, network).script_pubkey();

    Ok(Self {
      taker_address,
      taker_internal_key,
      taker_script,
      network,
    })
  }

  pub fn required_sats(&self, price: Amount) -> Result<Amount, Error> {
    price
      .checked_add(SWAP_FEE_BUDGET)
      .and_then(|sum| sum.checked_add(DUST_LIMIT))
      .and_then(|sum| sum.checked_add(PADDING_RETURN))
      .ok_or(Error::ValueOverflow)
  }

  pub fn padding_utxos(utxos: &[Utxo]) -> Vec<&Utxo> {
    utxos
      .iter()
      .filter(|utxo| utxo.value == PADDING_VALUE)
      .collect()
  }

  pub fn is_prepared(utxos: &[Utxo]) -> bool {
    Self::padding_utxos(utxos).len() >= PADDING_OUTPUT_COUNT
  }

  pub fn can_afford(
    &self,
    utxos: &[Utxo],
    exclude: &BTreeSet<SatPoint>,
    cost: Amount,
  ) -> bool {
    select_utxos(&by_value_descending(utxos), cost, exclude).is_ok()
  }

  /// Split funds into the two exact-value padding utxos a purchase needs,
  /// plus a remainder. The fee budget is burned whole; the taker tops the
  /// wallet up once and chains purchases afterwards.
  pub fn prepare(&self, utxos: &[Utxo], exclude: &BTreeSet<SatPoint>) -> Result<PreparePlan, Error> {
    let target = SWAP_FEE_BUDGET
      .checked_add(PADDING_RETURN)
      .ok_or(Error::ValueOverflow)?;

    let selection = select_utxos(&by_value_descending(utxos), target, exclude)?;

    let remainder = selection
      .total
      .checked_sub(target)
      .ok_or(Error::ValueOverflow)?;

    let intent = UnsignedPsbtIntent {
      inputs: selection
        .selected
        .iter()
        .map(|utxo| PlannedInput::from_utxo(utxo, self.taker_role()))
        .collect(),
      outputs: vec![
        self.taker_output(PADDING_VALUE),
        self.taker_output(PADDING_VALUE),
        self.taker_output(remainder),
      ],
      network: self.network,
    };

    let psbt = intent.clone().into_psbt()?;

    Ok(PreparePlan {
      psbt_hex: psbt_hex(&psbt),
      psbt_base64: psbt_base64(&psbt),
      psbt,
      intent,
      remainder,
    })
  }

  /// Build a single purchase: two padding inputs, the maker's offer input,
  /// and enough taker value inputs to cover price, fee budget, dust, and the
  /// padding carry.
  pub fn build(
    &self,
    order: &SwapOrder,
    utxos: &[Utxo],
    exclude: &BTreeSet<SatPoint>,
  ) -> Result<SwapPlan, Error> {
    let required = self.required_sats(order.price)?;

    let padding = Self::padding_utxos(utxos);
    if padding.len() < PADDING_OUTPUT_COUNT {
      return Err(Error::WalletNotPrepared);
    }
    let padding = [padding[0].clone(), padding[1].clone()];

    let padding_outpoints = padding
      .iter()
      .map(Utxo::outpoint)
      .collect::<BTreeSet<OutPoint>>();

    let candidates = by_value_descending(utxos)
      .into_iter()
      .filter(|utxo| !padding_outpoints.contains(&utxo.outpoint()))
      .collect::<Vec<Utxo>>();

    let selection = select_utxos(&candidates, required, exclude)?;

    let maker_psbt = psbt_from_base64(&order.psbt_base64)?;
    let maker_address = self.maker_address(&maker_psbt, order.price)?;
    let maker_input = Self::maker_input(&maker_psbt)?;

    log::info!(
      "swap pays {} to {maker_address} with {} value inputs",
      order.price,
      selection.selected.len(),
    );

    let mut inputs = padding
      .iter()
      .map(|utxo| PlannedInput::from_utxo(utxo, self.taker_role()))
      .collect::<Vec<PlannedInput>>();

    inputs.push(maker_input);

    inputs.extend(
      selection
        .selected
        .iter()
        .map(|utxo| PlannedInput::from_utxo(utxo, self.taker_role())),
    );

    let remainder = self.remainder(selection.total, order.price)?;

    let intent = UnsignedPsbtIntent {
      inputs,
      outputs: vec![
        self.taker_output(PADDING_RETURN),
        self.taker_output(DUST_LIMIT),
        TxOut {
          value: order.price,
          script_pubkey: maker_address.script_pubkey(),
        },
        self.taker_output(PADDING_VALUE),
        self.taker_output(PADDING_VALUE),
        self.taker_output(remainder),
      ],
      network: self.network,
    };

    let psbt = intent.clone().into_psbt()?;

    Ok(SwapPlan {
      psbt_hex: psbt_hex(&psbt),
      psbt_base64: psbt_base64(&psbt),
      psbt,
      intent,
      maker_address,
      remainder,
    })
  }

  /// Chain a further purchase off the outputs of a prior one in the same
  /// session: outputs 3 and 4 are the padding pair, output 5 the spendable
  /// remainder.
  pub fn build_chained(
    &self,
    order: &SwapOrder,
    previous_txid: Txid,
    remaining: Amount,
  ) -> Result<SwapPlan, Error> {
    let required = self.required_sats(order.price)?;

    if remaining <= required {
      return Err(Error::InsufficientFunds {
        required,
        available: remaining,
      });
    }

    let maker_psbt = psbt_from_base64(&order.psbt_base64)?;
    let maker_address = self.maker_address(&maker_psbt, order.price)?;
    let maker_input = Self::maker_input(&maker_psbt)?;

    let payment = maker_psbt
      .unsigned_tx
      .output
      .get(MAKER_PAYMENT_VOUT)
      .ok_or_else(|| Error::InvalidOffer {
        reason: "offer psbt has no payment output".into(),
      })?
      .value;

    let previous = |vout: u32, value: Amount| PlannedInput {
      outpoint: OutPoint {
        txid: previous_txid,
        vout,
      },
      prevout: TxOut {
        value,
        script_pubkey: self.taker_script.clone(),
      },
      role: self.taker_role(),
    };

    let inputs = vec![
      previous(3, PADDING_VALUE),
      previous(4, PADDING_VALUE),
      maker_input,
      previous(5, remaining),
    ];

    let remainder = self.remainder(remaining, payment)?;

    let intent = UnsignedPsbtIntent {
      inputs,
      outputs: vec![
        self.taker_output(PADDING_RETURN),
        self.taker_output(DUST_LIMIT),
        TxOut {
          value: payment,
          script_pubkey: maker_address.script_pubkey(),
        },
        self.taker_output(PADDING_VALUE),
        self.taker_output(PADDING_VALUE),
        self.taker_output(remainder),
      ],
      network: self.network,
    };

    let psbt = intent.clone().into_psbt()?;

    Ok(SwapPlan {
      psbt_hex: psbt_hex(&psbt),
      psbt_base64: psbt_base64(&psbt),
      psbt,
      intent,
      maker_address,
      remainder,
    })
  }

  /// The offer format carries no explicit payout index, so the maker's
  /// payout is located by scanning the decoded offer for the output whose
  /// value equals the order price. A change output that happens to equal the
  /// price makes this ambiguous, so zero or multiple matches are an error
  /// rather than a guess.
  pub fn maker_address(&self, maker_psbt: &Psbt, price: Amount) -> Result<Address, Error> {
    let matches = maker_psbt
      .unsigned_tx
      .output
      .iter()
      .filter(|output| output.value == price)
      .collect::<Vec<&TxOut>>();

    let [output] = matches.as_slice() else {
      return Err(Error::MakerAddressUnresolved {
        matches: matches.len(),
      });
    };

    Ok(Address::from_script(&output.script_pubkey, self.network)?)
  }

  fn maker_input(maker_psbt: &Psbt) -> Result<PlannedInput, Error> {
    let tx_in = maker_psbt
      .unsigned_tx
      .input
      .get(MAKER_INPUT_INDEX)
      .ok_or_else(|| Error::InvalidOffer {
        reason: format!(
          "offer psbt has {} inputs, expected at least {}",
          maker_psbt.unsigned_tx.input.len(),
          MAKER_INPUT_INDEX + 1
        ),
      })?;

    let data = &maker_psbt.inputs[MAKER_INPUT_INDEX];

    let prevout = data
      .witness_utxo
      .clone()
      .ok_or_else(|| Error::InvalidOffer {
        reason: "offer input carries no witness utxo".into(),
      })?;

    Ok(PlannedInput {
      outpoint: OutPoint {
        txid: tx_in.previous_output.txid,
        vout: 0,
      },
      prevout,
      role: InputRole::MakerOffer {
        internal_key: data.tap_internal_key,
        key_sig: data.tap_key_sig,
      },
    })
  }

  fn remainder(&self, available: Amount, payment: Amount) -> Result<Amount, Error> {
    available
      .checked_sub(payment)
      .and_then(|rest| rest.checked_sub(SWAP_FEE_BUDGET))
      .and_then(|rest| rest.checked_sub(DUST_LIMIT))
      .and_then(|rest| rest.checked_sub(PADDING_RETURN))
      .ok_or(Error::ValueOverflow)
  }

  fn taker_role(&self) -> InputRole {
    InputRole::TaprootKey {
      internal_key: self.taker_internal_key,
    }
  }

  fn taker_output(&self, value: Amount) -> TxOut {
    TxOut {
      value,
      script_pubkey: self.taker_address.script_pubkey(),
    }
  }
}
