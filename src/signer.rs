use super::*;

/// Signs and finalizes PSBT inputs. Holds raw keypairs only: derivation and
/// keyring management live with the caller.
pub struct Signer {
  secp: Secp256k1<secp256k1::All>,
  network: Network,
  taproot_keypair: Option<Keypair>,
  segwit_keypair: Option<Keypair>,
}

impl Signer {
  pub fn new(
    network: Network,
    taproot_keypair: Option<Keypair>,
    segwit_keypair: Option<Keypair>,
  ) -> Self {
    Self {
      secp: Secp256k1::new(),
      network,
      taproot_keypair,
      segwit_keypair,
    }
  }

  pub fn from_secret_bytes(
    network: Network,
    taproot_secret: Option<&[u8]>,
    segwit_secret: Option<&[u8]>,
  ) -> Result<Self, Error> {
    let secp = Secp256k1::new();

    let taproot_keypair = taproot_secret
      .map(|secret| Keypair::from_seckey_slice(&secp, secret))
      .transpose()?;

    let segwit_keypair = segwit_secret
      .map(|secret| Keypair::from_seckey_slice(&secp, secret))
      .transpose()?;

    Ok(Self {
      secp,
      network,
      taproot_keypair,
      segwit_keypair,
    })
  }

  pub fn network(&self) -> Network {
    self.network
  }

  pub fn taproot_keypair(&self) -> Result<&Keypair, Error> {
    self.taproot_keypair.as_ref().ok_or(Error::MissingKey {
      address_type: AddressType::Taproot,
    })
  }

  pub fn has_segwit_key(&self) -> bool {
    self.segwit_keypair.is_some()
  }

  pub fn taproot_internal_key(&self) -> Result<XOnlyPublicKey, Error> {
    Ok(XOnlyPublicKey::from_keypair(self.taproot_keypair()?).0)
  }

  pub fn taproot_address(&self) -> Result<Address, Error> {
    Ok(Address::p2tr(
      &self.secp,
      self.taproot_internal_key()?,
      None,
      self.network,
    ))
  }

  pub fn segwit_public_key(&self) -> Result<secp256k1::PublicKey, Error> {
    Ok(
      self
        .segwit_keypair
        .as_ref()
        .ok_or(Error::MissingKey {
          address_type: AddressType::Segwit,
        })?
        .public_key(),
    )
  }

  pub fn segwit_address(&self) -> Result<Address, Error> {
    Ok(Address::p2wpkh(
      &CompressedPublicKey(self.segwit_public_key()?),
      self.network,
    ))
  }

  /// Sign every taproot key path input this signer can satisfy. The keypair
  /// is tweaked per BIP341 before signing; inputs carrying tap scripts are
  /// script path spends and are left untouched. Imported maker signatures
  /// are finalized as-is.
  pub fn sign_all_taproot_inputs(&self, psbt: &mut Psbt, finalize: bool) -> Result<usize, Error> {
    let keypair = self.taproot_keypair()?;
    let tweaked = keypair.tap_tweak(&self.secp, None);
    let internal_key = XOnlyPublicKey::from_keypair(keypair).0;

    let prevouts = prevouts(psbt)?;
    let unsigned_tx = psbt.unsigned_tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx);
    let mut signed = 0;

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
      if input.final_script_witness.is_some()
        || !prevouts[index].script_pubkey.is_p2tr()
        || !input.tap_scripts.is_empty()
      {
        continue;
      }

      if let Some(key_sig) = input.tap_key_sig {
        if finalize {
          input.final_script_witness = Some(Witness::from_slice(&[key_sig.to_vec()]));
        }
        signed += 1;
        continue;
      }

      if input.tap_internal_key != Some(internal_key) {
        continue;
      }

      let sighash = sighash_cache.taproot_key_spend_signature_hash(
        index,
        &Prevouts::All(&prevouts),
        TapSighashType::Default,
      )?;

      let signature = taproot::Signature {
        signature: self.secp.sign_schnorr(
          &Message::from_digest_slice(sighash.as_ref())?,
          &tweaked.to_inner(),
        ),
        sighash_type: TapSighashType::Default,
      };

      if finalize {
        input.final_script_witness = Some(Witness::from_slice(&[signature.to_vec()]));
      } else {
        input.tap_key_sig = Some(signature);
      }

      signed += 1;
    }

    log::debug!("signed {signed} taproot inputs");

    Ok(signed)
  }

  /// Sign every p2wpkh input paying to this signer's segwit key.
  pub fn sign_all_segwit_inputs(&self, psbt: &mut Psbt, finalize: bool) -> Result<usize, Error> {
    let keypair = self.segwit_keypair.as_ref().ok_or(Error::MissingKey {
      address_type: AddressType::Segwit,
    })?;

    let public_key = keypair.public_key();
    let script_pubkey = ScriptBuf::new_p2wpkh(&CompressedPublicKey(public_key).wpubkey_hash());

    let prevouts = prevouts(psbt)?;
    let unsigned_tx = psbt.unsigned_tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx);
    let mut signed = 0;

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
      if input.final_script_witness.is_some() || prevouts[index].script_pubkey != script_pubkey {
        continue;
      }

      let sighash = sighash_cache.p2wpkh_signature_hash(
        index,
        &prevouts[index].script_pubkey,
        prevouts[index].value,
        EcdsaSighashType::All,
      )?;

      let signature = ecdsa::Signature {
        signature: self.secp.sign_ecdsa(
          &Message::from_digest_slice(sighash.as_ref())?,
          &keypair.secret_key(),
        ),
        sighash_type: EcdsaSighashType::All,
      };

      if finalize {
        input.final_script_witness = Some(Witness::p2wpkh(&signature, &public_key));
      } else {
        input
          .partial_sigs
          .insert(bitcoin::PublicKey::new(public_key), signature);
      }

      signed += 1;
    }

    log::debug!("signed {signed} segwit inputs");

    Ok(signed)
  }

  /// Schnorr-sign an arbitrary 32-byte digest with the untweaked taproot
  /// key. Marketplace offer flows use this to attest ownership off chain.
  pub fn sign_message(&self, digest: [u8; 32]) -> Result<secp256k1::schnorr::Signature, Error> {
    Ok(
      self
        .secp
        .sign_schnorr(&Message::from_digest_slice(&digest)?, self.taproot_keypair()?),
    )
  }
}

fn prevouts(psbt: &Psbt) -> Result<Vec<TxOut>, Error> {
  psbt
    .inputs
    .iter()
    .enumerate()
    .map(|(index, input)| {
      input
        .witness_utxo
        .clone()
        .ok_or(Error::SigningIncomplete { index })
    })
    .collect()
}

/// Route a PSBT to the signing routines its input mix requires, then check
/// that no input was left behind. An unsigned input at broadcast time is a
/// fatal error, never a retry.
///
/// | pay fees with segwit | primary type | action                    |
/// |----------------------|--------------|---------------------------|
/// | true                 | any          | taproot then segwit       |
/// | false                | segwit       | segwit only               |
/// | false                | taproot      | taproot only              |
pub fn dispatch(
  mut psbt: Psbt,
  primary: AddressType,
  pay_fees_with_segwit: bool,
  signer: &Signer,
) -> Result<Psbt, Error> {
  if pay_fees_with_segwit && !signer.has_segwit_key() {
    return Err(Error::InvalidSegwitFeeConfig);
  }

  if pay_fees_with_segwit {
    signer.sign_all_taproot_inputs(&mut psbt, true)?;
    signer.sign_all_segwit_inputs(&mut psbt, true)?;
  } else {
    match primary {
      AddressType::Legacy | AddressType::NestedSegwit | AddressType::Segwit => {
        signer.sign_all_segwit_inputs(&mut psbt, true)?;
      }
      AddressType::Taproot => {
        signer.sign_all_taproot_inputs(&mut psbt, true)?;
      }
    }
  }

  ensure_finalized(&psbt)?;

  Ok(psbt)
}

pub fn ensure_finalized(psbt: &Psbt) -> Result<(), Error> {
  for (index, input) in psbt.inputs.iter().enumerate() {
    if input.final_script_witness.is_none() && input.final_script_sig.is_none() {
      return Err(Error::SigningIncomplete { index });
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn signer() -> Signer {
    Signer::new(Network::Bitcoin, Some(keypair(1)), Some(keypair(2)))
  }

  fn taproot_intent(signer: &Signer) -> UnsignedPsbtIntent {
    let address = signer.taproot_address().unwrap();

    UnsignedPsbtIntent {
      inputs: vec![PlannedInput::from_utxo(
        &utxo(1, 10_000, address),
        InputRole::TaprootKey {
          internal_key: signer.taproot_internal_key().unwrap(),
        },
      )],
      outputs: vec![TxOut {
        value: Amount::from_sat(9_000),
        script_pubkey: recipient().script_pubkey(),
      }],
      network: Network::Bitcoin,
    }
  }

  #[test]
  fn taproot_key_path_inputs_are_signed_and_finalized() {
    let signer = signer();
    let psbt = taproot_intent(&signer).into_psbt().unwrap();

    let signed = dispatch(psbt, AddressType::Taproot, false, &signer).unwrap();

    let witness = signed.inputs[0].final_script_witness.as_ref().unwrap();
    assert_eq!(witness.len(), 1);
    assert_eq!(
      witness.iter().next().unwrap().len(),
      SCHNORR_SIGNATURE_SIZE,
      "default sighash type omits the sighash byte"
    );
  }

  #[test]
  fn segwit_inputs_are_signed_and_finalized() {
    let signer = signer();
    let address = signer.segwit_address().unwrap();

    let psbt = UnsignedPsbtIntent {
      inputs: vec![PlannedInput::from_utxo(
        &utxo(1, 10_000, address),
        InputRole::SegwitKey,
      )],
      outputs: vec![TxOut {
        value: Amount::from_sat(9_000),
        script_pubkey: recipient().script_pubkey(),
      }],
      network: Network::Bitcoin,
    }
    .into_psbt()
    .unwrap();

    let signed = dispatch(psbt, AddressType::Segwit, false, &signer).unwrap();

    let witness = signed.inputs[0].final_script_witness.as_ref().unwrap();
    assert_eq!(witness.len(), 2);
  }

  #[test]
  fn mixed_psbt_signs_taproot_then_segwit() {
    let signer = signer();

    let psbt = UnsignedPsbtIntent {
      inputs: vec![
        PlannedInput::from_utxo(
          &utxo(1, 10_000, signer.taproot_address().unwrap()),
          InputRole::TaprootKey {
            internal_key: signer.taproot_internal_key().unwrap(),
          },
        ),
        PlannedInput::from_utxo(
          &utxo(2, 5_000, signer.segwit_address().unwrap()),
          InputRole::SegwitKey,
        ),
      ],
      outputs: vec![TxOut {
        value: Amount::from_sat(14_000),
        script_pubkey: recipient().script_pubkey(),
      }],
      network: Network::Bitcoin,
    }
    .into_psbt()
    .unwrap();

    let signed = dispatch(psbt, AddressType::Taproot, true, &signer).unwrap();

    assert!(signed.inputs[0].final_script_witness.is_some());
    assert!(signed.inputs[1].final_script_witness.is_some());
  }

  #[test]
  fn fee_via_segwit_without_key_is_rejected() {
    let signer = Signer::new(Network::Bitcoin, Some(keypair(1)), None);
    let psbt = taproot_intent(&signer).into_psbt().unwrap();

    assert_matches!(
      dispatch(psbt, AddressType::Taproot, true, &signer),
      Err(Error::InvalidSegwitFeeConfig)
    );
  }

  #[test]
  fn unsigned_inputs_are_fatal() {
    let signer = signer();

    let psbt = UnsignedPsbtIntent {
      inputs: vec![PlannedInput::from_utxo(
        &utxo(1, 10_000, taproot_address(9)),
        InputRole::TaprootKey {
          internal_key: internal_key(9),
        },
      )],
      outputs: vec![TxOut {
        value: Amount::from_sat(9_000),
        script_pubkey: recipient().script_pubkey(),
      }],
      network: Network::Bitcoin,
    }
    .into_psbt()
    .unwrap();

    assert_matches!(
      dispatch(psbt, AddressType::Taproot, false, &signer),
      Err(Error::SigningIncomplete { index: 0 })
    );
  }

  #[test]
  fn script_path_inputs_are_never_tweak_signed() {
    let signer = signer();

    let envelope = InscriptionEnvelope::new(
      signer.taproot_internal_key().unwrap(),
      "text/plain;charset=utf-8",
      b"hello",
      Network::Bitcoin,
    );

    let mut psbt = UnsignedPsbtIntent {
      inputs: vec![PlannedInput {
        outpoint: outpoint(1),
        prevout: TxOut {
          value: Amount::from_sat(1_000),
          script_pubkey: envelope.commit_script_pubkey(),
        },
        role: InputRole::TaprootScript {
          leaf_script: envelope.leaf_script.clone(),
          control_block: envelope.control_block.clone(),
        },
      }],
      outputs: vec![TxOut {
        value: Amount::from_sat(546),
        script_pubkey: recipient().script_pubkey(),
      }],
      network: Network::Bitcoin,
    }
    .into_psbt()
    .unwrap();

    assert_eq!(
      signer.sign_all_taproot_inputs(&mut psbt, true).unwrap(),
      0,
      "script path spends are not key path signed"
    );
  }

  #[test]
  fn sign_message_round_trips() {
    let signer = signer();
    let digest = [7; 32];

    let signature = signer.sign_message(digest).unwrap();

    let secp = Secp256k1::new();
    assert!(secp
      .verify_schnorr(
        &signature,
        &Message::from_digest_slice(&digest).unwrap(),
        &signer.taproot_internal_key().unwrap(),
      )
      .is_ok());
  }
}
