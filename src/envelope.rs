use super::*;

/// The taproot envelope committing to an inscription payload.
///
/// Derivation is a pure function of the public key and the content: the
/// reveal step reconstructs the leaf script from the same inputs, and any
/// divergence would make the reveal input fail script validation against the
/// commit output.
#[derive(Debug, Clone)]
pub struct InscriptionEnvelope {
  pub public_key: XOnlyPublicKey,
  pub media_type: String,
  pub body: Vec<u8>,
  pub leaf_script: ScriptBuf,
  pub control_block: ControlBlock,
  pub commit_address: Address,
}

impl InscriptionEnvelope {
  pub fn new(public_key: XOnlyPublicKey, media_type: &str, body: &[u8], network: Network) -> Self {
    let leaf_script = Self::reveal_script(public_key, media_type, body);

    let secp = Secp256k1::new();

    let taproot_spend_info = TaprootBuilder::new()
      .add_leaf(0, leaf_script.clone())
      .expect("adding leaf should work")
      .finalize(&secp, public_key)
      .expect("finalizing taproot builder should work");

    let control_block = taproot_spend_info
      .control_block(&(leaf_script.clone(), LeafVersion::TapScript))
      .expect("should compute control block");

    let commit_address = Address::p2tr_tweaked(taproot_spend_info.output_key(), network);

    Self {
      public_key,
      media_type: media_type.into(),
      body: body.into(),
      leaf_script,
      control_block,
      commit_address,
    }
  }

  fn reveal_script(public_key: XOnlyPublicKey, media_type: &str, body: &[u8]) -> ScriptBuf {
    let mut builder = script::Builder::new()
      .push_slice(public_key.serialize())
      .push_opcode(opcodes::all::OP_CHECKSIG)
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(PROTOCOL_ID)
      .push_slice(CONTENT_TYPE_TAG)
      .push_slice::<&script::PushBytes>(
        media_type
          .as_bytes()
          .try_into()
          .expect("media type within push limit"),
      )
      .push_opcode(opcodes::OP_FALSE);

    for chunk in body.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
      builder = builder.push_slice::<&script::PushBytes>(chunk.try_into().unwrap());
    }

    builder.push_opcode(opcodes::all::OP_ENDIF).into_script()
  }

  pub fn tapleaf_hash(&self) -> TapLeafHash {
    TapLeafHash::from_script(&self.leaf_script, LeafVersion::TapScript)
  }

  pub fn commit_script_pubkey(&self) -> ScriptBuf {
    self.commit_address.script_pubkey()
  }
}
