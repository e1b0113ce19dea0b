use super::*;

/// Options for a plain value transfer. Everything a build needs arrives
/// here explicitly; there are no ambient defaults.
#[derive(Debug, Clone)]
pub struct SendOptions {
  pub sender_address: Address,
  pub receiver_address: Address,
  pub sender_internal_key: Option<XOnlyPublicKey>,
  pub amount: Amount,
  pub fee_rate: Option<FeeRate>,
  pub pay_fees_with_segwit: bool,
  pub segwit_fee_public_key: Option<secp256k1::PublicKey>,
}

/// Options for a BRC-20 transfer inscription. The inscribed payload is
/// derived from `ticker` and `amount`; the envelope key is the signer's
/// taproot key.
#[derive(Debug, Clone)]
pub struct Brc20TransferOptions {
  pub sender_address: Address,
  pub receiver_address: Address,
  pub ticker: String,
  pub amount: String,
  pub fee_rate: Option<FeeRate>,
  pub pay_fees_with_segwit: bool,
  pub segwit_fee_public_key: Option<secp256k1::PublicKey>,
}

#[derive(Debug, Clone)]
pub struct CollectibleSendOptions {
  pub inscription_id: InscriptionId,
  pub sender_address: Address,
  pub receiver_address: Address,
  pub sender_internal_key: Option<XOnlyPublicKey>,
  pub fee_rate: Option<FeeRate>,
  pub pay_fees_with_segwit: bool,
  pub segwit_fee_public_key: Option<secp256k1::PublicKey>,
}

/// Options for a marketplace purchase.
#[derive(Debug, Clone)]
pub struct OfferOptions {
  pub taker_address: Address,
  pub taker_internal_key: XOnlyPublicKey,
  pub order: SwapOrder,
}
