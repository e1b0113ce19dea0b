#![allow(
  clippy::large_enum_variant,
  clippy::result_large_err,
  clippy::too_many_arguments,
  clippy::type_complexity
)]
#![deny(
  clippy::cast_lossless,
  clippy::cast_possible_truncation,
  clippy::cast_possible_wrap,
  clippy::cast_sign_loss
)]

use {
  self::fee_rate::{dummy_p2tr_script, SCHNORR_SIGNATURE_SIZE},
  bitcoin::{
    address::{Address, NetworkUnchecked},
    blockdata::{
      constants::MAX_SCRIPT_ELEMENT_SIZE, locktime::absolute::LockTime, opcodes, script,
    },
    consensus, ecdsa,
    hashes::Hash,
    key::{Keypair, TapTweak},
    psbt::Psbt,
    secp256k1::{self, Message, Secp256k1, XOnlyPublicKey},
    sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType},
    taproot::{self, ControlBlock, LeafVersion, TapLeafHash, TaprootBuilder},
    transaction::Version,
    Amount, CompressedPublicKey, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
  },
  serde::{Deserialize, Serialize},
  serde_with::{DeserializeFromStr, SerializeDisplay},
  std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
    num::ParseIntError,
    str::FromStr,
    thread,
    time::Duration,
  },
};

pub use self::{
  address_type::AddressType,
  brc20::Brc20Transfer,
  chain::Chain,
  client::{
    AcceptCheck, InscriptionDetails, InscriptionIndex, NodeClient, OutSpend, TxInfo, TxOutEntry,
    UtxoEntry, UtxoSource,
  },
  envelope::InscriptionEnvelope,
  error::Error,
  fee_rate::{estimate_virtual_size, FeeRate},
  inscribe::{
    build_commit, build_reveal, build_transfer_send, reveal_fee, CommitPlan, InscribeState,
    RevealPlan, TransferPlan,
  },
  inscription_id::InscriptionId,
  marketplace::{PreparePlan, SwapBuilder, SwapOrder, SwapPlan},
  options::{Brc20TransferOptions, CollectibleSendOptions, OfferOptions, SendOptions},
  psbt_builder::{
    change_output, psbt_base64, psbt_from_base64, psbt_from_hex, psbt_hex, FeePayer, InputRole,
    PlannedInput, UnsignedPsbtIntent,
  },
  sat_point::SatPoint,
  selection::{by_value_descending, select_utxos, Selection},
  settings::Settings,
  signer::{dispatch, ensure_finalized, Signer},
  utxo::{calculate_balance, inscription_satpoints, InscriptionRef, Utxo},
  wallet::{Brc20Output, EncodedPsbt, PushOutput, SendOutput, Wallet},
};

#[cfg(test)]
#[macro_use]
mod test;

#[cfg(test)]
use self::test::*;

mod address_type;
mod brc20;
mod chain;
mod client;
mod envelope;
mod error;
mod fee_rate;
mod inscribe;
mod inscription_id;
mod marketplace;
mod options;
mod psbt_builder;
mod sat_point;
mod selection;
mod settings;
mod signer;
mod utxo;
mod wallet;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Outputs at or below this value are uneconomical to spend and nonstandard
/// to relay; it doubles as the carrier value for inscribed sats.
pub const DUST_LIMIT: Amount = Amount::from_sat(546);

/// The value riding under an inscription through the commit/reveal flow.
pub const INSCRIPTION_POSTAGE: Amount = Amount::from_sat(546);

/// Marketplace purchases consume exactly two utxos of this value to place
/// the traded inscription at a known sat offset.
pub const PADDING_VALUE: Amount = Amount::from_sat(600);

/// The network fee budget a marketplace purchase sets aside.
pub const SWAP_FEE_BUDGET: Amount = Amount::from_sat(30_000);

pub(crate) const PROTOCOL_ID: [u8; 3] = *b"ord";
pub(crate) const CONTENT_TYPE_TAG: [u8; 1] = [1];

pub fn base64_encode(data: &[u8]) -> String {
  use base64::Engine;
  base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn base64_decode(s: &str) -> anyhow::Result<Vec<u8>> {
  use base64::Engine;
  Ok(base64::engine::general_purpose::STANDARD.decode(s)?)
}
