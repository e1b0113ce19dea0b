pub(crate) use {super::*, pretty_assertions::assert_eq as pretty_assert_eq};

macro_rules! assert_matches {
  ($expression:expr, $( $pattern:pat_param )|+ $( if $guard:expr )? $(,)?) => {
    match $expression {
      $( $pattern )|+ $( if $guard )? => {}
      left => panic!(
        "assertion failed: (left ~= right)\n  left: `{:?}`\n right: `{}`",
        left,
        stringify!($($pattern)|+ $(if $guard)?)
      ),
    }
  }
}

pub(crate) fn txid(n: u64) -> Txid {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  hex.repeat(64).parse().unwrap()
}

pub(crate) fn outpoint(n: u64) -> OutPoint {
  format!("{}:{}", txid(n), n).parse().unwrap()
}

pub(crate) fn satpoint(n: u64, offset: u64) -> SatPoint {
  SatPoint {
    outpoint: outpoint(n),
    offset,
  }
}

pub(crate) fn inscription_id(n: u32) -> InscriptionId {
  let hex = format!("{n:x}");

  if hex.is_empty() || hex.len() > 1 {
    panic!();
  }

  format!("{}i{n}", hex.repeat(64)).parse().unwrap()
}

pub(crate) fn recipient() -> Address {
  "bc1p5d7rjq7g6rdk2yhzks9smlaqtedr4dekq08ge8ztwac72sfr9rusxg3297"
    .parse::<Address<NetworkUnchecked>>()
    .unwrap()
    .assume_checked()
}

pub(crate) fn keypair(n: u8) -> Keypair {
  Keypair::from_seckey_slice(&Secp256k1::new(), &[n; 32]).unwrap()
}

pub(crate) fn internal_key(n: u8) -> XOnlyPublicKey {
  XOnlyPublicKey::from_keypair(&keypair(n)).0
}

pub(crate) fn taproot_address(n: u8) -> Address {
  Address::p2tr(&Secp256k1::new(), internal_key(n), None, Network::Bitcoin)
}

pub(crate) fn segwit_address(n: u8) -> Address {
  Address::p2wpkh(&CompressedPublicKey(keypair(n).public_key()), Network::Bitcoin)
}

pub(crate) fn utxo(n: u64, value: u64, address: Address) -> Utxo {
  let address_type = AddressType::from_address(&address).unwrap();

  Utxo {
    txid: txid(n),
    vout: u32::try_from(n).unwrap(),
    value: Amount::from_sat(value),
    script_pubkey: address.script_pubkey(),
    confirmations: 3,
    address,
    address_type,
    inscriptions: Vec::new(),
  }
}
