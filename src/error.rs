use super::*;

#[derive(Debug)]
pub enum Error {
  Client {
    source: anyhow::Error,
  },
  ConfirmationTimeout {
    txid: Txid,
  },
  Dust {
    output_value: Amount,
  },
  Extract(bitcoin::psbt::ExtractTxError),
  InscriptionAlreadySpent {
    inscription_id: InscriptionId,
  },
  InscriptionNotOwned {
    inscription_id: InscriptionId,
  },
  InsufficientFunds {
    required: Amount,
    available: Amount,
  },
  InvalidAddress(bitcoin::address::FromScriptError),
  InvalidOffer {
    reason: String,
  },
  InvalidSegwitFeeConfig,
  MakerAddressUnresolved {
    matches: usize,
  },
  MempoolRejected {
    reason: String,
  },
  MissingKey {
    address_type: AddressType,
  },
  NotTaproot {
    address: String,
  },
  Psbt(bitcoin::psbt::Error),
  Secp(secp256k1::Error),
  SegwitSighash(bitcoin::sighash::P2wpkhError),
  SigningIncomplete {
    index: usize,
  },
  TaprootSighash(bitcoin::sighash::TaprootError),
  UnrecognizedAddress {
    address: String,
  },
  ValueOverflow,
  WalletNotPrepared,
}

impl Display for Error {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Client { source } => write!(f, "client error: {source}"),
      Self::ConfirmationTimeout { txid } => {
        write!(f, "timed out waiting for transaction {txid} to confirm")
      }
      Self::Dust { output_value } => {
        write!(f, "output value {output_value} is below the dust limit")
      }
      Self::Extract(source) => write!(f, "failed to extract transaction: {source}"),
      Self::InscriptionAlreadySpent { inscription_id } => {
        write!(f, "inscription {inscription_id} has already been spent")
      }
      Self::InscriptionNotOwned { inscription_id } => {
        write!(f, "inscription {inscription_id} does not belong to the sender")
      }
      Self::InsufficientFunds {
        required,
        available,
      } => write!(
        f,
        "insufficient funds: {required} required but only {available} available"
      ),
      Self::InvalidAddress(source) => write!(f, "invalid address: {source}"),
      Self::InvalidOffer { reason } => write!(f, "invalid offer: {reason}"),
      Self::InvalidSegwitFeeConfig => write!(
        f,
        "paying fees with segwit requires a segwit fee public key"
      ),
      Self::MakerAddressUnresolved { matches } => write!(
        f,
        "could not resolve maker's address: {matches} outputs match the order price"
      ),
      Self::MempoolRejected { reason } => write!(f, "transaction rejected by mempool: {reason}"),
      Self::MissingKey { address_type } => {
        write!(f, "no {address_type} key available for signing")
      }
      Self::NotTaproot { address } => {
        write!(f, "address {address} is not a taproot address")
      }
      Self::Psbt(source) => write!(f, "psbt error: {source}"),
      Self::Secp(source) => write!(f, "secp256k1 error: {source}"),
      Self::SegwitSighash(source) => write!(f, "segwit sighash error: {source}"),
      Self::SigningIncomplete { index } => {
        write!(f, "input {index} is not signed")
      }
      Self::TaprootSighash(source) => write!(f, "taproot sighash error: {source}"),
      Self::UnrecognizedAddress { address } => write!(f, "unrecognized address: {address}"),
      Self::ValueOverflow => write!(f, "arithmetic overflow calculating value"),
      Self::WalletNotPrepared => write!(
        f,
        "wallet is not prepared: at least two padding utxos are required"
      ),
    }
  }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
  fn from(source: anyhow::Error) -> Self {
    Self::Client { source }
  }
}

impl From<bitcoin::address::FromScriptError> for Error {
  fn from(source: bitcoin::address::FromScriptError) -> Self {
    Self::InvalidAddress(source)
  }
}

impl From<bitcoin::psbt::Error> for Error {
  fn from(source: bitcoin::psbt::Error) -> Self {
    Self::Psbt(source)
  }
}

impl From<bitcoin::psbt::ExtractTxError> for Error {
  fn from(source: bitcoin::psbt::ExtractTxError) -> Self {
    Self::Extract(source)
  }
}

impl From<bitcoin::sighash::P2wpkhError> for Error {
  fn from(source: bitcoin::sighash::P2wpkhError) -> Self {
    Self::SegwitSighash(source)
  }
}

impl From<bitcoin::sighash::TaprootError> for Error {
  fn from(source: bitcoin::sighash::TaprootError) -> Self {
    Self::TaprootSighash(source)
  }
}

impl From<secp256k1::Error> for Error {
  fn from(source: secp256k1::Error) -> Self {
    Self::Secp(source)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display() {
    assert_eq!(
      Error::InsufficientFunds {
        required: Amount::from_sat(1000),
        available: Amount::from_sat(500),
      }
      .to_string(),
      "insufficient funds: 0.00001 BTC required but only 0.000005 BTC available"
    );

    assert_eq!(
      Error::MempoolRejected {
        reason: "txn-mempool-conflict".into()
      }
      .to_string(),
      "transaction rejected by mempool: txn-mempool-conflict"
    );

    assert_eq!(
      Error::MakerAddressUnresolved { matches: 2 }.to_string(),
      "could not resolve maker's address: 2 outputs match the order price"
    );
  }
}
