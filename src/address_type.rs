use super::*;

/// The payment types the engine can spend from and pay to. Closed set:
/// anything else fails classification rather than falling through to a
/// default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
  Legacy,
  NestedSegwit,
  Segwit,
  Taproot,
}

impl AddressType {
  pub fn classify(address: &str, chain: Chain) -> Result<Self, Error> {
    let parsed = address
      .parse::<Address<NetworkUnchecked>>()
      .map_err(|_| Error::UnrecognizedAddress {
        address: address.into(),
      })?
      .require_network(chain.network())
      .map_err(|_| Error::UnrecognizedAddress {
        address: address.into(),
      })?;

    Self::from_address(&parsed)
  }

  pub fn from_address(address: &Address) -> Result<Self, Error> {
    let script = address.script_pubkey();

    if script.is_p2pkh() {
      Ok(Self::Legacy)
    } else if script.is_p2sh() {
      Ok(Self::NestedSegwit)
    } else if script.is_p2wpkh() {
      Ok(Self::Segwit)
    } else if script.is_p2tr() {
      Ok(Self::Taproot)
    } else {
      Err(Error::UnrecognizedAddress {
        address: address.to_string(),
      })
    }
  }

  pub fn is_taproot(self) -> bool {
    self == Self::Taproot
  }
}

impl Display for AddressType {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Legacy => "legacy",
        Self::NestedSegwit => "nested-segwit",
        Self::Segwit => "segwit",
        Self::Taproot => "taproot",
      }
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_mainnet() {
    assert_eq!(
      AddressType::classify("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Chain::Mainnet).unwrap(),
      AddressType::Legacy
    );

    assert_eq!(
      AddressType::classify("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Chain::Mainnet).unwrap(),
      AddressType::Segwit
    );

    assert_eq!(
      AddressType::classify(
        "bc1p5d7rjq7g6rdk2yhzks9smlaqtedr4dekq08ge8ztwac72sfr9rusxg3297",
        Chain::Mainnet
      )
      .unwrap(),
      AddressType::Taproot
    );
  }

  #[test]
  fn classify_nested_segwit() {
    let address = Address::p2sh(&ScriptBuf::new(), Network::Bitcoin).unwrap();

    assert_eq!(
      AddressType::classify(&address.to_string(), Chain::Mainnet).unwrap(),
      AddressType::NestedSegwit
    );
  }

  #[test]
  fn classify_rejects_wrong_network() {
    assert_matches!(
      AddressType::classify("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Chain::Testnet),
      Err(Error::UnrecognizedAddress { .. })
    );
  }

  #[test]
  fn classify_rejects_garbage() {
    assert_matches!(
      AddressType::classify("not an address", Chain::Mainnet),
      Err(Error::UnrecognizedAddress { .. })
    );
  }

  #[test]
  fn classify_testnet() {
    assert_eq!(
      AddressType::classify("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Chain::Testnet).unwrap(),
      AddressType::Segwit
    );
  }

  #[test]
  fn display() {
    assert_eq!(AddressType::NestedSegwit.to_string(), "nested-segwit");
    assert_eq!(AddressType::Taproot.to_string(), "taproot");
  }
}
