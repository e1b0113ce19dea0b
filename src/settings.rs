use super::*;

/// Engine-level tunables. Per-call facts (amounts, fee rates, keys) travel
/// in the option structs; these are the knobs that hold across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub chain: Chain,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub postage: Amount,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub padding: Amount,
  #[serde(with = "bitcoin::amount::serde::as_sat")]
  pub swap_fee_budget: Amount,
  pub poll_interval_secs: u64,
  pub poll_attempts: u32,
  pub fee_target_blocks: u16,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      chain: Chain::Mainnet,
      postage: INSCRIPTION_POSTAGE,
      padding: PADDING_VALUE,
      swap_fee_budget: SWAP_FEE_BUDGET,
      poll_interval_secs: 5,
      poll_attempts: 60,
      fee_target_blocks: 1,
    }
  }
}

impl Settings {
  pub fn new(chain: Chain) -> Self {
    Self {
      chain,
      ..Default::default()
    }
  }

  pub fn network(&self) -> Network {
    self.chain.network()
  }

  pub(crate) fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let settings = Settings::default();

    assert_eq!(settings.chain, Chain::Mainnet);
    assert_eq!(settings.postage, Amount::from_sat(546));
    assert_eq!(settings.padding, Amount::from_sat(600));
    assert_eq!(settings.swap_fee_budget, Amount::from_sat(30_000));
  }

  #[test]
  fn partial_config_fills_defaults() {
    let settings =
      serde_json::from_str::<Settings>(r#"{"chain":"regtest","poll_attempts":3}"#).unwrap();

    assert_eq!(settings.chain, Chain::Regtest);
    assert_eq!(settings.poll_attempts, 3);
    assert_eq!(settings.postage, Amount::from_sat(546));
  }
}
