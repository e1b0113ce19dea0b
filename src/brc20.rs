use super::*;

/// The BRC-20 transfer payload inscribed during the commit/reveal flow.
/// Field order matters: indexers match on the exact serialized form, so the
/// struct declaration order is part of the protocol surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20Transfer {
  pub p: String,
  pub op: String,
  pub tick: String,
  pub amt: String,
}

impl Brc20Transfer {
  pub const MEDIA_TYPE: &'static str = "text/plain;charset=utf-8";

  pub fn new(tick: &str, amount: &str) -> Self {
    Self {
      p: "brc-20".into(),
      op: "transfer".into(),
      tick: tick.into(),
      amt: amount.into(),
    }
  }

  pub fn encode(&self) -> Vec<u8> {
    serde_json::to_vec(self).expect("payload serialization should work")
  }
}
