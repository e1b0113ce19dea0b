use super::*;

/// Where the engine gets utxo and transaction facts. Implementations are
/// esplora-shaped but any source satisfying the contract works.
pub trait UtxoSource {
  fn list_utxos(&self, address: &Address) -> anyhow::Result<Vec<UtxoEntry>>;

  fn tx_info(&self, txid: Txid) -> anyhow::Result<TxInfo>;

  fn tx_outspends(&self, txid: Txid) -> anyhow::Result<Vec<OutSpend>>;

  /// Fee estimate in sat/vB for confirmation within `target_blocks`.
  fn fee_estimate(&self, target_blocks: u16) -> anyhow::Result<f64>;
}

/// Broadcast-side node surface. `test_accept` is the engine's only mempool
/// policy probe and the authoritative conflict detector for racing builds.
pub trait NodeClient {
  fn test_accept(&self, raw_tx_hex: &str) -> anyhow::Result<AcceptCheck>;

  fn send_raw_transaction(&self, raw_tx_hex: &str) -> anyhow::Result<Txid>;

  fn decode_psbt(&self, base64: &str) -> anyhow::Result<serde_json::Value>;
}

pub trait InscriptionIndex {
  fn inscription(&self, inscription_id: InscriptionId) -> anyhow::Result<InscriptionDetails>;

  fn address_inscriptions(&self, address: &Address) -> anyhow::Result<Vec<InscriptionRef>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoEntry {
  pub txid: Txid,
  pub vout: u32,
  pub value: u64,
  pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInfo {
  pub txid: Txid,
  pub vout: Vec<TxOutEntry>,
  pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutEntry {
  pub scriptpubkey: ScriptBuf,
  pub scriptpubkey_address: Option<String>,
  pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutSpend {
  pub spent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptCheck {
  pub allowed: bool,
  #[serde(default, rename = "reject-reason")]
  pub reject_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionDetails {
  pub inscription_id: InscriptionId,
  pub address: String,
  pub content_type: Option<String>,
  pub satpoint: SatPoint,
  pub output_value: u64,
}
