use super::*;

/// An unspent output as seen by the engine. Immutable once fetched:
/// selection never mutates a utxo, it only marks one consumed within a
/// single build.
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
  pub txid: Txid,
  pub vout: u32,
  pub value: Amount,
  pub script_pubkey: ScriptBuf,
  pub confirmations: u32,
  pub address: Address,
  pub address_type: AddressType,
  pub inscriptions: Vec<InscriptionRef>,
}

impl Utxo {
  pub fn outpoint(&self) -> OutPoint {
    OutPoint {
      txid: self.txid,
      vout: self.vout,
    }
  }

  pub fn satpoint(&self) -> SatPoint {
    SatPoint {
      outpoint: self.outpoint(),
      offset: 0,
    }
  }

  pub fn tx_out(&self) -> TxOut {
    TxOut {
      value: self.value,
      script_pubkey: self.script_pubkey.clone(),
    }
  }
}

/// A reference to an inscribed artifact riding on a utxo, used only to keep
/// inscription-bearing outputs out of fee and value selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionRef {
  pub inscription_id: InscriptionId,
  pub content_type: String,
  pub satpoint: SatPoint,
}

pub fn calculate_balance(utxos: &[Utxo]) -> Amount {
  utxos.iter().map(|utxo| utxo.value).sum()
}

/// Satpoints of every inscription riding on the given utxos, the exclusion
/// set for value and fee selection.
pub fn inscription_satpoints(utxos: &[Utxo]) -> BTreeSet<SatPoint> {
  utxos
    .iter()
    .flat_map(|utxo| &utxo.inscriptions)
    .map(|inscription| inscription.satpoint)
    .collect()
}
