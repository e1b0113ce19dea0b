use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
  pub selected: Vec<Utxo>,
  pub total: Amount,
}

impl Selection {
  pub fn outpoints(&self) -> Vec<OutPoint> {
    self.selected.iter().map(Utxo::outpoint).collect()
  }
}

/// The ordering callers usually want: largest first, for a minimal input
/// count.
pub fn by_value_descending(utxos: &[Utxo]) -> Vec<Utxo> {
  let mut candidates = utxos.to_vec();
  candidates.sort_by(|a, b| b.value.cmp(&a.value));
  candidates
}

/// Greedy first-fit selection. Candidates are taken in the order given, so
/// callers control the policy: value-descending for a minimal input count.
/// Utxos hosting an excluded satpoint and utxos at or below the dust limit
/// are skipped. Selection stops as soon as the running total strictly
/// exceeds the target, always leaving a nonzero remainder for the caller to
/// dispose of.
pub fn select_utxos(
  candidates: &[Utxo],
  target: Amount,
  exclude: &BTreeSet<SatPoint>,
) -> Result<Selection, Error> {
  let excluded_outpoints = exclude
    .iter()
    .map(|satpoint| satpoint.outpoint)
    .collect::<BTreeSet<OutPoint>>();

  let mut selected = Vec::new();
  let mut total = Amount::ZERO;

  for utxo in candidates {
    if excluded_outpoints.contains(&utxo.outpoint()) || utxo.value <= DUST_LIMIT {
      continue;
    }

    total = total.checked_add(utxo.value).ok_or(Error::ValueOverflow)?;
    selected.push(utxo.clone());

    if total > target {
      log::debug!(
        "selected {} utxos totaling {total} to cover {target}",
        selected.len()
      );
      return Ok(Selection { selected, total });
    }
  }

  Err(Error::InsufficientFunds {
    required: target,
    available: total,
  })
}
