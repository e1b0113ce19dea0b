use {super::*, bitcoin::transaction::ParseOutPointError};

/// A satpoint identifies the location of a sat in an output.
///
/// The string representation of a satpoint consists of that of an outpoint,
/// which identifies an output, followed by `:OFFSET`.
#[derive(
  Debug,
  PartialEq,
  Copy,
  Clone,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Hash,
  DeserializeFromStr,
  SerializeDisplay,
)]
pub struct SatPoint {
  pub outpoint: OutPoint,
  pub offset: u64,
}

impl Display for SatPoint {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}:{}", self.outpoint, self.offset)
  }
}

impl FromStr for SatPoint {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (outpoint, offset) = s.rsplit_once(':').ok_or_else(|| ParseError::Colon(s.into()))?;

    Ok(SatPoint {
      outpoint: outpoint
        .parse::<OutPoint>()
        .map_err(|err| ParseError::Outpoint {
          outpoint: outpoint.into(),
          err,
        })?,
      offset: offset.parse::<u64>().map_err(|err| ParseError::Offset {
        offset: offset.into(),
        err,
      })?,
    })
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("satpoint `{0}` missing colon")]
  Colon(String),
  #[error("satpoint offset `{offset}` invalid: {err}")]
  Offset { offset: String, err: ParseIntError },
  #[error("satpoint outpoint `{outpoint}` invalid: {err}")]
  Outpoint {
    outpoint: String,
    err: ParseOutPointError,
  },
}
