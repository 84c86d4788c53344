//! Id-list codec: ordered integer ids stored in a single text column.
//!
//! Ids are joined with `,` using plain decimal formatting. The empty list
//! encodes to the empty string.

use crate::error::StoreError;

const DELIMITER: char = ',';

/// Encode ids in order.
pub fn encode(ids: &[u64]) -> String {
  let mut out = String::new();
  for (i, id) in ids.iter().enumerate() {
    if i > 0 {
      out.push(DELIMITER);
    }
    out.push_str(&id.to_string());
  }
  out
}

/// Decode an encoded id-list. Inverse of [`encode`].
pub fn decode(s: &str) -> Result<Vec<u64>, StoreError> {
  if s.is_empty() {
    return Ok(Vec::new());
  }
  s.split(DELIMITER)
    .map(|part| {
      part.parse::<u64>().map_err(|e| StoreError::CorruptIdList {
        value: s.to_string(),
        reason: format!("{:?} is not an id: {}", part, e),
      })
    })
    .collect()
}

/// Append `id` unless already present. Returns whether the list changed.
pub fn insert(ids: &mut Vec<u64>, id: u64) -> bool {
  if ids.contains(&id) {
    false
  } else {
    ids.push(id);
    true
  }
}

/// Remove every occurrence of `id`. Returns whether the list changed.
pub fn remove(ids: &mut Vec<u64>, id: u64) -> bool {
  let before = ids.len();
  ids.retain(|x| *x != id);
  ids.len() != before
}
