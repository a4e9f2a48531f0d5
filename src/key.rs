//! Composite key parsing: `shardKey[/bits]!docId`.

use crate::error::Error;
use crate::error::ErrorKind;

/// A parsed routing key: an optional shard key (carrying an optional bit
/// override) and an optional document id.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CompositeKey {
    pub shard_key: String,
    pub doc_id: String,
    pub bits: u32,
}

impl CompositeKey {
    /// Parse a routing key per the `shardKey[/bits]!docId` grammar.
    ///
    /// - no `!` → the whole string is the `docId`;
    /// - a trailing-only `!` → the whole prefix is the `shardKey`;
    /// - `a!b` → `shardKey = a`, `docId = b`; if `a` contains `/N`, then
    ///   `shardKey = a` up to `/` and `bits = N`, and `docId` is set to the
    ///   (stripped) shard key rather than `b` — preserved bug-for-bug, see
    ///   `DESIGN.md`;
    /// - more than one `!` → parse failure.
    pub fn parse(id: &str) -> Result<CompositeKey, Error> {
        let mut parts = id.splitn(3, '!');
        let first = parts.next().unwrap_or("");
        let second = parts.next();
        let third = parts.next();
        if third.is_some() {
            return Err(ErrorKind::ParseError(format!("invalid composite key '{}'", id)).into());
        }
        match second {
            None => Ok(CompositeKey {
                shard_key: String::new(),
                doc_id: first.to_string(),
                bits: 0,
            }),
            Some(doc_id) => {
                if let Some(slash) = first.find('/') {
                    let shard_key = &first[..slash];
                    let bits: u32 = first[slash + 1..]
                        .parse()
                        .map_err(|_| ErrorKind::ParseError(format!("invalid composite key '{}'", id)))?;
                    Ok(CompositeKey {
                        shard_key: shard_key.to_string(),
                        doc_id: shard_key.to_string(),
                        bits,
                    })
                } else {
                    Ok(CompositeKey {
                        shard_key: first.to_string(),
                        doc_id: doc_id.to_string(),
                        bits: 0,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_separator_is_doc_id_only() {
        let key = CompositeKey::parse("b").unwrap();
        assert_eq!(key.shard_key, "");
        assert_eq!(key.doc_id, "b");
        assert_eq!(key.bits, 0);
    }

    #[test]
    fn parse_trailing_separator_is_shard_key_only() {
        let key = CompositeKey::parse("a!").unwrap();
        assert_eq!(key.shard_key, "a");
        assert_eq!(key.doc_id, "");
    }

    #[test]
    fn parse_shard_key_and_doc_id() {
        let key = CompositeKey::parse("a!b").unwrap();
        assert_eq!(key.shard_key, "a");
        assert_eq!(key.doc_id, "b");
        assert_eq!(key.bits, 0);
    }

    #[test]
    fn parse_bit_override_sets_doc_id_to_shard_key() {
        let key = CompositeKey::parse("a/2!b").unwrap();
        assert_eq!(key.shard_key, "a");
        assert_eq!(key.doc_id, "a");
        assert_eq!(key.bits, 2);
    }

    #[test]
    fn parse_more_than_one_separator_fails() {
        assert!(CompositeKey::parse("a!b!c").is_err());
    }
}
