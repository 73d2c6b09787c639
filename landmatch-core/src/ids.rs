//! Identifier generation for newly created features.
//!
//! New identifiers follow the authoritative system's convention: an
//! uppercase, brace-delimited UUID such as
//! `{3F2504E0-4F89-11D3-9A0C-0305E82C3301}`.

use uuid::Uuid;

use crate::model::SourceId;

/// Source of fresh, globally unique feature identifiers.
///
/// Implementations must be safe to share between threads so asset types can
/// be reconciled in parallel.
pub trait IdGenerator: Send + Sync {
    /// Produce an identifier never returned before.
    fn generate(&self) -> SourceId;
}

/// Random (version 4) UUID identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> SourceId {
        brace_uuid(Uuid::new_v4())
    }
}

/// Format `uuid` as an uppercase, brace-delimited identifier.
///
/// # Examples
/// ```
/// use landmatch_core::brace_uuid;
/// use uuid::Uuid;
///
/// let id = brace_uuid(Uuid::from_u128(0x3F2504E0_4F89_11D3_9A0C_0305E82C3301));
/// assert_eq!(id.as_str(), "{3F2504E0-4F89-11D3-9A0C-0305E82C3301}");
/// ```
#[must_use]
pub fn brace_uuid(uuid: Uuid) -> SourceId {
    let mut buffer = Uuid::encode_buffer();
    SourceId::new(uuid.braced().encode_upper(&mut buffer).to_owned())
}

/// Whether `id` is an uppercase, brace-delimited UUID.
#[must_use]
pub fn is_brace_uuid(id: &str) -> bool {
    id.strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .is_some_and(|inner| {
            inner.len() == 36
                && !inner.chars().any(|c| c.is_ascii_lowercase())
                && Uuid::try_parse(inner).is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    fn generated_ids_use_the_brace_format() {
        let id = UuidGenerator.generate();
        assert!(is_brace_uuid(id.as_str()), "unexpected format: {id}");
    }

    #[rstest]
    fn generated_ids_are_distinct() {
        let ids: HashSet<SourceId> = (0..256).map(|_| UuidGenerator.generate()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[rstest]
    #[case("{3F2504E0-4F89-11D3-9A0C-0305E82C3301}", true)]
    #[case("{3f2504e0-4f89-11d3-9a0c-0305e82c3301}", false)]
    #[case("3F2504E0-4F89-11D3-9A0C-0305E82C3301", false)]
    #[case("{3F2504E04F8911D39A0C0305E82C3301}", false)]
    #[case("{NOT-A-UUID}", false)]
    #[case("", false)]
    fn recognises_brace_uuids(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_brace_uuid(raw), expected);
    }
}
