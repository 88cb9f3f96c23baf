use super::{RankError, Ranker, Winner};
use crate::document::Document;

/// Prefers the lexicographically greater text. Deterministic, free and
/// always succeeds, which makes it the reference judge for tests and dry
/// runs: ranking with it is equivalent to sorting by content, descending.
pub struct FakeRanker;

impl Ranker for FakeRanker {
    fn choose_better(
        &self,
        _criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<Winner, RankError> {
        if first.read_text()? >= second.read_text()? {
            Ok(Winner::First)
        } else {
            Ok(Winner::Second)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StrDocument;

    #[test]
    fn test_prefers_greater_text_from_either_side() {
        let foo = StrDocument::new("foo");
        let bar = StrDocument::new("bar");
        let ranker = FakeRanker;
        assert_eq!(
            ranker.choose_better("just pick one", &foo, &bar).unwrap(),
            Winner::First
        );
        assert_eq!(
            ranker.choose_better("just pick one", &bar, &foo).unwrap(),
            Winner::Second
        );
    }
}
