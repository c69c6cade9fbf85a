//! Row-key classification.
//!
//! Each collection gets one [`RowMatcher`], chosen by a fixed priority
//! chain at schema build time and never re-evaluated per row.

use crate::{
    key::{KeyContext, KeyTemplate},
    schema::{ParentProperty, ParentView, RootEntity, RowEntity},
};

/// Tokens too generic to anchor a sample-key match.
const GENERIC_TOKENS: [&str; 3] = ["id", "sample", "dummy"];

/// Dummy value injected into parent id-properties during sample synthesis.
const SAMPLE_VALUE: &str = "sample";

///
/// RowMatcher
///
/// Predicate deciding whether an observed row key belongs to a collection.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RowMatcher {
    /// Case-insensitive substring containment of one keyword.
    Keyword(String),
    /// Every static token of a synthesized sample key must appear as a
    /// token of the candidate.
    SampleTokens(Vec<String>),
    /// Literal row-key prefix.
    Prefix(String),
    /// Degenerate catch-all; acceptable only for single-collection roots.
    Any,
}

impl RowMatcher {
    #[must_use]
    pub fn matches(&self, row_key: &str) -> bool {
        match self {
            Self::Keyword(keyword) => row_key.to_ascii_lowercase().contains(keyword),
            Self::SampleTokens(tokens) => {
                let have = tokenize(row_key);
                tokens.iter().all(|token| have.contains(token))
            }
            Self::Prefix(prefix) => row_key.starts_with(prefix),
            Self::Any => true,
        }
    }
}

/// Build a collection's matcher by the priority chain:
/// explicit keyword, template-derived keyword, sample-key heuristic
/// (self-keyed types only), literal prefix, catch-all.
pub(crate) fn build_matcher<R: RootEntity, T: RowEntity>(
    prefix: &str,
    template: Option<&KeyTemplate>,
    partition_key: &ParentProperty<R>,
    props: &[ParentProperty<R>],
) -> RowMatcher {
    if let Some(keyword) = T::KEYWORD {
        return RowMatcher::Keyword(keyword.to_ascii_lowercase());
    }

    if let Some(template) = template {
        if let Some(keyword) = template.derived_keyword() {
            return RowMatcher::Keyword(keyword);
        }
    } else if let Some(sample) = sample_key::<R, T>(prefix, partition_key, props) {
        let tokens = static_tokens(&sample);
        if !tokens.is_empty() {
            return RowMatcher::SampleTokens(tokens);
        }
    }

    if !prefix.is_empty() {
        return RowMatcher::Prefix(prefix.to_string());
    }

    RowMatcher::Any
}

/// Synthesize a representative key for a self-keyed item type: a throwaway
/// parent with dummy values through every registered id-bearing property,
/// one default item, and the item's own key-construction routine.
fn sample_key<R: RootEntity, T: RowEntity>(
    prefix: &str,
    partition_key: &ParentProperty<R>,
    props: &[ParentProperty<R>],
) -> Option<String> {
    let mut parent = R::default();
    (partition_key.set)(&mut parent, SAMPLE_VALUE.to_string());
    for prop in props {
        if prop.name.to_ascii_lowercase().contains("id") {
            (prop.set)(&mut parent, SAMPLE_VALUE.to_string());
        }
    }

    let view = ParentView::new(partition_key, props, &parent);
    let ctx = KeyContext {
        partition_key: SAMPLE_VALUE,
        prefix,
        parent: &view,
    };

    T::default().build_row_key(&ctx)
}

/// Static tokens of a sample key: alphabetic tokens of three or more
/// characters, minus the generic placeholder vocabulary.
fn static_tokens(sample: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for token in tokenize(sample) {
        if token.len() >= 3
            && token.chars().all(|c| c.is_ascii_alphabetic())
            && !GENERIC_TOKENS.contains(&token.as_str())
            && !tokens.contains(&token)
        {
            tokens.push(token);
        }
    }
    tokens
}

fn tokenize(key: &str) -> Vec<String> {
    key.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
