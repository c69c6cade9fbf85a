use crate::key::PropertySource;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// TemplateError
///

#[derive(Debug, ThisError)]
pub enum TemplateError {
    #[error("unbalanced '{{' at byte {at} in template: {template}")]
    UnbalancedBrace { template: String, at: usize },

    #[error("empty placeholder at byte {at} in template: {template}")]
    EmptyPlaceholder { template: String, at: usize },

    #[error("placeholder name {name:?} may only contain ascii alphanumerics and '_'")]
    InvalidPlaceholderName { name: String },

    #[error(
        "placeholders {{{first}}} and {{{second}}} are adjacent with no literal separator; such keys cannot be decoded unambiguously"
    )]
    AdjacentPlaceholders { first: String, second: String },

    #[error("placeholder {{{name}}} resolved on neither the record nor its parent")]
    UnresolvedPlaceholder { name: String },

    #[error("template compiled to an invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

///
/// Segment
///

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

///
/// KeyTemplate
///
/// A compiled row-key pattern: literal text interleaved with `{Name}`
/// placeholders. Encoding substitutes property values; decoding runs the
/// pre-built anchored pattern and returns every capture.
///
/// Templates where two placeholders touch with no literal between them are
/// rejected at parse time: a non-greedy split point between them is
/// ambiguous, so such keys can never round-trip.
///

#[derive(Clone, Debug)]
pub struct KeyTemplate {
    raw: String,
    segments: Vec<Segment>,
    pattern: Regex,
}

impl KeyTemplate {
    /// Compile a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let segments = scan_segments(raw)?;

        for pair in segments.windows(2) {
            if let [Segment::Placeholder(first), Segment::Placeholder(second)] = pair {
                return Err(TemplateError::AdjacentPlaceholders {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }

        let mut source = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => source.push_str(&regex::escape(text)),
                Segment::Placeholder(name) => {
                    source.push_str(&format!("(?P<{name}>.+?)"));
                }
            }
        }
        source.push('$');

        Ok(Self {
            raw: raw.to_string(),
            segments,
            pattern: Regex::new(&source)?,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Substitute placeholder values, item-first then parent.
    ///
    /// A placeholder missing on both sides is a configuration fault and
    /// fails fast rather than encoding an empty segment.
    pub fn encode(
        &self,
        item: &dyn PropertySource,
        parent: &dyn PropertySource,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = item.property(name).or_else(|| parent.property(name)).ok_or(
                        TemplateError::UnresolvedPlaceholder { name: name.clone() },
                    )?;
                    out.push_str(&value);
                }
            }
        }

        Ok(out)
    }

    /// Match an observed row key back into placeholder values.
    ///
    /// Returns every capture; the hydration layer discards captures the
    /// record already carries in its own attributes and the partition-key
    /// property, leaving the parent-level output.
    #[must_use]
    pub fn decode(&self, observed: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.pattern.captures(observed)?;

        let mut values = BTreeMap::new();
        for name in self.placeholders() {
            let capture = captures.name(name)?;
            values.insert(name.to_string(), capture.as_str().to_string());
        }

        Some(values)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn literal_segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Literal(text) => Some(text.as_str()),
            Segment::Placeholder(_) => None,
        })
    }

    /// Derive a classification keyword from the literal segments: the first
    /// all-alphabetic token longer than two characters, lowercased.
    #[must_use]
    pub fn derived_keyword(&self) -> Option<String> {
        for literal in self.literal_segments() {
            for token in literal.split(|c: char| !c.is_ascii_alphanumeric()) {
                if token.len() > 2 && token.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Some(token.to_ascii_lowercase());
                }
            }
        }

        None
    }
}

fn scan_segments(raw: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.char_indices();

    while let Some((at, ch)) = chars.next() {
        match ch {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace {
                        template: raw.to_string(),
                        at,
                    });
                }
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder {
                        template: raw.to_string(),
                        at,
                    });
                }
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(TemplateError::InvalidPlaceholderName { name });
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => {
                return Err(TemplateError::UnbalancedBrace {
                    template: raw.to_string(),
                    at,
                });
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}
