//! Query strings compiled into typed predicates.
//!
//! Grammar (whitespace separated, all terms must match):
//! - `field:value` case-insensitive substring on a projected field the record declares;
//!   fields in `Record::EXACT_FIELDS` must equal the value instead
//! - `key:value` with an undeclared key is an error; URL-like tokens (`scheme://..`) are free text
//! - `re:PATTERN`  regex over the record's search text
//! - anything else is free text, fuzzy-matched against the search text

use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use roster_core::{Record, RosterError, RosterResult};
use serde::Serialize;

use crate::Predicate;

#[derive(Debug, Clone)]
enum Term {
    Field { name: &'static str, needle: String, exact: bool },
    Pattern(Regex),
}

/// Parsed query, validated against one record type's field names.
#[derive(Debug, Clone)]
pub struct Query {
    terms: Vec<Term>,
    free: String,
}

/// Per-stage survivor counts, for `--explain` style output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryExplain {
    pub total: usize,
    pub after_fields: usize,
    pub after_patterns: usize,
    pub after_free_text: usize,
}

fn is_field_key(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Query {
    pub fn parse<R: Record>(q: &str) -> RosterResult<Self> {
        let mut terms = Vec::new();
        let mut free_terms: Vec<&str> = Vec::new();
        for tok in q.split_whitespace() {
            if let Some(pat) = tok.strip_prefix("re:") {
                if pat.is_empty() {
                    return Err(RosterError::InvalidArgument("empty pattern after `re:`".into()));
                }
                let re = Regex::new(pat).map_err(|e| RosterError::InvalidArgument(format!("invalid pattern `{}`: {}", pat, e)))?;
                terms.push(Term::Pattern(re));
                continue;
            }
            if let Some((key, val)) = tok.split_once(':') {
                if is_field_key(key) && !val.starts_with("//") {
                    let name = R::FIELD_NAMES
                        .iter()
                        .copied()
                        .find(|f| f.eq_ignore_ascii_case(key))
                        .ok_or_else(|| RosterError::InvalidArgument(format!("unknown field `{}` (expected one of: {})", key, R::FIELD_NAMES.join(", "))))?;
                    if val.is_empty() {
                        return Err(RosterError::InvalidArgument(format!("missing value for `{}:`", name)));
                    }
                    let exact = R::EXACT_FIELDS.contains(&name);
                    terms.push(Term::Field { name, needle: val.to_lowercase(), exact });
                    continue;
                }
            }
            free_terms.push(tok);
        }
        Ok(Self { terms, free: free_terms.join(" ") })
    }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() && self.free.is_empty() }

    fn fields_match<R: Record>(&self, rec: &R) -> bool {
        let fields = rec.fields();
        self.terms.iter().all(|t| match t {
            Term::Field { name, needle, exact } => fields.iter().any(|(n, v)| {
                if n != name {
                    return false;
                }
                let v = v.to_lowercase();
                if *exact { v == *needle } else { v.contains(needle.as_str()) }
            }),
            Term::Pattern(_) => true,
        })
    }

    fn patterns_match(&self, text: &str) -> bool {
        self.terms.iter().all(|t| match t {
            Term::Pattern(re) => re.is_match(text),
            Term::Field { .. } => true,
        })
    }

    fn free_match(&self, matcher: &SkimMatcherV2, text: &str) -> bool {
        self.free.is_empty() || matcher.fuzzy_match(text, &self.free).is_some()
    }

    /// Compile into a predicate owning its matcher.
    pub fn into_predicate<R: Record>(self) -> Predicate<R> {
        let matcher = SkimMatcherV2::default();
        Arc::new(move |rec: &R| {
            if !self.fields_match(rec) { return false; }
            let text = rec.search_text();
            self.patterns_match(&text) && self.free_match(&matcher, &text)
        })
    }

    /// Count how many records survive each stage.
    pub fn explain<R: Record>(&self, items: &[R]) -> QueryExplain {
        let matcher = SkimMatcherV2::default();
        let mut out = QueryExplain { total: items.len(), ..Default::default() };
        for rec in items {
            if !self.fields_match(rec) { continue; }
            out.after_fields += 1;
            let text = rec.search_text();
            if !self.patterns_match(&text) { continue; }
            out.after_patterns += 1;
            if self.free_match(&matcher, &text) { out.after_free_text += 1; }
        }
        out
    }
}
