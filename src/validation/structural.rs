//! Existence checks over a [`Document`] with a small path/attribute language.
//!
//! A query is tried against three strategies, in order:
//!
//! 1. [`QueryStrategy::AttributeFilter`] - `tag[attr='value']` anywhere in the tree.
//!    Applies whenever the brackets hold an `=`, unless a `/` path follows the
//!    closing bracket. Any other trailing text makes the filter unmatched.
//! 2. [`QueryStrategy::PathSelector`] - `a/b` (child) and `a//b` (descendant) paths,
//!    rewritten to `a > b` / `a b` selectors. Applies when the rewritten selector
//!    is syntactically valid.
//! 3. [`QueryStrategy::BareTag`] - the last path segment as a plain tag name,
//!    found anywhere. Always applies.
//!
//! Only [`QueryOutcome::Inapplicable`] moves on to the next strategy: a filter
//! or path that is well formed but matches nothing is a definite `false`.
//!
//! Note the third tier is permissive: a malformed filter such as `item[id]x`
//! is answered by looking for any `item` element at all.

use crate::document::{Document, Element};
use std::iter::Peekable;
use std::str::Chars;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Matched,
    Unmatched,
    /// The query is not written in this strategy's syntax.
    Inapplicable,
}

impl From<bool> for QueryOutcome {
    fn from(found: bool) -> Self {
        if found {
            QueryOutcome::Matched
        } else {
            QueryOutcome::Unmatched
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    AttributeFilter,
    PathSelector,
    BareTag,
}

impl QueryStrategy {
    /// Evaluation order.
    pub const ORDER: [QueryStrategy; 3] = [
        QueryStrategy::AttributeFilter,
        QueryStrategy::PathSelector,
        QueryStrategy::BareTag,
    ];

    pub fn evaluate(self, doc: &Document, query: &str) -> QueryOutcome {
        match self {
            QueryStrategy::AttributeFilter => match AttributeFilter::parse(query) {
                Some(filter) => filter.evaluate(doc),
                None => QueryOutcome::Inapplicable,
            },
            QueryStrategy::PathSelector => match Selector::from_path(query) {
                Some(selector) => selector.matches(doc).into(),
                None => QueryOutcome::Inapplicable,
            },
            QueryStrategy::BareTag => {
                let tag = bare_tag(query);
                (!tag.is_empty() && doc.find(tag).is_some()).into()
            }
        }
    }
}

/// Runs the strategies in order and reports which one decided.
pub fn evaluate_query(doc: &Document, query: &str) -> (QueryStrategy, bool) {
    for strategy in QueryStrategy::ORDER {
        match strategy.evaluate(doc, query) {
            QueryOutcome::Matched => return (strategy, true),
            QueryOutcome::Unmatched => return (strategy, false),
            QueryOutcome::Inapplicable => continue,
        }
    }
    // BareTag always applies
    (QueryStrategy::BareTag, false)
}

/// True if `query` finds at least one element. Without a document nothing is tried.
pub fn validate_structure(doc: Option<&Document>, query: &str) -> bool {
    let Some(doc) = doc else {
        return false;
    };
    let (strategy, found) = evaluate_query(doc, query);
    debug!("Query '{}' decided by {:?}: {}", query, strategy, found);
    found
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '\'' || c == '"')
}

fn tag_matches(element: &Element, tag: &str) -> bool {
    tag.is_empty() || tag == "*" || element.has_name(tag)
}

/// `tag[attr='value']`
#[derive(Debug, PartialEq)]
struct AttributeFilter<'q> {
    tag: &'q str,
    attr: &'q str,
    value: &'q str,
    rest: &'q str, // anything after the closing bracket
}

impl<'q> AttributeFilter<'q> {
    /// Brackets run from the first `[` to the first `]` after it.
    fn parse(query: &'q str) -> Option<Self> {
        let open = query.find('[')?;
        let close = open + query[open..].find(']')?;
        let (attr, value) = query[open + 1..close].split_once('=')?;
        Some(AttributeFilter {
            tag: query[..open].trim(),
            attr: attr.trim(),
            value: strip_quotes(value),
            rest: query[close + 1..].trim(),
        })
    }

    fn evaluate(&self, doc: &Document) -> QueryOutcome {
        if self.rest.starts_with('/') {
            // a path continues after the filter
            return QueryOutcome::Inapplicable;
        }
        if !self.rest.is_empty() {
            debug!("Trailing '{}' after attribute filter", self.rest);
            return QueryOutcome::Unmatched;
        }
        doc.elements()
            .any(|e| tag_matches(e, self.tag) && e.attr(self.attr) == Some(self.value))
            .into()
    }
}

fn bare_tag(query: &str) -> &str {
    let last = query.rsplit('/').next().unwrap_or(query);
    last.split('[').next().unwrap_or(last).trim()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, PartialEq)]
struct Predicate {
    name: String,
    value: Option<String>,
}

/// One step of a selector: a tag (or `*`) plus attribute predicates.
#[derive(Debug, PartialEq)]
struct Compound {
    tag: String,
    predicates: Vec<Predicate>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        tag_matches(element, &self.tag)
            && self.predicates.iter().all(|p| match (&p.value, element.attr(&p.name)) {
                (Some(expected), Some(actual)) => expected == actual,
                (None, Some(_)) => true,
                (_, None) => false,
            })
    }
}

#[derive(Debug, PartialEq)]
struct Step {
    // relation to the previous step, ignored for the first one
    combinator: Combinator,
    compound: Compound,
}

#[derive(Debug, PartialEq)]
struct Selector {
    steps: Vec<Step>,
}

impl Selector {
    /// Rewrites `//` to a descendant and `/` to a child combinator and parses
    /// the result. `None` if it is not a valid selector.
    fn from_path(query: &str) -> Option<Self> {
        let rewritten = query.replace("//", " ").replace('/', " > ");
        Self::parse(&rewritten)
    }

    fn parse(selector: &str) -> Option<Self> {
        let mut chars = selector.chars().peekable();
        let mut steps: Vec<Step> = Vec::new();
        let mut pending: Option<Combinator> = None;

        loop {
            let saw_space = skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some('>') => {
                    if steps.is_empty() || pending == Some(Combinator::Child) {
                        return None;
                    }
                    chars.next();
                    pending = Some(Combinator::Child);
                }
                Some(_) => {
                    if !steps.is_empty() && pending.is_none() && !saw_space {
                        return None;
                    }
                    let compound = parse_compound(&mut chars)?;
                    steps.push(Step {
                        combinator: pending.take().unwrap_or(Combinator::Descendant),
                        compound,
                    });
                }
            }
        }

        if pending.is_some() || steps.is_empty() {
            return None;
        }
        Some(Selector { steps })
    }

    fn matches(&self, doc: &Document) -> bool {
        let mut ancestors = Vec::new();
        any_match(doc.root(), &mut ancestors, &self.steps)
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars>) -> bool {
    let mut skipped = false;
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
        skipped = true;
    }
    skipped
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn read_name(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if !is_name_char(c) {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}

fn parse_compound(chars: &mut Peekable<Chars>) -> Option<Compound> {
    let tag = if chars.peek() == Some(&'*') {
        chars.next();
        "*".to_string()
    } else {
        read_name(chars)
    };

    let mut predicates = Vec::new();
    while chars.peek() == Some(&'[') {
        chars.next();
        let mut inner = String::new();
        loop {
            match chars.next()? {
                ']' => break,
                c => inner.push(c),
            }
        }
        predicates.push(parse_predicate(&inner)?);
    }

    if tag.is_empty() && predicates.is_empty() {
        return None;
    }
    // a compound must be followed by a separator or the end
    match chars.peek() {
        None | Some('>') => {}
        Some(c) if c.is_whitespace() => {}
        Some(_) => return None,
    }
    Some(Compound { tag, predicates })
}

fn parse_predicate(inner: &str) -> Option<Predicate> {
    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => (name.trim(), Some(strip_quotes(value).to_string())),
        None => (inner.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }
    Some(Predicate {
        name: name.to_string(),
        value,
    })
}

fn any_match<'a>(element: &'a Element, ancestors: &mut Vec<&'a Element>, steps: &[Step]) -> bool {
    if matches_chain(steps, element, ancestors) {
        return true;
    }
    ancestors.push(element);
    let found = element
        .child_elements()
        .any(|child| any_match(child, ancestors, steps));
    ancestors.pop();
    found
}

// Right to left: `element` must satisfy the last step, its ancestors the rest.
fn matches_chain(steps: &[Step], element: &Element, ancestors: &[&Element]) -> bool {
    let Some((last, rest)) = steps.split_last() else {
        return true;
    };
    if !last.compound.matches(element) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match last.combinator {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => matches_chain(rest, parent, above),
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len())
            .rev()
            .any(|i| matches_chain(rest, ancestors[i], &ancestors[..i])),
    }
}
