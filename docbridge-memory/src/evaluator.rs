//! Native filter evaluation for in-memory documents.
//!
//! Filters use the MongoDB query document format, so filters written for the
//! MongoDB backend behave the same here. Supported operators:
//!
//! - implicit equality (`{ "name": "Ann" }`), matching array elements too
//! - `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`
//! - `$exists`, `$regex` (with `$options`), `$not`
//! - logical `$and`, `$or`, `$nor`
//!
//! Field names may be dotted paths into embedded documents. Any other operator
//! is reported as a store operation error rather than silently not matching.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::RegexBuilder;
use std::cmp::Ordering;

use docbridge_core::error::{DocumentStoreError, DocumentStoreResult};

/// Comparable projection of BSON values. Numbers are normalized to `f64`.
#[derive(Debug, PartialEq)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Document(&'a Document),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Document(document),
            other => Comparable::Other(other),
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path (`address.city`) inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Returns `true` when `document` satisfies the native `filter`.
pub(crate) fn matches(document: &Document, filter: &Document) -> DocumentStoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_clause(document, key, condition)?,
            "$nor" => !any_clause(document, key, condition)?,
            other if other.starts_with('$') => return Err(unsupported(other)),
            field => field_matches(lookup(document, field), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Keeps the documents matching `filter`, in iteration order.
pub(crate) fn filter_documents<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    filter: &Document,
) -> DocumentStoreResult<Vec<&'a Document>> {
    let mut matched = Vec::new();

    for document in documents {
        if matches(document, filter)? {
            matched.push(document);
        }
    }

    Ok(matched)
}

fn any_clause(document: &Document, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
    for clause in clauses(key, condition)? {
        if matches(document, clause)? {
            return Ok(true);
        }
    }

    Ok(false)
}

fn clauses<'a>(key: &str, condition: &'a Bson) -> DocumentStoreResult<Vec<&'a Document>> {
    condition
        .as_array()
        .ok_or_else(|| invalid(format!("{key} requires an array of filter documents")))?
        .iter()
        .map(|clause| {
            clause
                .as_document()
                .ok_or_else(|| invalid(format!("{key} entries must be filter documents")))
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> bool {
    condition
        .as_document()
        .and_then(|d| d.keys().next())
        .is_some_and(|k| k.starts_with('$'))
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
    match condition.as_document() {
        Some(operators) if is_operator_document(condition) => operators_match(value, operators),
        _ => Ok(equals(value, condition)),
    }
}

fn operators_match(value: Option<&Bson>, operators: &Document) -> DocumentStoreResult<bool> {
    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$in" => in_list(value, operand)?,
            "$nin" => !in_list(value, operand)?,
            "$exists" => value.is_some() == truthy(operand),
            "$regex" => regex_matches(value, operand, operators.get_str("$options").unwrap_or(""))?,
            "$options" => true,
            "$not" => match operand.as_document() {
                Some(inner) => !operators_match(value, inner)?,
                None => return Err(invalid("$not requires an operator document")),
            },
            other => return Err(unsupported(other)),
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Equality with MongoDB's array semantics: a scalar matches an array containing it.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    let Some(value) = value else {
        return matches!(target, Bson::Null);
    };
    let target = Comparable::from(target);

    match (Comparable::from(value), &target) {
        (Comparable::Array(items), Comparable::Array(_)) => Comparable::Array(items) == target,
        (Comparable::Array(items), _) => items.iter().any(|item| *item == target),
        (value, _) => value == target,
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    let operand = Comparable::from(operand);

    match Comparable::from(value) {
        Comparable::Array(items) => items
            .iter()
            .any(|item| item.partial_cmp(&operand).is_some_and(&accept)),
        value => value.partial_cmp(&operand).is_some_and(accept),
    }
}

fn in_list(value: Option<&Bson>, operand: &Bson) -> DocumentStoreResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| invalid("$in/$nin require an array"))?;

    Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

fn regex_matches(value: Option<&Bson>, pattern: &Bson, options: &str) -> DocumentStoreResult<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| invalid("$regex requires a string pattern"))?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| invalid(e.to_string()))?;

    Ok(match value {
        Some(Bson::String(s)) => regex.is_match(s),
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| regex.is_match(s))),
        _ => false,
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn unsupported(op: &str) -> DocumentStoreError {
    DocumentStoreError::store_operation(format!("unknown operator: {op}"))
}

fn invalid(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::store_operation(message.into())
}
