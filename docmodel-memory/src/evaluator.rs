//! Predicate evaluation for in-memory document filtering.
//!
//! This module walks native filter documents (the same trees sent to a real server) and
//! evaluates them against stored BSON documents, including dotted paths that traverse
//! arrays of sub-documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime, oid::ObjectId};
use regex::RegexBuilder;

use docmodel_core::error::{MapperError, MapperResult};

/// Type-erased, comparable representation of BSON values.
///
/// Integers keep their exact value. An integer compared against a `Double` is widened to
/// f64, so `Int32(1)` and `Double(1.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Int(a), Comparable::Double(b)) | (Comparable::Double(b), Comparable::Int(a)) => {
                *a as f64 == *b
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Int(_) | Comparable::Double(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order used for sorting: values of different types order by type rank.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

fn collect<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(child) = doc.get(*head) {
                collect(child, rest, out);
            }
        }
        Bson::Array(items) => match head.parse::<usize>() {
            Ok(position) => {
                if let Some(item) = items.get(position) {
                    collect(item, rest, out);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    collect(item, segments, out);
                }
            }
        },
        _ => {}
    }
}

/// Every value reachable at the dotted `path`. Arrays of sub-documents fan out.
pub(crate) fn lookup<'a>(document: &'a bson::Document, path: &str) -> Vec<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let mut out = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            collect(value, rest, &mut out);
        }
    }

    out
}

fn elements<'a>(candidates: &[&'a Bson]) -> Vec<&'a Bson> {
    candidates
        .iter()
        .flat_map(|candidate| match *candidate {
            Bson::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn equals(candidate: &Bson, expected: &Comparable<'_>) -> bool {
    if &Comparable::from(candidate) == expected {
        return true;
    }

    match candidate {
        Bson::Array(items) => items.iter().any(|item| &Comparable::from(item) == expected),
        _ => false,
    }
}

fn equals_any(candidates: &[&Bson], expected: &Bson) -> bool {
    if candidates.is_empty() {
        return matches!(expected, Bson::Null);
    }

    let expected = Comparable::from(expected);
    candidates.iter().any(|candidate| equals(candidate, &expected))
}

fn is_operator_document(doc: &bson::Document) -> bool {
    !doc.is_empty() && !doc.contains_key("$ref") && doc.keys().all(|key| key.starts_with('$'))
}

fn operand_array<'a>(op: &str, operand: &'a Bson) -> MapperResult<&'a [Bson]> {
    operand
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| MapperError::Backend(format!("{op} needs an array, got {operand}")))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn matches_regex(candidates: &[&Bson], pattern: &str, options: &str) -> MapperResult<bool> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| MapperError::Backend(e.to_string()))?;

    Ok(elements(candidates)
        .iter()
        .any(|value| value.as_str().is_some_and(|text| regex.is_match(text))))
}

fn matches_operator(
    candidates: &[&Bson],
    op: &str,
    operand: &Bson,
    siblings: &bson::Document,
) -> MapperResult<bool> {
    match op {
        "$eq" => Ok(equals_any(candidates, operand)),
        "$ne" => Ok(!equals_any(candidates, operand)),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let expected = Comparable::from(operand);

            Ok(elements(candidates).iter().any(|value| {
                match Comparable::from(*value).partial_cmp(&expected) {
                    Some(ordering) => match op {
                        "$gt" => ordering == Ordering::Greater,
                        "$gte" => ordering != Ordering::Less,
                        "$lt" => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }))
        }
        "$in" => Ok(operand_array(op, operand)?
            .iter()
            .any(|expected| equals_any(candidates, expected))),
        "$nin" => Ok(!operand_array(op, operand)?
            .iter()
            .any(|expected| equals_any(candidates, expected))),
        "$all" => Ok(operand_array(op, operand)?
            .iter()
            .all(|expected| equals_any(candidates, expected))),
        "$exists" => Ok(truthy(operand) != candidates.is_empty()),
        "$not" => Ok(!matches_condition(candidates, operand)?),
        "$regex" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| MapperError::Backend(format!("$regex needs a string, got {operand}")))?;
            let options = siblings.get_str("$options").unwrap_or_default();

            matches_regex(candidates, pattern, options)
        }
        "$options" => Ok(true),
        "$size" => {
            let size = match operand {
                Bson::Int32(size) => i64::from(*size),
                Bson::Int64(size) => *size,
                _ => return Err(MapperError::Backend(format!("$size needs an integer, got {operand}"))),
            };

            Ok(candidates
                .iter()
                .any(|value| matches!(value, Bson::Array(items) if items.len() as i64 == size)))
        }
        "$elemMatch" => {
            let condition = operand
                .as_document()
                .ok_or_else(|| MapperError::Backend(format!("$elemMatch needs a document, got {operand}")))?;

            for candidate in candidates {
                let Bson::Array(items) = candidate else {
                    continue;
                };

                for item in items {
                    let matched = match item {
                        Bson::Document(sub) if !is_operator_document(condition) => {
                            DocumentEvaluator::new(sub).matches(condition)?
                        }
                        _ => matches_condition(&[item], operand)?,
                    };

                    if matched {
                        return Ok(true);
                    }
                }
            }

            Ok(false)
        }
        "$near" | "$nearSphere" | "$within" | "$geoWithin" | "$maxDistance" => Err(
            MapperError::Backend(format!("{op} is not supported by the in-memory store")),
        ),
        _ => Err(MapperError::Backend(format!("unsupported query operator {op}"))),
    }
}

/// Whether the values at one path satisfy a condition: an operator document, or a
/// literal compared for equality.
pub(crate) fn matches_condition(candidates: &[&Bson], condition: &Bson) -> MapperResult<bool> {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => {
            for (op, operand) in ops {
                if !matches_operator(candidates, op, operand, ops)? {
                    return Ok(false);
                }
            }

            Ok(true)
        }
        expected => Ok(equals_any(candidates, expected)),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a bson::Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a bson::Document) -> Self {
        Self { document }
    }

    fn clauses<'f>(op: &str, condition: &'f Bson) -> MapperResult<Vec<&'f bson::Document>> {
        operand_array(op, condition)?
            .iter()
            .map(|clause| {
                clause
                    .as_document()
                    .ok_or_else(|| MapperError::Backend(format!("{op} clauses must be documents")))
            })
            .collect()
    }

    fn any(&self, op: &str, condition: &Bson) -> MapperResult<bool> {
        for clause in Self::clauses(op, condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Evaluates a native filter document against this document.
    pub fn matches(&self, filter: &bson::Document) -> MapperResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in Self::clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => self.any(key, condition)?,
                "$nor" => !self.any(key, condition)?,
                op if op.starts_with('$') => {
                    return Err(MapperError::Backend(format!("unsupported query operator {op}")));
                }
                path => matches_condition(&lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a bson::Document>,
        filter: &bson::Document,
    ) -> MapperResult<Vec<&'a bson::Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }
}

fn sort_key<'a>(document: &'a bson::Document, path: &str) -> Comparable<'a> {
    lookup(document, path)
        .first()
        .map(|value| Comparable::from(*value))
        .unwrap_or(Comparable::Null)
}

/// Compares two documents by a native sort specification.
pub(crate) fn compare_by(sort: &bson::Document, left: &bson::Document, right: &bson::Document) -> Ordering {
    for (path, direction) in sort {
        let ordering = sort_key(left, path).sort_cmp(&sort_key(right, path));
        let descending = matches!(direction, Bson::Int32(d) if *d < 0)
            || matches!(direction, Bson::Int64(d) if *d < 0);

        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
