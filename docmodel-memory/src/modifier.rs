//! Update operators, upsert seeding and projection over stored documents.

use bson::Bson;

use docmodel_core::error::{MapperError, MapperResult};

use crate::evaluator::{DocumentEvaluator, Comparable, matches_condition};

fn backend(message: impl Into<String>) -> MapperError {
    MapperError::Backend(message.into())
}

fn slot<'a>(document: &'a mut bson::Document, path: &str) -> MapperResult<(&'a mut bson::Document, String)> {
    let mut segments = path.split('.').collect::<Vec<_>>();
    let last = segments
        .pop()
        .ok_or_else(|| backend("empty update path"))?
        .to_string();

    let mut current = document;
    for segment in segments {
        if !current.contains_key(segment) {
            current.insert(segment, bson::Document::new());
        }

        current = match current.get_mut(segment) {
            Some(Bson::Document(child)) => child,
            _ => return Err(backend(format!("cannot traverse {segment} in {path}"))),
        };
    }

    Ok((current, last))
}

fn get_mut<'a>(document: &'a mut bson::Document, path: &str) -> Option<&'a mut Bson> {
    let mut segments = path.split('.');
    let mut current = document.get_mut(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(child) => child.get_mut(segment)?,
            Bson::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

pub(crate) fn set_path(document: &mut bson::Document, path: &str, value: Bson) -> MapperResult<()> {
    let (parent, key) = slot(document, path)?;
    parent.insert(key, value);
    Ok(())
}

fn unset_path(document: &mut bson::Document, path: &str) {
    match path.rsplit_once('.') {
        Some((parent, key)) => {
            if let Some(Bson::Document(parent)) = get_mut(document, parent) {
                parent.remove(key);
            }
        }
        None => {
            document.remove(path);
        }
    }
}

fn array_at<'a>(document: &'a mut bson::Document, path: &str) -> MapperResult<&'a mut Vec<Bson>> {
    let (parent, key) = slot(document, path)?;

    if !parent.contains_key(&key) {
        parent.insert(key.clone(), Bson::Array(Vec::new()));
    }

    match parent.get_mut(&key) {
        Some(Bson::Array(items)) => Ok(items),
        Some(other) => Err(backend(format!("{path} is not an array: {other}"))),
        None => Err(backend(format!("{path} could not be created"))),
    }
}

fn increment(current: Option<&Bson>, amount: &Bson, path: &str) -> MapperResult<Bson> {
    let current = current.unwrap_or(&Bson::Int32(0));
    let overflow = || backend(format!("$inc of {path} ({current}) by {amount} overflows"));

    Ok(match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b))),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (a, b) => match (number(a), number(b)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return Err(backend(format!("cannot $inc {path} ({current}) by {amount}"))),
        },
    })
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn same(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

fn each(operand: &Bson) -> Vec<Bson> {
    match operand {
        Bson::Document(spec) if spec.contains_key("$each") => match spec.get("$each") {
            Some(Bson::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        },
        other => vec![other.clone()],
    }
}

fn pulls(item: &Bson, condition: &Bson) -> MapperResult<bool> {
    match (item, condition) {
        (Bson::Document(sub), Bson::Document(filter))
            if !filter.keys().all(|key| key.starts_with('$')) =>
        {
            DocumentEvaluator::new(sub).matches(filter)
        }
        (_, Bson::Document(filter)) if filter.keys().all(|key| key.starts_with('$')) => {
            matches_condition(&[item], condition)
        }
        _ => Ok(same(item, condition)),
    }
}

fn apply_operator(document: &mut bson::Document, op: &str, path: &str, operand: &Bson) -> MapperResult<()> {
    match op {
        "$set" => set_path(document, path, operand.clone())?,
        "$unset" => unset_path(document, path),
        "$inc" => {
            let updated = increment(get_mut(document, path).map(|value| &*value), operand, path)?;
            set_path(document, path, updated)?;
        }
        "$push" => array_at(document, path)?.extend(each(operand)),
        "$addToSet" => {
            let items = array_at(document, path)?;
            for value in each(operand) {
                if !items.iter().any(|item| same(item, &value)) {
                    items.push(value);
                }
            }
        }
        "$pull" => {
            let items = array_at(document, path)?;
            let mut kept = Vec::with_capacity(items.len());

            for item in items.drain(..) {
                if !pulls(&item, operand)? {
                    kept.push(item);
                }
            }

            *items = kept;
        }
        "$pullAll" => {
            let values = operand
                .as_array()
                .ok_or_else(|| backend(format!("$pullAll needs an array, got {operand}")))?;

            array_at(document, path)?.retain(|item| !values.iter().any(|value| same(item, value)));
        }
        "$pop" => {
            let items = array_at(document, path)?;

            if number(operand).is_some_and(|direction| direction < 0.0) {
                if !items.is_empty() {
                    items.remove(0);
                }
            } else {
                items.pop();
            }
        }
        _ => return Err(backend(format!("unsupported update operator {op}"))),
    }

    Ok(())
}

/// Applies an update document in place: either an operator map, or a full replacement
/// that keeps the stored `_id`.
pub(crate) fn apply_update(document: &mut bson::Document, update: &bson::Document) -> MapperResult<()> {
    if !update.keys().any(|key| key.starts_with('$')) {
        let id = document.get("_id").cloned();
        *document = update.clone();

        if let Some(id) = id {
            document.insert("_id", id);
        }

        return Ok(());
    }

    for (op, entries) in update {
        let entries = entries
            .as_document()
            .ok_or_else(|| backend(format!("{op} needs a document, got {entries}")))?;

        for (path, operand) in entries {
            apply_operator(document, op, path, operand)?;
        }
    }

    Ok(())
}

/// The document an upsert starts from: the equality clauses of its filter.
pub(crate) fn seed(filter: &bson::Document) -> MapperResult<bson::Document> {
    let mut document = bson::Document::new();

    for (path, condition) in filter {
        if path.starts_with('$') {
            continue;
        }

        match condition {
            Bson::Document(ops) if ops.keys().any(|key| key.starts_with('$')) => {
                if let Some(value) = ops.get("$eq") {
                    set_path(&mut document, path, value.clone())?;
                }
            }
            value => set_path(&mut document, path, value.clone())?,
        }
    }

    Ok(document)
}

fn copy_path(source: &bson::Document, target: &mut bson::Document, path: &str) -> MapperResult<()> {
    let mut value = source;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        match (value.get(segment), segments.peek()) {
            (Some(found), None) => return set_path(target, path, found.clone()),
            (Some(Bson::Document(child)), Some(_)) => value = child,
            _ => return Ok(()),
        }
    }

    Ok(())
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless excluded.
/// First element of the top-level array at `path` matching the selector's `$elemMatch`.
fn first_element_match(
    document: &bson::Document,
    path: &str,
    selector: &bson::Document,
) -> MapperResult<Option<Bson>> {
    let (Ok(items), Some(condition)) = (document.get_array(path), selector.get("$elemMatch")) else {
        return Ok(None);
    };

    for item in items {
        if pulls(item, condition)? {
            return Ok(Some(item.clone()));
        }
    }

    Ok(None)
}

pub(crate) fn project(document: &bson::Document, projection: &bson::Document) -> MapperResult<bson::Document> {
    let inclusive = projection
        .iter()
        .any(|(key, flag)| key != "_id" && number(flag).map_or(true, |n| n != 0.0) && !matches!(flag, Bson::Boolean(false)));

    if inclusive {
        let mut projected = bson::Document::new();

        if !matches!(projection.get("_id"), Some(Bson::Int32(0) | Bson::Boolean(false))) {
            if let Some(id) = document.get("_id") {
                projected.insert("_id", id.clone());
            }
        }

        for (path, flag) in projection.iter().filter(|(key, _)| *key != "_id") {
            match flag {
                Bson::Document(selector) if selector.contains_key("$elemMatch") => {
                    if let Some(item) = first_element_match(document, path, selector)? {
                        set_path(&mut projected, path, Bson::Array(vec![item]))?;
                    }
                }
                _ => copy_path(document, &mut projected, path)?,
            }
        }

        return Ok(projected);
    }

    let mut projected = document.clone();
    for path in projection.keys() {
        unset_path(&mut projected, path);
    }

    Ok(projected)
}
