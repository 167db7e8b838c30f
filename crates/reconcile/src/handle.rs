//! Composite external identifiers.
//!
//! A handle is what the front end persists to find an object again. Scoped
//! kinds join scope and name with `_`; scope ids never contain one, so the
//! first underscore is the split point. Security policy names can, so those
//! handles are split against the policies that actually exist.

use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Join a scope and a name into a handle.
#[must_use]
pub fn join(scope: &str, name: &str) -> String {
    format!("{scope}_{name}")
}

/// Split `<scope>_<name>` at the first underscore.
pub fn split_scoped(kind: ResourceKind, handle: &str) -> Result<(String, String)> {
    match handle.split_once('_') {
        Some((scope, name)) if !scope.is_empty() && !name.is_empty() => {
            Ok((scope.to_string(), name.to_string()))
        }
        _ => Err(Error::validation(
            kind,
            handle,
            "expected an identifier of the form <scope>_<name>",
        )),
    }
}

/// Split `<parent>_<name>` where the parent may itself contain underscores.
///
/// The longest existing parent that leaves a non-empty name wins.
pub fn split_against<'a>(
    kind: ResourceKind,
    handle: &str,
    parents: impl IntoIterator<Item = &'a str>,
) -> Result<Option<(String, String)>> {
    if !handle.contains('_') {
        return Err(Error::validation(
            kind,
            handle,
            "expected an identifier of the form <parent>_<name>",
        ));
    }

    let best = parents
        .into_iter()
        .filter(|parent| {
            handle
                .strip_prefix(parent)
                .and_then(|rest| rest.strip_prefix('_'))
                .is_some_and(|name| !name.is_empty())
        })
        .max_by_key(|parent| parent.len());

    Ok(best.map(|parent| {
        let name = &handle[parent.len() + 1..];
        (parent.to_string(), name.to_string())
    }))
}

/// Parse a bare numeric identifier.
pub fn numeric(kind: ResourceKind, handle: &str) -> Result<i64> {
    handle
        .trim()
        .parse()
        .map_err(|_| Error::validation(kind, handle, "expected a numeric identifier"))
}
