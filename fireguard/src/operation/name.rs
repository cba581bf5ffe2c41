//! Display name resolution for operations.

/// Name used when nothing better is known.
pub const FALLBACK_NAME: &str = "GuardedTask";

/// Resolves a display name.
///
/// Precedence: explicit name, then a hint carried by the work, then the
/// factory's declared identifier, then [`FALLBACK_NAME`]. Blank candidates
/// are skipped.
#[must_use]
pub fn resolve_name(explicit: Option<&str>, hint: Option<&str>, declared: Option<&str>) -> String {
    [explicit, hint]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .or_else(|| declared.and_then(declared_identifier))
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Extracts a readable identifier from a `std::any::type_name` string.
///
/// Function items yield their last path segment. Closures and async blocks
/// have no usable identifier.
#[must_use]
pub fn declared_identifier(type_name: &str) -> Option<String> {
    if type_name.contains("{{closure}}") || type_name.contains("{closure") {
        return None;
    }
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let segment = without_generics.rsplit("::").next()?.trim();
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| segment.to_string())
}
