//! Text transformations applied by migrations.
//!
//! | Kind | Effect |
//! |------|--------|
//! | `replace` | Regex, every match; `$1`, `${name}` expanded when the group exists, any other `$` kept literally; replacement defaults to "" |
//! | `remove` | Regex, every match replaced by "" |
//! | `rename` | Literal whole-word replacement, no expansion |
//! | `add` | Appends the replacement text |
//! | `modify`, `restructure` | Not applied to text; reported as a warning |

use regex::{NoExpand, Regex};

use crate::models::{Condition, TransformKind, Transformation};

/// Check that a transformation can be applied at all: patterns compile and
/// the fields its kind needs are present.
pub fn validate(transformation: &Transformation) -> Result<(), String> {
    match transformation.kind {
        TransformKind::Replace | TransformKind::Remove => {
            compile(&transformation.target)?;
        }
        TransformKind::Rename => {
            if transformation.target.trim().is_empty() {
                return Err("rename needs a non-empty target".to_string());
            }
            if transformation.replacement.is_none() {
                return Err(format!("rename of '{}' has no replacement", transformation.target));
            }
        }
        TransformKind::Add => {
            if transformation.replacement.is_none() {
                return Err("add needs the text to append as replacement".to_string());
            }
        }
        TransformKind::Modify | TransformKind::Restructure => {}
    }

    if let Some(pattern) = transformation.condition.as_ref().and_then(Condition::pattern) {
        compile(pattern)?;
    }
    Ok(())
}

/// Evaluate a condition against the current content.
pub fn condition_holds(condition: &Condition, content: &str) -> Result<bool, String> {
    Ok(match condition {
        Condition::Contains(text) => content.contains(text.as_str()),
        Condition::NotContains(text) => !content.contains(text.as_str()),
        Condition::Matches(pattern) => compile(pattern)?.is_match(content),
        Condition::NotMatches(pattern) => !compile(pattern)?.is_match(content),
    })
}

/// Apply one transformation to `content`.
///
/// Returns the new content, plus a warning for transformations that were not
/// applied (structural kinds or a false condition).
pub fn apply(
    content: String,
    transformation: &Transformation,
) -> Result<(String, Option<String>), String> {
    if let Some(condition) = &transformation.condition {
        if !condition_holds(condition, &content)? {
            tracing::debug!(
                "Condition {:?} not met, skipping {} of '{}'",
                condition,
                transformation.kind,
                transformation.target
            );
            return Ok((content, None));
        }
    }

    let replacement = transformation.replacement.as_deref().unwrap_or("");

    let updated = match transformation.kind {
        TransformKind::Replace => {
            let pattern = compile(&transformation.target)?;
            let replacement = escape_unknown_groups(&pattern, replacement);
            pattern.replace_all(&content, replacement.as_str()).into_owned()
        }
        TransformKind::Remove => {
            compile(&transformation.target)?.replace_all(&content, NoExpand("")).into_owned()
        }
        TransformKind::Rename => {
            let word = compile(&format!(r"\b{}\b", regex::escape(&transformation.target)))?;
            word.replace_all(&content, NoExpand(replacement)).into_owned()
        }
        TransformKind::Add => {
            let mut appended = content;
            appended.push_str(replacement);
            appended
        }
        TransformKind::Modify | TransformKind::Restructure => {
            let warning = format!(
                "{} of '{}' needs a structural edit and was not applied",
                transformation.kind, transformation.target
            );
            return Ok((content, Some(warning)));
        }
    };

    Ok((updated, None))
}

/// Double every `$` that does not start a reference to a group `pattern`
/// actually has, so prices and shell variables survive expansion. `$$` is
/// left as the escaped dollar it already is.
fn escape_unknown_groups(pattern: &Regex, replacement: &str) -> String {
    let is_group = |name: &str| match name.parse::<usize>() {
        Ok(index) => index < pattern.captures_len(),
        Err(_) => pattern.capture_names().flatten().any(|n| n == name),
    };

    let mut escaped = String::with_capacity(replacement.len());
    let mut rest = replacement;
    while let Some(pos) = rest.find('$') {
        escaped.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            escaped.push_str("$$");
            rest = tail;
            continue;
        }

        let reference = if let Some(braced) = after.strip_prefix('{') {
            braced.find('}').map(|end| (&braced[..end], end + 2))
        } else {
            let end = after
                .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
                .unwrap_or(after.len());
            (end > 0).then(|| (&after[..end], end))
        };

        match reference {
            Some((name, len)) if is_group(name) => {
                escaped.push('$');
                escaped.push_str(&after[..len]);
                rest = &after[len..];
            }
            _ => {
                escaped.push_str("$$");
                rest = after;
            }
        }
    }
    escaped.push_str(rest);
    escaped
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}
