//! Step output references.
//!
//! Plan arguments may embed `{step_N_output}`, where `N` is the decimal id
//! of an earlier step. Before a step runs, every string leaf of its
//! arguments is scanned and each reference replaced with that step's
//! recorded output text. A reference to a step with no recorded output
//! becomes `[step N output unavailable]`; resolution never fails.

use std::collections::BTreeMap;

use serde_json::Value;

const OPEN: &str = "{step_";
const CLOSE: &str = "_output}";

/// A piece of a parsed template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    StepRef(u32),
    /// A well-formed reference whose id does not fit in a `u32`. No step
    /// can have it, so it always resolves to the placeholder.
    OutOfRange(&'a str),
}

/// Split `input` into literal text and step references.
///
/// Anything that is not exactly `{step_<digits>_output}` stays literal.
pub fn parse(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(OPEN) {
        let start = cursor + offset;
        match parse_ref(&input[start..]) {
            Some((segment, len)) => {
                if literal_start < start {
                    segments.push(Segment::Literal(&input[literal_start..start]));
                }
                segments.push(segment);
                cursor = start + len;
                literal_start = cursor;
            }
            None => cursor = start + 1,
        }
    }

    if literal_start < input.len() {
        segments.push(Segment::Literal(&input[literal_start..]));
    }
    segments
}

/// Match a reference at the start of `s`, returning its segment and the
/// byte length consumed.
fn parse_ref(s: &str) -> Option<(Segment<'_>, usize)> {
    let rest = s.strip_prefix(OPEN)?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || !rest[digits..].starts_with(CLOSE) {
        return None;
    }
    let text = &rest[..digits];
    let segment = match text.parse() {
        Ok(id) => Segment::StepRef(id),
        Err(_) => Segment::OutOfRange(text),
    };
    Some((segment, OPEN.len() + digits + CLOSE.len()))
}

/// Ids referenced by `input`, in order of appearance.
pub fn references(input: &str) -> Vec<u32> {
    parse(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::StepRef(id) => Some(id),
            Segment::Literal(_) | Segment::OutOfRange(_) => None,
        })
        .collect()
}

/// Text substituted for a reference whose step has no recorded output.
pub fn unavailable(id: impl std::fmt::Display) -> String {
    format!("[step {id} output unavailable]")
}

/// Replace every reference in `input` with the recorded output.
pub fn resolve_text(input: &str, outputs: &BTreeMap<u32, String>) -> String {
    let segments = parse(input);
    if segments.iter().all(|s| matches!(s, Segment::Literal(_))) {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    for seg in segments {
        match seg {
            Segment::Literal(text) => out.push_str(text),
            Segment::StepRef(id) => match outputs.get(&id) {
                Some(text) => out.push_str(text),
                None => {
                    tracing::debug!(step_ref = id, "referenced step output unavailable");
                    out.push_str(&unavailable(id));
                }
            },
            Segment::OutOfRange(digits) => {
                tracing::debug!(step_ref = digits, "step reference out of range");
                out.push_str(&unavailable(digits));
            }
        }
    }
    out
}

/// Resolve references in every string leaf of `args`, including strings
/// nested in arrays and objects. Other values are copied unchanged.
pub fn resolve_args(args: &Value, outputs: &BTreeMap<u32, String>) -> Value {
    match args {
        Value::String(s) => Value::String(resolve_text(s, outputs)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_args(v, outputs)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_args(v, outputs)))
                .collect(),
        ),
        other => other.clone(),
    }
}
