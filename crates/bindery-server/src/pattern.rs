//! Path templates used for both context prefixes and bindlet patterns.
//!
//! A template is a `/`-separated list of literal segments, optionally ending
//! in a `*` segment that matches any remaining path. Empty segments on
//! either side are ignored, so `/api//sum` and `/api/sum` are equivalent.
//!
//! Matching never fails loudly: a malformed template simply matches nothing.

use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Wildcard,
}

/// Parse a template into segments, or `None` if it is malformed.
///
/// Malformed: empty, not starting with `/`, a `*` anywhere but the final
/// segment, or a segment mixing `*` with other characters.
fn parse_template(template: &str) -> Option<Vec<Segment<'_>>> {
    if !template.starts_with('/') {
        return None;
    }
    let raw: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let mut segments = Vec::with_capacity(raw.len());
    for (i, seg) in raw.iter().enumerate() {
        if *seg == "*" {
            if i + 1 != raw.len() {
                return None;
            }
            segments.push(Segment::Wildcard);
        } else if seg.contains('*') {
            return None;
        } else {
            segments.push(Segment::Literal(seg));
        }
    }
    Some(segments)
}

/// Byte spans of the non-empty segments of `path`.
fn segment_spans(path: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, b) in path.bytes().enumerate() {
        if b == b'/' {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, path.len()));
    }
    spans
}

/// Whether `template` is well formed.
pub fn is_valid_template(template: &str) -> bool {
    parse_template(template).is_some()
}

/// Match `path` against `template`.
///
/// Returns the captured remainder on success: the part of `path` after the
/// last literal segment when the template ends in `*` (starting with `/`,
/// or empty), and the empty string for an exact match.
pub fn match_path<'p>(template: &str, path: &'p str) -> Option<&'p str> {
    let Some(segments) = parse_template(template) else {
        trace!("Ignoring malformed path template: {template:?}");
        return None;
    };

    let spans = segment_spans(path);
    let mut consumed = 0usize;
    let mut cursor = 0usize;

    for segment in &segments {
        match segment {
            Segment::Literal(literal) => {
                let (start, end) = *spans.get(consumed)?;
                if &path[start..end] != *literal {
                    return None;
                }
                consumed += 1;
                cursor = end;
            }
            Segment::Wildcard => {
                return Some(if consumed == 0 { path } else { &path[cursor..] });
            }
        }
    }

    if consumed == spans.len() {
        Some(&path[path.len()..])
    } else {
        None
    }
}
