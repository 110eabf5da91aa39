//! A naive, simple oracle formatter for differential testing.
//!
//! Works straight from source text to `(text, entities)` over `char`
//! vectors, without building a tree.
use md_tom::core::entity::{Entity, EntityType, FormattedText};

const RULES: [(&str, EntityType); 4] = [
    ("**", EntityType::Bold),
    ("__", EntityType::Italic),
    ("~~", EntityType::Strike),
    ("[u]", EntityType::Underline),
];

const FENCE: &str = "```";

/// Span over output chars: `(type, start, end, language)`.
type Span = (EntityType, usize, usize, Option<String>);

pub fn format(source: &str) -> FormattedText {
    let lines = split_lines(source);
    let mut out: Vec<char> = Vec::new();
    let mut spans: Vec<Span> = Vec::new();
    let mut code: Option<(usize, Option<String>)> = None;

    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let is_fence = line.starts_with(FENCE);
        if code.is_some() || is_fence {
            let stripped = line.strip_prefix(FENCE).unwrap_or(line);
            let stripped = stripped.strip_suffix(FENCE).unwrap_or(stripped);
            match code.take() {
                Some((start, language)) if is_fence => {
                    out.extend(stripped.chars());
                    spans.push((EntityType::Code, start, out.len(), language));
                }
                Some(open) => {
                    out.extend(stripped.chars());
                    code = Some(open);
                }
                None => {
                    let start = out.len();
                    let word = stripped.trim();
                    let language = (!word.is_empty() && !word.contains(char::is_whitespace))
                        .then(|| word.to_string());
                    out.extend(stripped.chars());
                    code = Some((start, language));
                }
            }
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        if chars.first() == Some(&'>') {
            let start = out.len();
            inline(&chars[1..], &mut Vec::new(), true, &mut out, &mut spans);
            spans.push((EntityType::Blockquote, start, out.len(), None));
        } else {
            inline(&chars, &mut Vec::new(), true, &mut out, &mut spans);
        }
    }
    if let Some((start, language)) = code {
        spans.push((EntityType::Code, start, out.len(), language));
    }

    let text: String = out.iter().collect();
    let mut units = Vec::with_capacity(out.len() + 1);
    let mut total = 0;
    for ch in &out {
        units.push(total);
        total += ch.len_utf16();
    }
    units.push(total);

    let entities = spans
        .into_iter()
        .filter(|(_, start, end, _)| end > start)
        .map(|(kind, start, end, language)| Entity {
            kind,
            offset: units[start],
            length: units[end] - units[start],
            language,
        })
        .collect();
    FormattedText { text, entities }
}

fn split_lines(source: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in source.split('\n') {
        let mut rest = raw.to_string();
        loop {
            match rest.find(FENCE) {
                Some(at) if at > 0 => {
                    lines.push(rest[..at].to_string());
                    lines.push(FENCE.to_string());
                    rest = rest[at + FENCE.len()..].to_string();
                    if rest.is_empty() {
                        break;
                    }
                }
                _ => {
                    lines.push(rest);
                    break;
                }
            }
        }
    }
    lines
}

fn starts_with(chars: &[char], marker: &[char]) -> bool {
    chars.len() >= marker.len() && &chars[..marker.len()] == marker
}

fn closing(chars: &[char], from: usize, marker: &[char]) -> Option<usize> {
    let mut depth = 1;
    let mut j = from;
    while j < chars.len() {
        if !starts_with(&chars[j..], marker) {
            j += 1;
            continue;
        }
        let after = j + marker.len();
        let opens = j > 0 && chars[j - 1] == ' ' && after < chars.len() && chars[after] != ' ';
        if opens {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
        }
        j = after;
    }
    None
}

fn inline(
    chars: &[char],
    used: &mut Vec<&'static str>,
    leading: bool,
    out: &mut Vec<char>,
    spans: &mut Vec<Span>,
) {
    let mut i = 0;
    'scan: while i < chars.len() {
        let boundary = if i == 0 { leading } else { chars[i - 1] == ' ' };
        if boundary {
            for (marker, kind) in RULES {
                if used.contains(&marker) {
                    continue;
                }
                let m: Vec<char> = marker.chars().collect();
                if !starts_with(&chars[i..], &m) {
                    continue;
                }
                let inner = i + m.len();
                let Some(close) = closing(chars, inner, &m) else {
                    continue;
                };
                if close == inner {
                    continue;
                }
                let start = out.len();
                used.push(marker);
                inline(&chars[inner..close], used, true, out, spans);
                used.pop();
                spans.push((kind, start, out.len(), None));
                i = close + m.len();
                continue 'scan;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
}
