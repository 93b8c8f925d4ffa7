use std::ops::Range;

/// A `{{...}}` transclusion located in a piece of wikitext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCall {
    pub start: usize,
    pub end: usize,
    /// Number of enclosing template calls.
    pub depth: usize,
    pub name: String,
}

impl TemplateCall {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Span of the call plus one directly following newline, if any.
    pub fn span_with_newline(&self, source: &str) -> Range<usize> {
        let end = if source.as_bytes().get(self.end) == Some(&b'\n') {
            self.end + 1
        } else {
            self.end
        };
        self.start..end
    }
}

/// Every template call in `text`, nested ones included, ordered by start.
/// Comments and `<nowiki>` blocks are skipped; unbalanced braces are ignored.
pub fn template_calls(text: &str) -> Vec<TemplateCall> {
    let bytes = text.as_bytes();
    let mut open = Vec::new();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        if let Some(skip_to) = skip_inert_block(text, cursor) {
            cursor = skip_to;
            continue;
        }
        if cursor + 1 < bytes.len() && bytes[cursor] == b'{' && bytes[cursor + 1] == b'{' {
            open.push(cursor);
            cursor += 2;
            continue;
        }
        if cursor + 1 < bytes.len() && bytes[cursor] == b'}' && bytes[cursor + 1] == b'}' {
            if let Some(start) = open.pop() {
                let end = cursor + 2;
                out.push(TemplateCall {
                    start,
                    end,
                    depth: open.len(),
                    name: template_name(&text[start..end]),
                });
            }
            cursor += 2;
            continue;
        }
        cursor += 1;
    }

    out.sort_by_key(|call| call.start);
    out
}

/// Calls that are not nested inside another call.
pub fn top_level_calls(text: &str) -> Vec<TemplateCall> {
    template_calls(text)
        .into_iter()
        .filter(|call| call.depth == 0)
        .collect()
}

/// Byte ranges of the call's parameters (the text after each top-level `|`),
/// relative to `source`.
pub fn parameter_spans(source: &str, call: &TemplateCall) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let inner_end = call.end - 2;
    let mut spans = Vec::new();
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut current: Option<usize> = None;
    let mut cursor = call.start + 2;

    while cursor < inner_end {
        if let Some(skip_to) = skip_inert_block(source, cursor) {
            cursor = skip_to.min(inner_end);
            continue;
        }
        let pair = bytes.get(cursor..cursor + 2);
        match pair {
            Some(b"{{") => {
                braces += 1;
                cursor += 2;
                continue;
            }
            Some(b"}}") if braces > 0 => {
                braces -= 1;
                cursor += 2;
                continue;
            }
            Some(b"[[") => {
                brackets += 1;
                cursor += 2;
                continue;
            }
            Some(b"]]") if brackets > 0 => {
                brackets -= 1;
                cursor += 2;
                continue;
            }
            _ => {}
        }
        if bytes[cursor] == b'|' && braces == 0 && brackets == 0 {
            if let Some(start) = current {
                spans.push(start..cursor);
            }
            current = Some(cursor + 1);
        }
        cursor += 1;
    }
    if let Some(start) = current {
        spans.push(start..inner_end);
    }
    spans
}

/// Split a parameter into its name and value when it has a top-level `=`.
pub fn named_parameter(parameter: &str) -> Option<(&str, &str)> {
    let bytes = parameter.as_bytes();
    let mut braces = 0usize;
    let mut cursor = 0usize;
    while cursor < bytes.len() {
        match bytes.get(cursor..cursor + 2) {
            Some(b"{{") | Some(b"[[") => {
                braces += 1;
                cursor += 2;
                continue;
            }
            Some(b"}}") | Some(b"]]") if braces > 0 => {
                braces -= 1;
                cursor += 2;
                continue;
            }
            _ => {}
        }
        if bytes[cursor] == b'=' && braces == 0 {
            let name = parameter[..cursor].trim();
            if name.is_empty() {
                return None;
            }
            return Some((name, &parameter[cursor + 1..]));
        }
        cursor += 1;
    }
    None
}

/// Remove the given spans; spans nested in an earlier span are ignored.
pub fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut ordered = spans.to_vec();
    ordered.sort_by_key(|span| (span.start, std::cmp::Reverse(span.end)));

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for span in ordered {
        if span.start < cursor {
            continue;
        }
        output.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Template name as written, without a `Template:` prefix.
pub fn template_name(call_text: &str) -> String {
    let inner = call_text.strip_prefix("{{").unwrap_or(call_text);
    let inner = inner.strip_suffix("}}").unwrap_or(inner);
    let end = inner.find(['|', '{', '}']).unwrap_or(inner.len());
    let mut name = inner[..end].trim();
    if let Some(comment) = name.find("<!--") {
        name = name[..comment].trim();
    }
    for prefix in ["Template:", "template:", "داڕێژە:"] {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped.trim();
        }
    }
    name.replace('_', " ")
}

/// Byte offset of the first character after a comment or `<nowiki>` block
/// starting at `cursor`.
fn skip_inert_block(text: &str, cursor: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes[cursor] != b'<' {
        return None;
    }
    let rest = &bytes[cursor..];
    if rest.starts_with(b"<!--") {
        let from = cursor + 4;
        return Some(
            text[from..]
                .find("-->")
                .map(|offset| from + offset + 3)
                .unwrap_or(text.len()),
        );
    }
    if rest.len() >= 8 && rest[..8].eq_ignore_ascii_case(b"<nowiki>") {
        let from = cursor + 8;
        return Some(
            find_ascii_case_insensitive(bytes, from, b"</nowiki>")
                .map(|offset| offset + 9)
                .unwrap_or(text.len()),
        );
    }
    None
}

fn find_ascii_case_insensitive(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&index| haystack[index..index + needle.len()].eq_ignore_ascii_case(needle))
}
