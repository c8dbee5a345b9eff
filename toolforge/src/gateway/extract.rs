//! Pull source code and JSON objects out of free-form model responses.

use crate::synthesis::signature::normalize_annotations;

/// A fenced block: info string (lowercased) and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub lang: String,
    pub body: String,
}

/// All ``` fenced blocks in `text`, in order. An unterminated block runs to
/// the end of the text.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    current = Some((info.trim().to_lowercase(), Vec::new()));
                }
            }
            Some((lang, body)) if trimmed.starts_with("```") => {
                blocks.push(FencedBlock {
                    lang,
                    body: body.join("\n"),
                });
            }
            Some((lang, mut body)) => {
                body.push(line);
                current = Some((lang, body));
            }
        }
    }
    if let Some((lang, body)) = current {
        blocks.push(FencedBlock {
            lang,
            body: body.join("\n"),
        });
    }
    blocks
}

fn defines(body: &str, entry: &str) -> bool {
    body.lines().any(|line| {
        line.trim_start()
            .strip_prefix("def ")
            .map(|rest| {
                rest.trim_start()
                    .strip_prefix(entry)
                    .map_or(false, |after| after.trim_start().starts_with('('))
            })
            .unwrap_or(false)
    })
}

fn raw_source(response: &str, entry: &str) -> Option<String> {
    let blocks = fenced_blocks(response);
    let python: Vec<&FencedBlock> = blocks
        .iter()
        .filter(|b| b.lang == "python" || b.lang == "py" || b.lang == "python3")
        .collect();
    if let Some(block) = python
        .iter()
        .find(|b| defines(&b.body, entry))
        .or_else(|| python.first())
    {
        return Some(block.body.clone());
    }
    if let Some(block) = blocks.iter().find(|b| b.body.contains("def ")) {
        if let Some(code) = code_field(&block.body) {
            return Some(code);
        }
        return Some(block.body.clone());
    }

    if let Some(code) = code_field(response.trim()) {
        return Some(code);
    }

    let trimmed = response.trim();
    if trimmed.starts_with("def ") {
        return Some(trimmed.to_string());
    }

    let mut offset = 0;
    for line in response.split_inclusive('\n') {
        let head = line.trim_start();
        if head.starts_with("def ") || head.starts_with("import ") || head.starts_with("from ") {
            let tail = &response[offset..];
            return tail.contains("def ").then(|| tail.to_string());
        }
        offset += line.len();
    }
    None
}

/// A YAML (or JSON) mapping with a string `code` field.
fn code_field(text: &str) -> Option<String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    let code = doc.get("code")?.as_str()?;
    code.contains("def ").then(|| code.to_string())
}

/// Extract the candidate source for `entry` from a model response and apply
/// annotation normalization. `None` when no function definition is present.
pub fn extract_source(response: &str, entry: &str) -> Option<String> {
    let raw = raw_source(response, entry)?;
    let body = raw.trim_matches('\n').trim_end();
    if body.trim().is_empty() {
        return None;
    }
    let mut source = normalize_annotations(body);
    source.push('\n');
    Some(source)
}

/// Parse the first JSON object in `text`: the whole text, a ```json block,
/// then the outermost `{ ... }` span.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let parse = |candidate: &str| {
        serde_json::from_str::<serde_json::Value>(candidate.trim())
            .ok()
            .filter(|v| v.is_object())
    };
    if let Some(value) = parse(text) {
        return Some(value);
    }
    for block in fenced_blocks(text) {
        if block.lang.is_empty() || block.lang == "json" {
            if let Some(value) = parse(&block.body) {
                return Some(value);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse(&text[start..=end])
}
