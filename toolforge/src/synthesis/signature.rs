//! Signature inspection for candidate sources.
//!
//! Reads the `def` line of the requested entry function and maps each
//! parameter annotation onto a [`TypeTag`]. Candidates are always called
//! positionally, so variadics and defaulted keyword-only parameters are left
//! out of the synthesized argument tuple, and a keyword-only parameter
//! without a default is an error.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Parameter, TypeTag};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no definition found for entry function '{0}'")]
    MissingDefinition(String),
    #[error("parameter '{0}' has no declared type")]
    UntypedParameter(String),
    #[error("malformed signature for '{0}': unbalanced brackets")]
    Unbalanced(String),
    #[error("keyword-only parameter '{0}' has no default; tools are called with positional arguments only")]
    RequiredKeywordOnly(String),
}

/// Parameters and return type of an entry function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: TypeTag,
}

impl Signature {
    pub fn parameter_types(&self) -> Vec<TypeTag> {
        self.parameters
            .iter()
            .map(|p| p.declared_type.clone())
            .collect()
    }

    /// `name(a: int, b: list[str]) -> float`
    pub fn render(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.declared_type.python_name()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) -> {}", self.name, params, self.return_type.python_name())
    }
}

/// Inspect `source` for the function named `entry`.
pub fn inspect(source: &str, entry: &str) -> Result<Signature, SignatureError> {
    let def_re = Regex::new(&format!(
        r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+{}[ \t]*\(",
        regex::escape(entry)
    ))
    .map_err(|_| SignatureError::MissingDefinition(entry.to_string()))?;

    let found = def_re
        .find(source)
        .ok_or_else(|| SignatureError::MissingDefinition(entry.to_string()))?;

    let rest = &source[found.end()..];
    let close = matching_paren(rest).ok_or_else(|| SignatureError::Unbalanced(entry.to_string()))?;
    let param_text = strip_comments(&rest[..close]);
    let after = &rest[close + 1..];

    let mut parameters = Vec::new();
    let mut keyword_only = false;
    for raw in split_top_level(&param_text, ',') {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" || raw.starts_with("**") {
            continue;
        }
        // A bare `*` or `*args` makes every later parameter keyword-only.
        if raw.starts_with('*') {
            keyword_only = true;
            continue;
        }
        let default = find_top_level(raw, '=');
        if keyword_only {
            if default.is_none() {
                let name = find_top_level(raw, ':').map_or(raw, |idx| &raw[..idx]);
                return Err(SignatureError::RequiredKeywordOnly(name.trim().to_string()));
            }
            continue;
        }
        let without_default = match default {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        match find_top_level(without_default, ':') {
            Some(idx) => {
                let name = without_default[..idx].trim();
                let annotation = without_default[idx + 1..].trim();
                if annotation.is_empty() {
                    return Err(SignatureError::UntypedParameter(name.to_string()));
                }
                parameters.push(Parameter::new(name, parse_annotation(annotation)));
            }
            None => {
                return Err(SignatureError::UntypedParameter(
                    without_default.trim().to_string(),
                ))
            }
        }
    }

    let return_type = return_annotation(after)
        .map(parse_annotation)
        .unwrap_or(TypeTag::Any);

    Ok(Signature {
        name: entry.to_string(),
        parameters,
        return_type,
    })
}

/// Text between `->` and the body colon, if present.
fn return_annotation(after_params: &str) -> Option<&str> {
    let trimmed = after_params.trim_start();
    let annotated = trimmed.strip_prefix("->")?;
    let end = find_top_level(annotated, ':')?;
    let text = annotated[..end].trim();
    (!text.is_empty()).then_some(text)
}

/// Map a Python annotation onto a type tag.
pub fn parse_annotation(annotation: &str) -> TypeTag {
    let cleaned = annotation
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .replace("typing.", "")
        .replace("collections.abc.", "");
    let text = cleaned.trim();

    let union_parts = split_top_level(text, '|');
    if union_parts.len() > 1 {
        let non_null: Vec<&str> = union_parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| *p != "None")
            .collect();
        return match non_null.as_slice() {
            [single] => parse_annotation(single),
            _ => TypeTag::Any,
        };
    }

    if let (Some(open), true) = (text.find('['), text.ends_with(']')) {
        let head = text[..open].trim();
        let inner = &text[open + 1..text.len() - 1];
        let args: Vec<&str> = split_top_level(inner, ',')
            .into_iter()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();
        return match head {
            "Optional" => args.first().map(|a| parse_annotation(a)).unwrap_or(TypeTag::Any),
            "Union" => {
                let non_null: Vec<&&str> = args.iter().filter(|a| **a != "None").collect();
                match non_null.as_slice() {
                    [single] => parse_annotation(single),
                    _ => TypeTag::Any,
                }
            }
            "list" | "List" | "Sequence" | "MutableSequence" | "Iterable" | "set" | "Set"
            | "frozenset" | "FrozenSet" => TypeTag::sequence_of(
                args.first().map(|a| parse_annotation(a)).unwrap_or(TypeTag::Any),
            ),
            "tuple" | "Tuple" => TypeTag::sequence_of(tuple_element(&args)),
            "dict" | "Dict" | "Mapping" | "MutableMapping" => TypeTag::Mapping,
            _ => TypeTag::Any,
        };
    }

    match text {
        "str" => TypeTag::String,
        "int" => TypeTag::Integer,
        "float" => TypeTag::Float,
        "bool" => TypeTag::Boolean,
        "list" | "List" | "Sequence" | "MutableSequence" | "Iterable" | "tuple" | "Tuple"
        | "set" | "Set" | "frozenset" => TypeTag::sequence_of(TypeTag::Any),
        "dict" | "Dict" | "Mapping" | "MutableMapping" => TypeTag::Mapping,
        _ => TypeTag::Any,
    }
}

/// Homogeneous tuples map to their element type; mixed tuples to any.
fn tuple_element(args: &[&str]) -> TypeTag {
    match args {
        [] => TypeTag::Any,
        [single] => parse_annotation(single),
        [first, "..."] => parse_annotation(first),
        [first, rest @ ..] => {
            let head = parse_annotation(first);
            if rest.iter().all(|a| parse_annotation(a) == head) {
                head
            } else {
                TypeTag::Any
            }
        }
    }
}

/// Byte offset of the `)` closing an already-opened parenthesis.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    for (idx, ch) in text.char_indices() {
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '#' => in_comment = true,
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return (ch == ')').then_some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    for (idx, ch) in text.char_indices() {
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '#' => in_comment = true,
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == needle && depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

/// `text` with `#` comments removed; `#` inside quotes is kept.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    for ch in text.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push(ch);
            }
            continue;
        }
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, '#') => {
                in_comment = true;
                continue;
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_top_level(rest, separator) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + separator.len_utf8()..];
    }
    parts.push(rest);
    parts
}

static BARE_GENERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(List|Dict)\b(\s*\[)?").expect("static regex"));
static JAVA_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(String|Integer|Boolean|Float)\b").expect("static regex"));

/// Rewrite common annotation slips produced by models: bare `List`/`Dict`
/// and Java-style scalar names. Import lines are left untouched.
pub fn normalize_annotations(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let head = line.trim_start();
        if head.starts_with("import ") || head.starts_with("from ") {
            out.push_str(line);
            continue;
        }
        let step = BARE_GENERIC_RE.replace_all(line, |caps: &Captures| {
            if caps.get(2).is_some() {
                caps[0].to_string()
            } else if &caps[1] == "List" {
                "list".to_string()
            } else {
                "dict".to_string()
            }
        });
        let step = JAVA_STYLE_RE.replace_all(&step, |caps: &Captures| {
            match &caps[1] {
                "String" => "str",
                "Integer" => "int",
                "Boolean" => "bool",
                _ => "float",
            }
            .to_string()
        });
        out.push_str(&step);
    }
    out
}

/// First triple-quoted string in the body of `entry`, dedented.
pub fn extract_docstring(source: &str, entry: &str) -> Option<String> {
    let def_re = Regex::new(&format!(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+{}\b", regex::escape(entry))).ok()?;
    let start = def_re.find(source)?.end();
    let header = &source[start..];
    let open = header.find('(')?;
    let close = open + 1 + matching_paren(&header[open + 1..])?;
    let after_params = &header[close + 1..];
    let colon = find_top_level(after_params, ':')?;
    let rest = &after_params[colon + 1..];
    let body = rest[rest.find('\n')? + 1..].trim_start();
    let delim = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        return None;
    };
    let inner = &body[delim.len()..];
    let end = inner.find(delim)?;
    let text = inner[..end]
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}
