//! Failure classifier for candidate executions
//!
//! Parses execution diagnostics and classifies them so the repair request
//! carries a precise hint alongside the raw error text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ExecutionErrorKind;

/// Classification of an execution failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorClass {
    /// Source does not compile (invalid syntax, indentation)
    Syntax,
    /// Import of a module that is not available
    MissingDependency(String),
    /// Entry function not defined under the requested name
    MissingEntry,
    /// Exception raised while running (ValueError, TypeError, ...)
    Runtime(String),
    /// Wall-clock budget exceeded
    Timeout,
    /// Nothing recognizable in the diagnostic
    Unknown,
}

/// A classified failure with an optional fix suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub class: ErrorClass,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ClassifiedError {
    /// Diagnostic text with the suggestion appended as a hint line.
    pub fn with_hint(&self, diagnostic: &str) -> String {
        match &self.suggestion {
            Some(hint) => format!("{}\nHint: {}", diagnostic, hint),
            None => diagnostic.to_string(),
        }
    }
}

static MODULE_NOT_FOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ModuleNotFoundError|ImportError): No module named '([^']+)'")
        .expect("static regex")
});
static SYNTAX_ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:Syntax|Indentation|Tab)Error: (.+)").expect("static regex"));
static EXCEPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+(?:Error|Exception|Iteration|Exit)): ?(.*)$").expect("static regex")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorRefiner;

impl ErrorRefiner {
    pub fn new() -> Self {
        Self
    }

    /// Classify a failed outcome's kind and diagnostic text.
    pub fn classify(&self, kind: ExecutionErrorKind, text: &str) -> ClassifiedError {
        match kind {
            ExecutionErrorKind::Timeout => ClassifiedError {
                class: ErrorClass::Timeout,
                message: text.to_string(),
                suggestion: Some(
                    "The function did not finish in time. Remove unbounded loops and \
                     recursion; every input must terminate quickly."
                        .to_string(),
                ),
            },
            ExecutionErrorKind::NameError => ClassifiedError {
                class: ErrorClass::MissingEntry,
                message: text.to_string(),
                suggestion: Some(
                    "Define the function at module level with exactly the requested name."
                        .to_string(),
                ),
            },
            ExecutionErrorKind::CompileError | ExecutionErrorKind::RuntimeFailure => {
                self.classify_python_error(text)
            }
        }
    }

    /// Classify a Python diagnostic or traceback.
    pub fn classify_python_error(&self, text: &str) -> ClassifiedError {
        if let Some(caps) = MODULE_NOT_FOUND_RE.captures(text) {
            let module = caps.get(1).map_or("", |m| m.as_str()).to_string();
            return ClassifiedError {
                class: ErrorClass::MissingDependency(module.clone()),
                message: format!("Module not found: {}", module),
                suggestion: Some(format!(
                    "'{}' is not installed in the sandbox. Use only the Python standard library.",
                    module
                )),
            };
        }

        if let Some(caps) = SYNTAX_ERROR_RE.captures(text) {
            let details = caps.get(1).map_or("", |m| m.as_str()).to_string();
            return ClassifiedError {
                class: ErrorClass::Syntax,
                message: format!("Syntax error: {}", details),
                suggestion: Some(
                    "Check the code for typos or incorrect indentation and return only valid Python."
                        .to_string(),
                ),
            };
        }

        for line in text.lines().rev() {
            if let Some(caps) = EXCEPTION_RE.captures(line.trim()) {
                let error_type = caps.get(1).map_or("", |m| m.as_str()).to_string();
                let message = caps.get(2).map_or("", |m| m.as_str()).to_string();
                let suggestion = runtime_suggestion(&error_type, &message);
                return ClassifiedError {
                    class: ErrorClass::Runtime(error_type.clone()),
                    message: format!("{}: {}", error_type, message),
                    suggestion,
                };
            }
        }

        ClassifiedError {
            class: ErrorClass::Unknown,
            message: text.lines().last().unwrap_or_default().to_string(),
            suggestion: None,
        }
    }
}

fn runtime_suggestion(error_type: &str, message: &str) -> Option<String> {
    let lowered = message.to_lowercase();
    if lowered.contains("empty") || error_type == "ZeroDivisionError" || error_type == "IndexError" {
        return Some(
            "Handle empty inputs and zero values explicitly; return a sensible default \
             instead of raising."
                .to_string(),
        );
    }
    if error_type == "TypeError"
        && (lowered.contains("not iterable")
            || lowered.contains("has no len")
            || lowered.contains("not subscriptable"))
    {
        return Some(
            "Accept a single value where a sequence is expected by wrapping it in a \
             one-element list before processing."
                .to_string(),
        );
    }
    if error_type == "TypeError" || error_type == "AttributeError" {
        return Some(
            "Match the declared parameter types exactly and convert inputs where needed."
                .to_string(),
        );
    }
    if error_type == "KeyError" {
        return Some("Use dict.get with a default for keys that may be absent.".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_module_not_found() {
        let refiner = ErrorRefiner::new();
        let text = "ModuleNotFoundError: No module named 'numpy'\nTraceback (most recent call last):\n  File \"<candidate>\", line 1, in <module>\nModuleNotFoundError: No module named 'numpy'";
        let classified = refiner.classify(ExecutionErrorKind::CompileError, text);
        assert!(matches!(classified.class, ErrorClass::MissingDependency(ref m) if m == "numpy"));
    }

    #[test]
    fn test_classify_syntax_error() {
        let refiner = ErrorRefiner::new();
        let classified = refiner.classify(
            ExecutionErrorKind::CompileError,
            "SyntaxError: invalid syntax (<candidate>, line 1)",
        );
        assert_eq!(classified.class, ErrorClass::Syntax);
    }

    #[test]
    fn test_classify_empty_sequence_failure() {
        let refiner = ErrorRefiner::new();
        let text = "ValueError: max() arg is an empty sequence\nTraceback (most recent call last):\n  File \"<candidate>\", line 2, in f\nValueError: max() arg is an empty sequence";
        let classified = refiner.classify(ExecutionErrorKind::RuntimeFailure, text);
        assert!(matches!(classified.class, ErrorClass::Runtime(ref e) if e == "ValueError"));
        assert!(classified.suggestion.unwrap().contains("empty inputs"));
    }

    #[test]
    fn test_scalar_for_sequence_hint() {
        let refiner = ErrorRefiner::new();
        let classified = refiner.classify(
            ExecutionErrorKind::RuntimeFailure,
            "TypeError: 'int' object is not iterable",
        );
        let hint = classified.with_hint("Failed on input [5]");
        assert!(hint.starts_with("Failed on input [5]\nHint: "));
        assert!(hint.contains("one-element list"));
    }

    #[test]
    fn test_timeout_and_missing_entry() {
        let refiner = ErrorRefiner::new();
        assert_eq!(
            refiner.classify(ExecutionErrorKind::Timeout, "execution exceeded 5000ms").class,
            ErrorClass::Timeout
        );
        assert_eq!(
            refiner.classify(ExecutionErrorKind::NameError, "NameError: name 'f' is not defined").class,
            ErrorClass::MissingEntry
        );
    }
}
