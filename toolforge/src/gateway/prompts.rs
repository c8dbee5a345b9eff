//! Prompt construction for each request kind.

use crate::reflection::{ReflectionRecord, ToolRecommendation};
use crate::registry::ToolSummary;
use crate::synthesis::ValidationAttempt;

/// System and user messages for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn tool_listing(tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        return "(no tools yet)".to_string();
    }
    tools
        .iter()
        .map(|t| format!("- {} [{}]: {}", t.signature, t.category, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

const REFLECTION_SYSTEM: &str = "You are the reflective core of a self-extending tool library. \
Assess the library's capabilities honestly, identify the most valuable gaps, and choose exactly one \
new tool to build next. Prefer small, general, self-contained utilities that can be tested with \
simple typed inputs. Respond with JSON only.";

pub fn reflection(tools: &[ToolSummary], recent: &[ReflectionRecord]) -> Prompt {
    let previous = if recent.is_empty() {
        "No previous reflections.".to_string()
    } else {
        serde_json::to_string_pretty(recent).unwrap_or_else(|_| "[]".to_string())
    };
    let user = format!(
        r#"Reflect on the current state of the tool library.

Current tools ({count}):
{listing}

Previous reflections (most recent {recent_count}):
{previous}

Consider:
1. What are the current strengths and weaknesses?
2. Which missing capabilities would be most valuable?
3. What patterns appear in the existing tools?
4. What should the improvement priority be?
5. Which single tool should be built next? Its name must be a valid Python identifier not already in use.

Return JSON with exactly this structure:
{{
  "strengths": ["..."],
  "weaknesses": ["..."],
  "missing_capabilities": ["..."],
  "patterns_observed": ["..."],
  "improvement_priority": "...",
  "next_tool_recommendation": {{
    "name": "snake_case_name",
    "purpose": "what the tool does",
    "category": "category label",
    "implementation_notes": "how to implement it"
  }},
  "internal_monologue": "free-form rationale"
}}"#,
        count = tools.len(),
        listing = tool_listing(tools),
        recent_count = recent.len(),
        previous = previous,
    );
    Prompt {
        system: REFLECTION_SYSTEM.to_string(),
        user,
    }
}

const IMPLEMENTATION_SYSTEM: &str = "You are an expert Python developer implementing a single tool \
function. The function must be self-contained, use only the standard library, carry type hints on \
every parameter and on the return value (use lowercase list and dict), and include a docstring. \
It is tested automatically with empty, single-element and multi-element inputs, zero and negative \
numbers, and empty strings, so it must handle all of them without raising.";

pub fn implementation(recommendation: &ToolRecommendation, existing: &[ToolSummary]) -> Prompt {
    let user = format!(
        r#"Implement a new Python tool function.

Function name: {name}
Purpose: {purpose}
Category: {category}
Implementation notes: {notes}

Existing tools (do not duplicate them):
{listing}

Requirements:
1. Define exactly one public function named `{name}` at module level.
2. Annotate every parameter and the return type with str, int, float, bool, list[...] or dict.
3. Do not use *args or **kwargs.
4. Handle edge cases gracefully instead of raising.

Return only the Python code in a ```python block."#,
        name = recommendation.name,
        purpose = recommendation.purpose,
        category = recommendation.category,
        notes = if recommendation.implementation_notes.is_empty() {
            "(none)"
        } else {
            recommendation.implementation_notes.as_str()
        },
        listing = tool_listing(existing),
    );
    Prompt {
        system: IMPLEMENTATION_SYSTEM.to_string(),
        user,
    }
}

const REPAIR_SYSTEM: &str = "You are an expert Python developer fixing a tool function that failed \
automated testing. Keep the same function name and purpose, address the reported failure, and \
return the complete corrected function. If the failure shows a single value arriving where a \
list is expected, accept both by wrapping a single value in a one-element list.";

pub fn repair(recommendation: &ToolRecommendation, attempts: &[ValidationAttempt]) -> Prompt {
    let mut user = format!(
        "Fix the Python function `{}` ({}).\n",
        recommendation.name, recommendation.purpose
    );

    if let Some((latest, earlier)) = attempts.split_last() {
        if !earlier.is_empty() {
            user.push_str("\n## Failure History\n");
            for attempt in earlier {
                user.push_str(&format!(
                    "- Attempt {}: {}\n",
                    attempt.attempt,
                    attempt.diagnostic.as_deref().unwrap_or("failed")
                ));
            }
        }
        user.push_str(&format!(
            "\n## Current Source (attempt {})\n```python\n{}\n```\n\n## Failure\n{}\n",
            latest.attempt,
            latest.source.trim_end(),
            latest.diagnostic.as_deref().unwrap_or("validation failed")
        ));
    }

    user.push_str(
        "\nReturn only the corrected Python code in a ```python block. Do not repeat a fix that already failed.",
    );
    Prompt {
        system: REPAIR_SYSTEM.to_string(),
        user,
    }
}

const SUMMARY_SYSTEM: &str = "You explain the capabilities of a tool library to humans in clear, \
practical terms.";

pub fn summary(tools: &[ToolSummary]) -> Prompt {
    let user = format!(
        r#"Summarize the capabilities of this tool library.

Tools ({count}):
{listing}

Cover:
1. A high-level overview of what the library can do
2. The main categories of functionality
3. Notable strengths and limitations
4. Practical applications of the current toolkit"#,
        count = tools.len(),
        listing = tool_listing(tools),
    );
    Prompt {
        system: SUMMARY_SYSTEM.to_string(),
        user,
    }
}

const SOLVE_SYSTEM: &str = "You are a problem-solving assistant that completes tasks with the \
tools of a tool library. Pick the tools that fit the task, in the order they should run, and give \
their arguments as literal values matching each signature. Respond with YAML only.";

pub fn solve(task: &str, tools: &[ToolSummary]) -> Prompt {
    let user = format!(
        r#"Solve the following task using the available tools.

Task: {task}

Available tools ({count}):
{listing}

For each tool call, give the tool name and its arguments, either as a list in
parameter order or as a mapping from parameter name to value.

Return YAML with exactly this structure:
```yaml
solution: how the task is solved
tools_used:
  - name: tool_name
    args: [arg1, arg2]
```"#,
        task = task.trim(),
        count = tools.len(),
        listing = tool_listing(tools),
    );
    Prompt {
        system: SOLVE_SYSTEM.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(n: u32, diagnostic: &str) -> ValidationAttempt {
        ValidationAttempt {
            attempt: n,
            source: format!("def f(x: int) -> int:\n    return {}\n", n),
            cases: Vec::new(),
            passed: false,
            diagnostic: Some(diagnostic.to_string()),
        }
    }

    #[test]
    fn repair_prompt_carries_latest_source_and_history() {
        let rec = ToolRecommendation::new("f", "identity");
        let prompt = repair(&rec, &[attempt(1, "first failure"), attempt(2, "second failure")]);
        assert!(prompt.user.contains("## Failure History\n- Attempt 1: first failure"));
        assert!(prompt.user.contains("## Current Source (attempt 2)"));
        assert!(prompt.user.contains("return 2"));
        assert!(prompt.user.contains("## Failure\nsecond failure"));
        assert!(!prompt.user.contains("return 1"));
    }

    #[test]
    fn reflection_prompt_lists_tools() {
        let tools = vec![ToolSummary {
            name: "reverse_string".into(),
            category: "text".into(),
            signature: "reverse_string(text: str) -> str".into(),
            description: "Reverse the input string.".into(),
        }];
        let prompt = reflection(&tools, &[]);
        assert!(prompt.user.contains("Current tools (1):"));
        assert!(prompt.user.contains("- reverse_string(text: str) -> str [text]: Reverse the input string."));
        assert!(prompt.user.contains("No previous reflections."));
    }

    #[test]
    fn solve_prompt_carries_task_and_yaml_shape() {
        let prompt = solve("  count the words in 'a b c'\n", &[]);
        assert!(prompt.user.contains("Task: count the words in 'a b c'\n"));
        assert!(prompt.user.contains("Available tools (0):\n(no tools yet)"));
        assert!(prompt.user.contains("tools_used:"));
        assert!(prompt.system.contains("YAML"));
    }
}
