//! Repair prompt rendering
//!
//! Turns a [`Bundle`] into a self-contained prompt for an external repair
//! assistant. Sending it anywhere is the caller's business.

use crate::bundle::Bundle;

const INSTRUCTIONS: &str = "You are part of an elite automated software fixing team. \
You will be given the code of a failing test, the code it calls, and the failing test output.\n\n\
Please explain why the test is failing (either the test code or the function code is wrong) \
and how to fix it. Generally bias towards assuming the test code is correct and the function \
code is what needs to be fixed.\n\
Assume that comments correctly describe the desired functionality of the function.\n\n\
You should recommend specific code changes if possible.";

/// Wrap source blocks in a single fenced Go code block
fn fenced(sources: &[String]) -> String {
    let mut lines = Vec::with_capacity(sources.len() + 2);
    lines.push("```go");
    lines.extend(sources.iter().map(String::as_str));
    lines.push("```");
    lines.join("\n")
}

pub fn render_repair_prompt(bundle: &Bundle) -> String {
    let mut prompt = String::from(INSTRUCTIONS);

    if !bundle.full_test_name.is_empty() {
        prompt.push_str("\n\nFailing Test: ");
        prompt.push_str(&bundle.full_test_name);
    }

    prompt.push_str("\n\nTest Code:\n");
    prompt.push_str(&fenced(&bundle.test_sources));
    prompt.push_str("\n\nFunction Code:\n");
    prompt.push_str(&fenced(&bundle.dependency_sources));
    prompt.push_str("\nTest Error: ");
    prompt.push_str(&bundle.test_error);
    prompt.push_str("\n\nYour explanation and recommended changes:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::FailingTest;

    #[test]
    fn test_prompt_contains_fenced_sources_and_error() {
        let bundle = Bundle::new(
            vec!["func Test_divide(t *testing.T) {}".to_string()],
            vec!["func divide(a, b int) int { return a }".to_string()],
            "divide() = -2, want 0",
        )
        .with_test(&FailingTest::new("Test_divide/1_/_2_=_0", "divide() = -2, want 0"));

        let prompt = render_repair_prompt(&bundle);

        assert!(prompt.starts_with("You are part of an elite automated software fixing team."));
        assert!(prompt.contains("Failing Test: Test_divide/1_/_2_=_0"));
        assert!(prompt.contains("Test Code:\n```go\nfunc Test_divide(t *testing.T) {}\n```"));
        assert!(prompt.contains("Function Code:\n```go\nfunc divide(a, b int) int { return a }\n```"));
        assert!(prompt.contains("\nTest Error: divide() = -2, want 0\n"));
        assert!(prompt.ends_with("Your explanation and recommended changes:"));
    }

    #[test]
    fn test_empty_dependency_block_still_fenced() {
        let prompt = render_repair_prompt(&Bundle::new(Vec::new(), Vec::new(), ""));
        assert!(prompt.contains("Function Code:\n```go\n```"));
        assert!(!prompt.contains("Failing Test:"));
    }
}
