//! Fills `{name}` placeholders in resource URI templates from operator input.
//!
//! Only the simple `{name}` form is recognized. A `{` with no closing `}`
//! and an empty `{}` are ordinary text.

use crate::ui::operator::{Operator, OperatorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    /// Byte range of the whole `{name}` occurrence.
    pub start: usize,
    pub end: usize,
}

/// Every placeholder occurrence, left to right. Repeats are reported
/// separately.
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(open) = template[cursor..].find('{').map(|offset| cursor + offset) {
        let Some(close) = template[open + 1..].find('}').map(|offset| open + 1 + offset) else {
            break;
        };
        let name = &template[open + 1..close];
        if name.is_empty() {
            cursor = close + 1;
            continue;
        }
        // A nested '{' means this opener was literal; rescan from the inner one.
        if let Some(inner) = name.rfind('{') {
            cursor = open + 1 + inner;
            continue;
        }
        found.push(Placeholder {
            name: name.to_string(),
            start: open,
            end: close + 1,
        });
        cursor = close + 1;
    }
    found
}

pub fn prompt_for(name: &str) -> String {
    format!("Enter a value for {name}")
}

/// Prompts once per occurrence and substitutes each answer in place.
/// Templates without placeholders come back unchanged with no prompts.
pub async fn resolve(operator: &dyn Operator, template: &str) -> Result<String, OperatorError> {
    let mut resolved = String::with_capacity(template.len());
    let mut copied_to = 0;
    for placeholder in placeholders(template) {
        let value = operator.input(&prompt_for(&placeholder.name)).await?;
        resolved.push_str(&template[copied_to..placeholder.start]);
        resolved.push_str(&value);
        copied_to = placeholder.end;
    }
    resolved.push_str(&template[copied_to..]);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{Answer, ScriptedOperator};

    fn names(template: &str) -> Vec<String> {
        placeholders(template).into_iter().map(|p| p.name).collect()
    }

    #[tokio::test]
    async fn single_placeholder_is_substituted() {
        let operator = ScriptedOperator::new(vec![Answer::text("7")]);
        let uri = resolve(&operator, "users://{userId}/profile")
            .await
            .expect("resolve");
        assert_eq!(uri, "users://7/profile");
        assert_eq!(operator.prompts(), vec!["Enter a value for userId"]);
    }

    #[tokio::test]
    async fn repeated_names_are_prompted_per_occurrence() {
        let operator = ScriptedOperator::new(vec![Answer::text("a"), Answer::text("b")]);
        let uri = resolve(&operator, "x://{id}/{id}").await.expect("resolve");
        assert_eq!(uri, "x://a/b");
        assert_eq!(operator.prompts().len(), 2);
    }

    #[tokio::test]
    async fn template_without_placeholders_is_unchanged() {
        let operator = ScriptedOperator::new(vec![]);
        let uri = resolve(&operator, "users://all").await.expect("resolve");
        assert_eq!(uri, "users://all");
        assert!(operator.prompts().is_empty());
    }

    #[tokio::test]
    async fn dangling_brace_is_literal() {
        let operator = ScriptedOperator::new(vec![Answer::text("9")]);
        let uri = resolve(&operator, "a://{id}/b{c").await.expect("resolve");
        assert_eq!(uri, "a://9/b{c");
        assert_eq!(operator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn answers_containing_braces_are_not_rescanned() {
        let operator = ScriptedOperator::new(vec![Answer::text("{other}")]);
        let uri = resolve(&operator, "a://{id}").await.expect("resolve");
        assert_eq!(uri, "a://{other}");
        assert_eq!(operator.prompts().len(), 1);
    }

    #[test]
    fn prompts_match_occurrence_count() {
        assert_eq!(names("a://{x}/{y}/{x}"), vec!["x", "y", "x"]);
        assert_eq!(names("a://{}/{y}"), vec!["y"]);
        assert_eq!(names("a://{{y}"), vec!["y"]);
        assert!(names("a://b}").is_empty());
        assert!(names("a://{b").is_empty());
    }

    #[test]
    fn occurrence_ranges_cover_braces() {
        let found = placeholders("users://{userId}/profile");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 8);
        assert_eq!(found[0].end, 16);
    }
}
