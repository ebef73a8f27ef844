//! Rule-based intent detection for chat messages.
//!
//! Two tiers: precise verb/object patterns first, then loose keyword
//! containment. Both tiers walk the categories in the fixed order of
//! [`CATEGORY_ORDER`], and the first hit wins.

use crate::model::{Intent, TaskPriority, TaskStatus};
use regex::Regex;
use std::sync::LazyLock;

pub const CATEGORY_ORDER: [Intent; 4] = [
    Intent::CreateTask,
    Intent::ListTasks,
    Intent::UpdateTask,
    Intent::DeleteTask,
];

const OBJECT: &str = r"(?:tasks?|todos?|to-dos?|items?|things?|work|jobs?|reminders?)";

static CREATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"\b(?:create|add|make|build|new)\s+(?:a\s+|an\s+|the\s+|another\s+)?(?:new\s+)?{OBJECT}\b"),
        String::from(r"\b(?:remind\s+me\s+to|i\s+need\s+to\s+remember\s+to)\b"),
        format!(r"\b(?:can|could|would)\s+you\s+(?:please\s+)?(?:add|create|make)\b.*\b{OBJECT}\b"),
    ])
});

static LIST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"\b(?:show|list|display|view|see|get)\s+(?:me\s+)?(?:all\s+)?(?:of\s+)?(?:my\s+|the\s+)?(?:pending\s+|completed\s+|current\s+)?{OBJECT}\b"),
        format!(r"\bwhat\s+(?:are|is)\s+(?:on\s+)?(?:my|the)\s+(?:pending\s+)?{OBJECT}\b"),
        String::from(r"\bwhat\s+do\s+i\s+(?:have\s+to|need\s+to)\s+do\b"),
    ])
});

static UPDATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"\b(?:update|change|modify|edit|rename)\s+(?:the\s+|my\s+)?(?:{OBJECT}\s*)?#?\d+"),
        String::from(r"\bmark\b.*\b(?:as\s+)?(?:done|complete|completed|finished|incomplete|pending|not\s+done)\b"),
        format!(r"\b(?:complete|finish)\s+(?:the\s+|my\s+)?{OBJECT}\s*#?\d+"),
        format!(r"\b(?:update|change|modify|edit)\s+(?:a\s+|the\s+|my\s+)?{OBJECT}\b"),
    ])
});

static DELETE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"\b(?:delete|remove|erase|drop|get\s+rid\s+of)\s+(?:a\s+|the\s+|my\s+)?{OBJECT}\b"),
        String::from(r"\b(?:delete|remove|erase)\s+#?\d+"),
    ])
});

static TASK_ID: LazyLock<Regex> = LazyLock::new(|| regex(r"#?(\d+)"));

static PRIORITY_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\b(?:(low|medium|high)\s+priority|priority\s+(?:to\s+|as\s+|of\s+)?(low|medium|high))\b")
});

const CREATE_KEYWORDS: &[&str] = &["create", "add", "new task", "make a", "remind me"];
const LIST_KEYWORDS: &[&str] = &["show", "list", "display", "view", "my tasks"];
const UPDATE_KEYWORDS: &[&str] = &["update", "change", "modify", "edit", "mark", "complete", "done"];
const DELETE_KEYWORDS: &[&str] = &["delete", "remove", "erase"];

const INCOMPLETE_PHRASES: &[&str] = &["incomplete", "not done", "not finished", "not complete"];
const COMPLETE_PHRASES: &[&str] = &["complete", "done", "finished"];

fn regex(pattern: &str) -> Regex {
    // Built-in patterns only; a typo here is a programming error.
    Regex::new(&format!("(?i){pattern}")).expect("built-in pattern must compile")
}

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns.iter().map(|pattern| regex(pattern)).collect()
}

fn patterns_for(intent: Intent) -> &'static [Regex] {
    match intent {
        Intent::CreateTask => &CREATE_PATTERNS,
        Intent::ListTasks => &LIST_PATTERNS,
        Intent::UpdateTask => &UPDATE_PATTERNS,
        Intent::DeleteTask => &DELETE_PATTERNS,
        Intent::Unknown => &[],
    }
}

fn keywords_for(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::CreateTask => CREATE_KEYWORDS,
        Intent::ListTasks => LIST_KEYWORDS,
        Intent::UpdateTask => UPDATE_KEYWORDS,
        Intent::DeleteTask => DELETE_KEYWORDS,
        Intent::Unknown => &[],
    }
}

pub fn classify(message: &str) -> Intent {
    let lower = message.trim().to_lowercase();
    if lower.is_empty() {
        return Intent::Unknown;
    }

    let by_pattern = CATEGORY_ORDER.into_iter().find(|intent| {
        patterns_for(*intent)
            .iter()
            .any(|pattern| pattern.is_match(&lower))
    });
    if let Some(intent) = by_pattern {
        return intent;
    }

    CATEGORY_ORDER
        .into_iter()
        .find(|intent| contains_any(&lower, keywords_for(*intent)))
        .unwrap_or(Intent::Unknown)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// First `#12` / `12` style number in the message.
pub fn extract_task_id(message: &str) -> Option<i64> {
    TASK_ID
        .captures(message)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

pub fn extract_status_change(message: &str) -> Option<TaskStatus> {
    let lower = message.to_lowercase();
    if contains_any(&lower, INCOMPLETE_PHRASES) {
        Some(TaskStatus::Pending)
    } else if contains_any(&lower, COMPLETE_PHRASES) {
        Some(TaskStatus::Completed)
    } else {
        None
    }
}

pub fn extract_priority_change(message: &str) -> Option<TaskPriority> {
    let captures = PRIORITY_CHANGE.captures(message)?;
    let word = captures.get(1).or_else(|| captures.get(2))?;
    TaskPriority::parse(word.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::{
        CATEGORY_ORDER, PRIORITY_CHANGE, TASK_ID, classify, extract_priority_change,
        extract_status_change, extract_task_id, patterns_for,
    };
    use crate::model::{Intent, TaskPriority, TaskStatus};
    use std::sync::LazyLock;

    #[test]
    fn every_built_in_pattern_compiles() {
        for intent in CATEGORY_ORDER {
            assert!(!patterns_for(intent).is_empty(), "{intent:?}");
        }
        LazyLock::force(&TASK_ID);
        LazyLock::force(&PRIORITY_CHANGE);
    }

    #[test]
    fn create_phrasings_classify_as_create() {
        for message in [
            "Create a task",
            "create a task to buy groceries",
            "add new todo",
            "Make an item for Friday",
            "new task please",
            "build the thing",
            "remind me to call mom",
        ] {
            assert_eq!(classify(message), Intent::CreateTask, "{message}");
        }
    }

    #[test]
    fn category_order_beats_longest_match() {
        assert_eq!(classify("show me how to create a task"), Intent::CreateTask);
    }

    #[test]
    fn list_phrasings_classify_as_list() {
        assert_eq!(classify("Show me my tasks"), Intent::ListTasks);
        assert_eq!(classify("list all tasks"), Intent::ListTasks);
        assert_eq!(classify("what are my todos?"), Intent::ListTasks);
    }

    #[test]
    fn update_phrasings_classify_as_update() {
        assert_eq!(classify("mark task #12 as done"), Intent::UpdateTask);
        assert_eq!(classify("Update task 1 to mark as complete"), Intent::UpdateTask);
        assert_eq!(classify("change task 4 to high priority"), Intent::UpdateTask);
    }

    #[test]
    fn delete_phrasings_classify_as_delete() {
        assert_eq!(classify("Delete task 1"), Intent::DeleteTask);
        assert_eq!(classify("please remove the todo"), Intent::DeleteTask);
    }

    #[test]
    fn keyword_fallback_uses_category_order() {
        assert_eq!(classify("delete something"), Intent::DeleteTask);
        assert_eq!(classify("could you list stuff"), Intent::ListTasks);
        assert_eq!(classify("add milk and also delete eggs"), Intent::CreateTask);
    }

    #[test]
    fn unmatched_input_is_unknown() {
        assert_eq!(classify("hello there"), Intent::Unknown);
        assert_eq!(classify("   "), Intent::Unknown);
    }

    #[test]
    fn extracts_task_id_with_or_without_hash() {
        assert_eq!(extract_task_id("mark task #12 as done"), Some(12));
        assert_eq!(extract_task_id("delete 7 please"), Some(7));
        assert_eq!(extract_task_id("delete something"), None);
    }

    #[test]
    fn status_change_checks_negations_first() {
        assert_eq!(
            extract_status_change("mark task #12 as done"),
            Some(TaskStatus::Completed)
        );
        assert_eq!(
            extract_status_change("task 3 is not done yet"),
            Some(TaskStatus::Pending)
        );
        assert_eq!(
            extract_status_change("mark 3 incomplete"),
            Some(TaskStatus::Pending)
        );
        assert_eq!(extract_status_change("rename task 3"), None);
    }

    #[test]
    fn priority_change_reads_both_word_orders() {
        assert_eq!(
            extract_priority_change("change task 4 to high priority"),
            Some(TaskPriority::High)
        );
        assert_eq!(
            extract_priority_change("set priority to Low for 4"),
            Some(TaskPriority::Low)
        );
        assert_eq!(extract_priority_change("task 4 is urgent"), None);
    }
}
