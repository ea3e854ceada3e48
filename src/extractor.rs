// Heuristic extraction of task candidates from pasted text

use regex::Regex;
use std::sync::LazyLock;

// `- [ ] text`, `- [x] text`, `-[X] text`
static CHECKLIST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-\s*\[[ xX]?\]\s*(.*)$").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*]\s+(.+)$").unwrap());
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s+(.+)$").unwrap());

const TODO_PREFIX: &str = "todo:";

/// Pull candidate task texts out of free-form text, in line order.
///
/// Each line is tried against, in order: markdown checklist item, `todo:`
/// prefix (any case), `-`/`*` bullet, `1.` numbered item. The first match
/// wins. Blank lines and lines matching nothing are dropped, as are matches
/// whose remaining text is empty.
pub fn extract_tasks(text: &str) -> Vec<String> {
    text.lines().filter_map(extract_line).collect()
}

fn extract_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let candidate = if let Some(caps) = CHECKLIST_RE.captures(line) {
        caps.get(1).map_or("", |m| m.as_str())
    } else if starts_with_ignore_case(line, TODO_PREFIX) {
        &line[TODO_PREFIX.len()..]
    } else if let Some(caps) = BULLET_RE.captures(line) {
        caps.get(1).map_or("", |m| m.as_str())
    } else if let Some(caps) = NUMBERED_RE.captures(line) {
        caps.get(1).map_or("", |m| m.as_str())
    } else {
        return None;
    };

    let candidate = candidate.trim();
    (!candidate.is_empty()).then(|| candidate.to_string())
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
