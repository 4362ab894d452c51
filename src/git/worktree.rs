//! Git worktree listing parser
//!
//! Turns the line-oriented output of `git worktree list` into ordered
//! [`WorktreeRecord`]s and derives a short display path for each one.

use serde::Serialize;

/// Characters stripped from the front of a relative path
pub const PATH_SEPARATORS: [char; 2] = ['/', '\\'];

/// Annotation git appends after the branch of a locked worktree
const LOCKED_ANNOTATION: &str = "locked";

/// Annotation git appends after the branch of a prunable worktree
const PRUNABLE_ANNOTATION: &str = "prunable";

/// A single worktree parsed from one non-blank output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorktreeRecord {
    full_path: String,
    branch: String,
    relative_path: String,
    head: Option<String>,
    locked: bool,
    prunable: bool,
    matched: bool,
}

impl WorktreeRecord {
    /// Path of the worktree exactly as git reported it.
    ///
    /// For lines that could not be parsed this is the whole trimmed line.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Branch checked out in the worktree, empty when unparsed
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Path with the listing's common prefix and leading separators removed
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Commit-ish token printed between the path and the branch
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_prunable(&self) -> bool {
        self.prunable
    }

    /// Whether the line matched `<path> <head> [<branch>]`
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    fn fallback(line: &str) -> Self {
        Self {
            full_path: line.to_string(),
            branch: String::new(),
            relative_path: line.to_string(),
            head: None,
            locked: false,
            prunable: false,
            matched: false,
        }
    }
}

/// Result of parsing one `git worktree list` invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorktreeListing {
    records: Vec<WorktreeRecord>,
    common_prefix: String,
}

impl WorktreeListing {
    /// Records in the order git emitted them
    pub fn records(&self) -> &[WorktreeRecord] {
        &self.records
    }

    /// Prefix shared by every matched path in this listing
    pub fn common_prefix(&self) -> &str {
        &self.common_prefix
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fields borrowed out of a line that matched the expected layout
#[derive(Debug, PartialEq, Eq)]
struct ParsedLine<'a> {
    path: &'a str,
    head: &'a str,
    branch: &'a str,
    locked: bool,
    prunable: bool,
}

/// Parse a single trimmed line of `git worktree list` output.
///
/// Accepts `<path><ws><head><ws>[<branch>]` optionally followed by the
/// `locked` and `prunable` annotations. The bracket is searched from the
/// right and the head is the last whitespace-separated token before it, so
/// paths containing spaces survive. Returns `None` for anything else.
fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let open = line.rfind('[')?;
    let close = open + line[open..].find(']')?;

    let branch = line[open + 1..close].trim();
    if branch.is_empty() {
        return None;
    }

    let mut locked = false;
    let mut prunable = false;
    for word in line[close + 1..].split_whitespace() {
        match word {
            LOCKED_ANNOTATION => locked = true,
            PRUNABLE_ANNOTATION => prunable = true,
            _ => return None,
        }
    }

    let before = &line[..open];
    if !before.ends_with(char::is_whitespace) {
        return None;
    }

    let (path, head) = before.trim_end().rsplit_once(char::is_whitespace)?;
    let path = path.trim();
    if path.is_empty() || head.is_empty() {
        return None;
    }

    Some(ParsedLine {
        path,
        head,
        branch,
        locked,
        prunable,
    })
}

/// Compute the longest common prefix of `paths`.
///
/// Starts from the first path and drops one trailing character at a time
/// until every path starts with the candidate. The comparison is purely
/// textual, so the prefix may end in the middle of a path segment.
pub fn common_prefix<S: AsRef<str>>(paths: &[S]) -> String {
    let Some(first) = paths.first() else {
        return String::new();
    };

    let mut prefix = first.as_ref().to_string();
    while !prefix.is_empty()
        && !paths
            .iter()
            .all(|path| path.as_ref().starts_with(prefix.as_str()))
    {
        prefix.pop();
    }
    prefix
}

/// Strip `prefix` and any leading separators from `full_path`.
///
/// Returns `full_path` unchanged when it does not start with `prefix`.
pub fn relative_path(full_path: &str, prefix: &str) -> String {
    match full_path.strip_prefix(prefix) {
        Some(rest) => rest.trim_start_matches(PATH_SEPARATORS).to_string(),
        None => full_path.to_string(),
    }
}

/// Parse the complete output of `git worktree list`.
///
/// Blank lines are skipped. Lines that do not match the expected layout are
/// kept as fallback records rather than dropped, and do not take part in the
/// common prefix.
pub fn parse_worktree_list(raw: &str) -> WorktreeListing {
    let parsed: Vec<(&str, Option<ParsedLine<'_>>)> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| (line, parse_line(line)))
        .collect();

    let matched_paths: Vec<&str> = parsed
        .iter()
        .filter_map(|(_, parsed)| parsed.as_ref().map(|p| p.path))
        .collect();
    let common_prefix = common_prefix(&matched_paths);

    let records = parsed
        .into_iter()
        .map(|(line, parsed)| match parsed {
            Some(p) => WorktreeRecord {
                full_path: p.path.to_string(),
                branch: p.branch.to_string(),
                relative_path: relative_path(p.path, &common_prefix),
                head: Some(p.head.to_string()),
                locked: p.locked,
                prunable: p.prunable,
                matched: true,
            },
            None => WorktreeRecord::fallback(line),
        })
        .collect();

    WorktreeListing {
        records,
        common_prefix,
    }
}
