use crate::error::DiffError;
use serde::{Deserialize, Serialize};

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDiff {
    pub patch: String,
    pub additions: u32,
    pub deletions: u32,
    pub hunks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    pub files: Vec<DiffFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    pub path: String,
    pub old_path: Option<String>,
    pub action: FileAction,
    pub additions: u32,
    pub deletions: u32,
    pub hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub header: String,
    pub lines: Vec<DiffLine>,
    pub old_missing_newline: bool,
    pub new_missing_newline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DiffLineKind {
    Add,
    Remove,
    Context,
}

impl DiffFile {
    /// Lines added by this file's hunks, with their new-side line numbers.
    pub fn added_lines(&self) -> Vec<(u32, &str)> {
        let mut out = Vec::new();
        for hunk in &self.hunks {
            let mut new_line = hunk.new_start;
            for line in &hunk.lines {
                match line.kind {
                    DiffLineKind::Add => {
                        out.push((new_line, line.content.as_str()));
                        new_line += 1;
                    }
                    DiffLineKind::Context => new_line += 1,
                    DiffLineKind::Remove => {}
                }
            }
        }
        out
    }

    /// Literal content of a created file, reconstructed from the added
    /// lines alone. Only meaningful when `action` is `Create`.
    pub fn new_file_content(&self) -> String {
        let lines: Vec<&str> = self
            .hunks
            .iter()
            .flat_map(|hunk| hunk.lines.iter())
            .filter(|line| line.kind == DiffLineKind::Add)
            .map(|line| line.content.as_str())
            .collect();
        if lines.is_empty() {
            return String::new();
        }
        let missing_newline = self.hunks.last().is_some_and(|h| h.new_missing_newline);
        let mut content = lines.join("\n");
        if !missing_newline {
            content.push('\n');
        }
        content
    }
}

fn split_lines(content: &str) -> (Vec<&str>, bool) {
    if content.is_empty() {
        return (Vec::new(), true);
    }
    let ends_with_newline = content.ends_with('\n');
    let mut lines: Vec<&str> = content.split('\n').collect();
    if ends_with_newline {
        lines.pop();
    }
    (lines, ends_with_newline)
}

fn join_lines(lines: &[String], trailing_newline: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Equal,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Edit<'a> {
    kind: EditKind,
    line: &'a str,
    old_index: Option<usize>,
    new_index: Option<usize>,
}

/// Standard longest-common-subsequence line diff. Any LCS-equivalent edit
/// script round-trips; hunk splitting is handled separately.
fn lcs_edits<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Edit<'a>> {
    let n = old.len();
    let m = new.len();
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if old[i] == new[j] {
            edits.push(Edit {
                kind: EditKind::Equal,
                line: old[i],
                old_index: Some(i),
                new_index: Some(j),
            });
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            edits.push(Edit {
                kind: EditKind::Delete,
                line: old[i],
                old_index: Some(i),
                new_index: None,
            });
            i += 1;
        } else {
            edits.push(Edit {
                kind: EditKind::Insert,
                line: new[j],
                old_index: None,
                new_index: Some(j),
            });
            j += 1;
        }
    }
    while i < n {
        edits.push(Edit {
            kind: EditKind::Delete,
            line: old[i],
            old_index: Some(i),
            new_index: None,
        });
        i += 1;
    }
    while j < m {
        edits.push(Edit {
            kind: EditKind::Insert,
            line: new[j],
            old_index: None,
            new_index: Some(j),
        });
        j += 1;
    }
    edits
}

pub fn generate_unified_diff(
    path: &str,
    old_content: &str,
    new_content: &str,
    action: FileAction,
    context_lines: Option<usize>,
) -> Result<GeneratedDiff, DiffError> {
    let context = context_lines.unwrap_or(3);
    match action {
        FileAction::Create => Ok(generate_whole_file(path, new_content, FileAction::Create)),
        FileAction::Delete => Ok(generate_whole_file(path, old_content, FileAction::Delete)),
        FileAction::Modify => generate_modify(path, old_content, new_content, context),
    }
}

fn generate_whole_file(path: &str, content: &str, action: FileAction) -> GeneratedDiff {
    let (lines, ends_with_newline) = split_lines(content);
    let count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    let mut patch = format!("diff --git a/{path} b/{path}\n");
    let (marker, old_header, new_header, hunk_header, sign) = match action {
        FileAction::Create => (
            "new file mode 100644",
            "--- /dev/null".to_string(),
            format!("+++ b/{path}"),
            format!("@@ -0,0 +1,{count} @@"),
            '+',
        ),
        FileAction::Delete => (
            "deleted file mode 100644",
            format!("--- a/{path}"),
            "+++ /dev/null".to_string(),
            format!("@@ -1,{count} +0,0 @@"),
            '-',
        ),
        FileAction::Modify => unreachable!("whole-file generation is create or delete only"),
    };
    patch.push_str(marker);
    patch.push('\n');
    patch.push_str(&old_header);
    patch.push('\n');
    patch.push_str(&new_header);
    patch.push('\n');

    let mut hunks = 0;
    if !lines.is_empty() {
        hunks = 1;
        patch.push_str(&hunk_header);
        patch.push('\n');
        for (index, line) in lines.iter().enumerate() {
            patch.push(sign);
            patch.push_str(line);
            patch.push('\n');
            if index == lines.len() - 1 && !ends_with_newline {
                patch.push_str(NO_NEWLINE_MARKER);
                patch.push('\n');
            }
        }
    }

    let (additions, deletions) = match action {
        FileAction::Create => (count, 0),
        _ => (0, count),
    };
    GeneratedDiff {
        patch,
        additions,
        deletions,
        hunks,
    }
}

fn generate_modify(
    path: &str,
    old_content: &str,
    new_content: &str,
    context: usize,
) -> Result<GeneratedDiff, DiffError> {
    let (old_lines, old_ends_nl) = split_lines(old_content);
    let (new_lines, new_ends_nl) = split_lines(new_content);
    let edits = lcs_edits(&old_lines, &new_lines);

    let change_indices: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.kind != EditKind::Equal)
        .map(|(index, _)| index)
        .collect();

    let mut patch = format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n");
    if change_indices.is_empty() {
        return Ok(GeneratedDiff {
            patch,
            additions: 0,
            deletions: 0,
            hunks: 0,
        });
    }

    // Group changes whose gap fits inside the shared context window.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = change_indices[0];
    let mut end = change_indices[0];
    for &index in &change_indices[1..] {
        if index - end <= context * 2 {
            end = index;
        } else {
            groups.push((start, end));
            start = index;
            end = index;
        }
    }
    groups.push((start, end));

    let mut additions = 0u32;
    let mut deletions = 0u32;
    for edit in &edits {
        match edit.kind {
            EditKind::Insert => additions += 1,
            EditKind::Delete => deletions += 1,
            EditKind::Equal => {}
        }
    }

    let mut hunk_count = 0u32;
    for (group_start, group_end) in groups {
        let from = group_start.saturating_sub(context);
        let to = (group_end + context + 1).min(edits.len());
        let slice = &edits[from..to];

        let old_count = slice
            .iter()
            .filter(|edit| edit.kind != EditKind::Insert)
            .count();
        let new_count = slice
            .iter()
            .filter(|edit| edit.kind != EditKind::Delete)
            .count();
        let old_before = edits[..from]
            .iter()
            .filter(|edit| edit.kind != EditKind::Insert)
            .count();
        let new_before = edits[..from]
            .iter()
            .filter(|edit| edit.kind != EditKind::Delete)
            .count();
        let old_start = if old_count == 0 { old_before } else { old_before + 1 };
        let new_start = if new_count == 0 { new_before } else { new_before + 1 };

        patch.push_str(&format!(
            "@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"
        ));
        hunk_count += 1;

        for edit in slice {
            let sign = match edit.kind {
                EditKind::Equal => ' ',
                EditKind::Delete => '-',
                EditKind::Insert => '+',
            };
            patch.push(sign);
            patch.push_str(edit.line);
            patch.push('\n');

            let ends_old = edit.old_index == Some(old_lines.len().wrapping_sub(1)) && !old_ends_nl;
            let ends_new = edit.new_index == Some(new_lines.len().wrapping_sub(1)) && !new_ends_nl;
            let needs_marker = match edit.kind {
                EditKind::Delete => ends_old,
                EditKind::Insert => ends_new,
                EditKind::Equal => ends_old || ends_new,
            };
            if needs_marker {
                patch.push_str(NO_NEWLINE_MARKER);
                patch.push('\n');
            }
        }
    }

    Ok(GeneratedDiff {
        patch,
        additions,
        deletions,
        hunks: hunk_count,
    })
}

/// Exact-substring replace. The find text must occur exactly once; zero or
/// multiple occurrences are recoverable proposal errors, never silent
/// multi-site edits.
pub fn generate_replace_diff(
    path: &str,
    original_content: &str,
    find: &str,
    replace: &str,
    context_lines: Option<usize>,
) -> Result<GeneratedDiff, DiffError> {
    if find.is_empty() {
        return Err(DiffError::FindNotFound {
            path: path.to_string(),
        });
    }
    let occurrences = original_content.matches(find).count();
    match occurrences {
        0 => Err(DiffError::FindNotFound {
            path: path.to_string(),
        }),
        1 => {
            let updated = original_content.replacen(find, replace, 1);
            generate_unified_diff(
                path,
                original_content,
                &updated,
                FileAction::Modify,
                context_lines,
            )
        }
        _ => Err(DiffError::AmbiguousFind {
            path: path.to_string(),
            occurrences,
        }),
    }
}

pub fn parse_unified_diff(diff_content: &str) -> Result<ParsedDiff, DiffError> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut current: Option<FileDraft> = None;

    for raw in diff_content.lines() {
        if let Some(rest) = raw.strip_prefix("diff --git ") {
            if let Some(draft) = current.take() {
                files.push(draft.finish()?);
            }
            let mut draft = FileDraft::default();
            if let Some((a, b)) = split_git_paths(rest) {
                draft.path_a = Some(a);
                draft.path_b = Some(b);
            }
            current = Some(draft);
            continue;
        }
        if raw.starts_with("new file mode") {
            if let Some(draft) = current.as_mut() {
                draft.created = true;
            }
            continue;
        }
        if raw.starts_with("deleted file mode") {
            if let Some(draft) = current.as_mut() {
                draft.deleted = true;
            }
            continue;
        }
        if let Some(rest) = raw.strip_prefix("rename from ") {
            if let Some(draft) = current.as_mut() {
                draft.renamed_from = Some(rest.to_string());
            }
            continue;
        }
        if raw.starts_with("rename to ") || raw.starts_with("index ") {
            continue;
        }
        if let Some(rest) = raw.strip_prefix("--- ") {
            let draft = current.get_or_insert_with(FileDraft::default);
            draft.path_a = Some(strip_path_prefix(rest, "a/"));
            continue;
        }
        if let Some(rest) = raw.strip_prefix("+++ ") {
            let draft = current.get_or_insert_with(FileDraft::default);
            draft.path_b = Some(strip_path_prefix(rest, "b/"));
            continue;
        }
        if raw.starts_with("@@") {
            let draft = current.get_or_insert_with(FileDraft::default);
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(raw)?;
            draft.hunks.push(DiffHunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                header: raw.to_string(),
                lines: Vec::new(),
                old_missing_newline: false,
                new_missing_newline: false,
            });
            continue;
        }
        if let Some(draft) = current.as_mut() {
            if let Some(hunk) = draft.hunks.last_mut() {
                if raw.starts_with('\\') {
                    match hunk.lines.last().map(|line| line.kind) {
                        Some(DiffLineKind::Remove) => hunk.old_missing_newline = true,
                        Some(DiffLineKind::Add) => hunk.new_missing_newline = true,
                        Some(DiffLineKind::Context) => {
                            hunk.old_missing_newline = true;
                            hunk.new_missing_newline = true;
                        }
                        None => {
                            return Err(DiffError::Malformed {
                                message: "newline marker before any hunk line".to_string(),
                            });
                        }
                    }
                    continue;
                }
                let (kind, content) = match raw.chars().next() {
                    Some('+') => (DiffLineKind::Add, &raw[1..]),
                    Some('-') => (DiffLineKind::Remove, &raw[1..]),
                    Some(' ') => (DiffLineKind::Context, &raw[1..]),
                    // Some producers drop the leading space on blank context lines.
                    None => (DiffLineKind::Context, raw),
                    Some(_) => {
                        return Err(DiffError::Malformed {
                            message: format!("unexpected hunk line: {raw}"),
                        });
                    }
                };
                hunk.lines.push(DiffLine {
                    kind,
                    content: content.to_string(),
                });
            }
        }
    }

    if let Some(draft) = current.take() {
        files.push(draft.finish()?);
    }
    if files.is_empty() {
        return Err(DiffError::Malformed {
            message: "no files found in diff".to_string(),
        });
    }
    Ok(ParsedDiff { files })
}

#[derive(Debug, Default)]
struct FileDraft {
    path_a: Option<String>,
    path_b: Option<String>,
    created: bool,
    deleted: bool,
    renamed_from: Option<String>,
    hunks: Vec<DiffHunk>,
}

impl FileDraft {
    fn finish(self) -> Result<DiffFile, DiffError> {
        let path_a = self.path_a.clone();
        let path_b = self.path_b.clone();
        let created = self.created || path_a.as_deref() == Some("/dev/null");
        let deleted = self.deleted || path_b.as_deref() == Some("/dev/null");

        let action = if created {
            FileAction::Create
        } else if deleted {
            FileAction::Delete
        } else {
            FileAction::Modify
        };
        let path = if deleted {
            path_a.clone()
        } else {
            path_b.clone().or(path_a.clone())
        }
        .filter(|path| path != "/dev/null")
        .ok_or_else(|| DiffError::Malformed {
            message: "file entry without a usable path".to_string(),
        })?;

        let old_path = self.renamed_from.or_else(|| {
            path_a.filter(|a| a != "/dev/null" && !deleted && *a != path)
        });

        let mut additions = 0u32;
        let mut deletions = 0u32;
        for hunk in &self.hunks {
            for line in &hunk.lines {
                match line.kind {
                    DiffLineKind::Add => additions += 1,
                    DiffLineKind::Remove => deletions += 1,
                    DiffLineKind::Context => {}
                }
            }
        }

        Ok(DiffFile {
            path,
            old_path,
            action,
            additions,
            deletions,
            hunks: self.hunks,
        })
    }
}

fn split_git_paths(rest: &str) -> Option<(String, String)> {
    let (a, b) = rest.split_once(" b/")?;
    let a = a.strip_prefix("a/")?;
    Some((a.to_string(), b.to_string()))
}

fn strip_path_prefix(value: &str, prefix: &str) -> String {
    let value = value.split('\t').next().unwrap_or(value);
    if value == "/dev/null" {
        return value.to_string();
    }
    value
        .strip_prefix(prefix)
        .unwrap_or(value)
        .to_string()
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), DiffError> {
    let malformed = || DiffError::Malformed {
        message: format!("invalid hunk header: {line}"),
    };
    let rest = line.strip_prefix("@@ -").ok_or_else(malformed)?;
    let (old_part, rest) = rest.split_once(" +").ok_or_else(malformed)?;
    let new_part = rest.split(" @@").next().ok_or_else(malformed)?;

    let parse_range = |part: &str| -> Result<(u32, u32), DiffError> {
        match part.split_once(',') {
            Some((start, count)) => Ok((
                start.parse().map_err(|_| malformed())?,
                count.parse().map_err(|_| malformed())?,
            )),
            None => Ok((part.parse().map_err(|_| malformed())?, 1)),
        }
    };
    let (old_start, old_lines) = parse_range(old_part)?;
    let (new_start, new_lines) = parse_range(new_part)?;
    Ok((old_start, old_lines, new_start, new_lines))
}

/// Checks every context and deletion line against the original content at
/// the hunk-implied position. An empty result means the diff still applies
/// cleanly; any entry means the target drifted since the diff was proposed.
pub fn validate_diff_context(
    original_content: &str,
    diff_content: &str,
) -> Result<Vec<String>, DiffError> {
    let parsed = parse_unified_diff(diff_content)?;
    let file = parsed.files.first().ok_or_else(|| DiffError::Malformed {
        message: "no files found in diff".to_string(),
    })?;
    Ok(validate_file_hunks(original_content, file))
}

/// Per-file variant of `validate_diff_context`, for callers that already
/// hold a parsed multi-file diff.
pub fn validate_file_hunks(original_content: &str, file: &DiffFile) -> Vec<String> {
    let (original_lines, _) = split_lines(original_content);

    let mut mismatches = Vec::new();
    for hunk in &file.hunks {
        let mut position = hunk.old_start as usize;
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Context | DiffLineKind::Remove => {
                    match original_lines.get(position.wrapping_sub(1)) {
                        Some(actual) if *actual == line.content => {}
                        Some(actual) => mismatches.push(format!(
                            "context mismatch at line {position}: expected {:?}, found {actual:?}",
                            line.content
                        )),
                        None => mismatches.push(format!(
                            "context mismatch at line {position}: original has only {} lines",
                            original_lines.len()
                        )),
                    }
                    position += 1;
                }
                DiffLineKind::Add => {}
            }
        }
    }
    mismatches
}

/// Applies hunks sequentially. Callers are expected to run
/// `validate_diff_context` first so failures surface before anything is
/// written back.
pub fn apply_diff_to_content(
    original_content: &str,
    diff_content: &str,
) -> Result<String, DiffError> {
    let parsed = parse_unified_diff(diff_content)?;
    let file = parsed.files.first().ok_or_else(|| DiffError::Malformed {
        message: "no files found in diff".to_string(),
    })?;
    apply_file_hunks(original_content, file)
}

/// Per-file variant of `apply_diff_to_content`.
pub fn apply_file_hunks(original_content: &str, file: &DiffFile) -> Result<String, DiffError> {
    let (original_lines, original_ends_nl) = split_lines(original_content);

    let mut result: Vec<String> = Vec::with_capacity(original_lines.len());
    let mut cursor = 0usize;
    let mut new_missing_newline = false;

    for hunk in &file.hunks {
        let consumes_old = hunk
            .lines
            .iter()
            .any(|line| line.kind != DiffLineKind::Add);
        // A "-N,0" range addresses the gap after line N, not line N itself.
        let hunk_start = if consumes_old {
            (hunk.old_start as usize).saturating_sub(1)
        } else {
            hunk.old_start as usize
        };
        if hunk_start < cursor || hunk_start > original_lines.len() {
            return Err(DiffError::Malformed {
                message: format!("hunk start {} out of order", hunk.old_start),
            });
        }
        while cursor < hunk_start {
            result.push(original_lines[cursor].to_string());
            cursor += 1;
        }
        for line in &hunk.lines {
            match line.kind {
                DiffLineKind::Context => {
                    if cursor >= original_lines.len() {
                        return Err(DiffError::ContextMismatch {
                            mismatches: vec![format!(
                                "context line beyond end of original at line {}",
                                cursor + 1
                            )],
                        });
                    }
                    result.push(line.content.clone());
                    cursor += 1;
                }
                DiffLineKind::Remove => {
                    if cursor >= original_lines.len() {
                        return Err(DiffError::ContextMismatch {
                            mismatches: vec![format!(
                                "deletion beyond end of original at line {}",
                                cursor + 1
                            )],
                        });
                    }
                    cursor += 1;
                }
                DiffLineKind::Add => {
                    result.push(line.content.clone());
                }
            }
        }
        if hunk.new_missing_newline {
            new_missing_newline = true;
        }
    }

    let tail_copied = cursor < original_lines.len();
    while cursor < original_lines.len() {
        result.push(original_lines[cursor].to_string());
        cursor += 1;
    }

    let trailing_newline = if tail_copied {
        original_ends_nl
    } else if new_missing_newline {
        false
    } else if file.hunks.is_empty() {
        original_ends_nl
    } else {
        true
    };
    Ok(join_lines(&result, trailing_newline))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: &str = "fn main() {\n    println!(\"hello\");\n}\n";
    const NEW: &str = "fn main() {\n    println!(\"goodbye\");\n}\n";

    #[test]
    fn modify_round_trips() {
        let generated =
            generate_unified_diff("src/main.rs", OLD, NEW, FileAction::Modify, None).unwrap();
        assert_eq!(generated.additions, 1);
        assert_eq!(generated.deletions, 1);
        assert_eq!(generated.hunks, 1);
        let applied = apply_diff_to_content(OLD, &generated.patch).unwrap();
        assert_eq!(applied, NEW);
    }

    #[test]
    fn modify_round_trips_multiple_hunks() {
        let old: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let new = old
            .replace("line 3\n", "line three\n")
            .replace("line 30\n", "line thirty\n");
        let generated =
            generate_unified_diff("notes.txt", &old, &new, FileAction::Modify, None).unwrap();
        assert_eq!(generated.hunks, 2);
        let applied = apply_diff_to_content(&old, &generated.patch).unwrap();
        assert_eq!(applied, new);
    }

    #[test]
    fn modify_round_trips_without_trailing_newline() {
        let old = "alpha\nbeta";
        let new = "alpha\ngamma";
        let generated =
            generate_unified_diff("a.txt", old, new, FileAction::Modify, None).unwrap();
        assert!(generated.patch.contains("\\ No newline at end of file"));
        let applied = apply_diff_to_content(old, &generated.patch).unwrap();
        assert_eq!(applied, new);
    }

    #[test]
    fn zero_context_insert_round_trips() {
        let old = "a\nb\nc\n";
        let new = "a\nx\nb\nc\n";
        let generated =
            generate_unified_diff("list.txt", old, new, FileAction::Modify, Some(0)).unwrap();
        assert!(generated.patch.contains("@@ -1,0 +2,1 @@"));
        let applied = apply_diff_to_content(old, &generated.patch).unwrap();
        assert_eq!(applied, new);
    }

    #[test]
    fn applies_conventional_zero_context_insert_hunk() {
        let diff = "diff --git a/list.txt b/list.txt\n\
                    --- a/list.txt\n\
                    +++ b/list.txt\n\
                    @@ -1,0 +2 @@\n\
                    +x\n";
        let applied = apply_diff_to_content("a\nb\nc\n", diff).unwrap();
        assert_eq!(applied, "a\nx\nb\nc\n");
    }

    #[test]
    fn create_produces_single_whole_file_hunk() {
        let content = "a\nb\nc\n";
        let generated =
            generate_unified_diff("new.txt", "", content, FileAction::Create, None).unwrap();
        assert!(generated.patch.contains("new file mode 100644"));
        assert!(generated.patch.contains("--- /dev/null"));
        assert!(generated.patch.contains("@@ -0,0 +1,3 @@"));
        assert_eq!(generated.additions, 3);
        assert_eq!(generated.hunks, 1);

        let parsed = parse_unified_diff(&generated.patch).unwrap();
        assert_eq!(parsed.files[0].action, FileAction::Create);
        assert_eq!(parsed.files[0].new_file_content(), content);
    }

    #[test]
    fn delete_produces_single_whole_file_hunk() {
        let content = "a\nb\n";
        let generated =
            generate_unified_diff("old.txt", content, "", FileAction::Delete, None).unwrap();
        assert!(generated.patch.contains("deleted file mode 100644"));
        assert!(generated.patch.contains("+++ /dev/null"));
        assert!(generated.patch.contains("@@ -1,2 +0,0 @@"));
        assert_eq!(generated.deletions, 2);

        let parsed = parse_unified_diff(&generated.patch).unwrap();
        assert_eq!(parsed.files[0].action, FileAction::Delete);
        assert_eq!(parsed.files[0].path, "old.txt");
    }

    #[test]
    fn replace_requires_exactly_one_occurrence() {
        let content = "let x = 1;\nlet y = 1;\n";

        let err = generate_replace_diff("a.rs", content, "let z", "let w", None).unwrap_err();
        assert!(matches!(err, DiffError::FindNotFound { .. }));

        let err = generate_replace_diff("a.rs", content, "= 1;", "= 2;", None).unwrap_err();
        assert!(matches!(
            err,
            DiffError::AmbiguousFind { occurrences: 2, .. }
        ));

        let generated =
            generate_replace_diff("a.rs", content, "let x = 1;", "let x = 2;", None).unwrap();
        let applied = apply_diff_to_content(content, &generated.patch).unwrap();
        assert_eq!(applied, "let x = 2;\nlet y = 1;\n");
    }

    #[test]
    fn validation_passes_on_unchanged_original() {
        let generated =
            generate_unified_diff("src/main.rs", OLD, NEW, FileAction::Modify, None).unwrap();
        let mismatches = validate_diff_context(OLD, &generated.patch).unwrap();
        assert!(mismatches.is_empty());
    }

    #[test]
    fn validation_catches_drifted_original() {
        let generated =
            generate_unified_diff("src/main.rs", OLD, NEW, FileAction::Modify, None).unwrap();
        let drifted = OLD.replace("println!", "eprintln!");
        let mismatches = validate_diff_context(&drifted, &generated.patch).unwrap();
        assert!(!mismatches.is_empty());
        assert!(mismatches[0].contains("context mismatch at line"));
    }

    #[test]
    fn validation_catches_truncated_original() {
        let generated =
            generate_unified_diff("src/main.rs", OLD, NEW, FileAction::Modify, None).unwrap();
        let mismatches = validate_diff_context("fn main() {\n", &generated.patch).unwrap();
        assert!(mismatches.iter().any(|m| m.contains("original has only")));
    }

    #[test]
    fn parse_reports_rename_old_path() {
        let diff = "diff --git a/old/name.rs b/new/name.rs\n\
                    rename from old/name.rs\n\
                    rename to new/name.rs\n\
                    --- a/old/name.rs\n\
                    +++ b/new/name.rs\n\
                    @@ -1,1 +1,1 @@\n\
                    -a\n\
                    +b\n";
        let parsed = parse_unified_diff(diff).unwrap();
        assert_eq!(parsed.files[0].path, "new/name.rs");
        assert_eq!(parsed.files[0].old_path.as_deref(), Some("old/name.rs"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_unified_diff("not a diff at all"),
            Err(DiffError::Malformed { .. })
        ));
    }

    #[test]
    fn added_lines_carry_new_side_numbers() {
        let old = "a\nb\nc\n";
        let new = "a\nb2\nc\nd\n";
        let generated =
            generate_unified_diff("t.txt", old, new, FileAction::Modify, None).unwrap();
        let parsed = parse_unified_diff(&generated.patch).unwrap();
        let added = parsed.files[0].added_lines();
        let contents: Vec<&str> = added.iter().map(|(_, line)| *line).collect();
        assert_eq!(contents, vec!["b2", "d"]);
        assert_eq!(added[0].0, 2);
        assert_eq!(added[1].0, 4);
    }
}
