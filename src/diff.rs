//! Line-level unified diff computation
//!
//! Produces the diff bodies carried in fix results. Patches are generated
//! for humans or a downstream agent to review; nothing in this crate ever
//! applies one.

/// Context lines included on each side of a hunk.
const CONTEXT_LINES: usize = 3;

/// Ceiling on the LCS table size. Edits are local, so after common
/// prefix/suffix trimming the middle is normally tiny; a pathological
/// rewrite beyond this falls back to one whole-block hunk.
const LCS_CELL_LIMIT: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    Keep(&'a str),
    Del(&'a str),
    Add(&'a str),
}

/// Compute a unified diff between two file bodies.
///
/// Returns `None` when there is nothing to show: identical content, or
/// content whose only difference is invisible at line granularity (a
/// trailing-newline change). Callers treat `None` as a no-op fix.
pub fn unified(original: &str, modified: &str, path: &str) -> Option<String> {
    if original == modified {
        return None;
    }

    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = modified.lines().collect();
    let ops = diff_ops(&old, &new);

    if ops.iter().all(|op| matches!(op, Op::Keep(_))) {
        return None;
    }

    Some(render(&ops, path))
}

/// Strip the `---`/`+++` banner lines from a unified diff, leaving only the
/// `@@` hunks and their content. Filenames travel as structured fields.
pub fn body(diff: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for (i, line) in diff.lines().enumerate() {
        if i < 2 && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            continue;
        }
        kept.push(line);
    }
    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Count added and removed lines in a diff or diff body.
pub fn stats(diff: &str) -> (usize, usize) {
    let mut adds = 0;
    let mut removes = 0;
    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            adds += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            removes += 1;
        }
    }
    (adds, removes)
}

fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_old = &old[prefix..old.len() - suffix];
    let mid_new = &new[prefix..new.len() - suffix];

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    ops.extend(old[..prefix].iter().map(|l| Op::Keep(*l)));

    if mid_old.len().saturating_mul(mid_new.len()) > LCS_CELL_LIMIT {
        ops.extend(mid_old.iter().map(|l| Op::Del(*l)));
        ops.extend(mid_new.iter().map(|l| Op::Add(*l)));
    } else {
        ops.extend(lcs_ops(mid_old, mid_new));
    }

    ops.extend(old[old.len() - suffix..].iter().map(|l| Op::Keep(*l)));
    ops
}

/// Exact longest-common-subsequence alignment of the trimmed middle.
fn lcs_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let n = old.len();
    let m = new.len();
    let idx = |i: usize, j: usize| i * (m + 1) + j;

    let mut table = vec![0u32; (n + 1) * (m + 1)];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[idx(i, j)] = if old[i] == new[j] {
                table[idx(i + 1, j + 1)] + 1
            } else {
                table[idx(i + 1, j)].max(table[idx(i, j + 1)])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(Op::Keep(old[i]));
            i += 1;
            j += 1;
        } else if table[idx(i + 1, j)] >= table[idx(i, j + 1)] {
            ops.push(Op::Del(old[i]));
            i += 1;
        } else {
            ops.push(Op::Add(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|l| Op::Del(*l)));
    ops.extend(new[j..].iter().map(|l| Op::Add(*l)));
    ops
}

fn render(ops: &[Op], path: &str) -> String {
    // Merge changed regions whose context windows touch into single hunks.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        if matches!(op, Op::Keep(_)) {
            continue;
        }
        let start = i.saturating_sub(CONTEXT_LINES);
        let end = (i + CONTEXT_LINES).min(ops.len() - 1);
        match groups.last_mut() {
            Some((_, last_end)) if start <= *last_end + 1 => {
                *last_end = (*last_end).max(end);
            }
            _ => groups.push((start, end)),
        }
    }

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    let mut old_line = 1usize;
    let mut new_line = 1usize;
    let mut groups_iter = groups.iter().peekable();
    let mut i = 0;

    while i < ops.len() {
        if let Some(&&(group_start, group_end)) = groups_iter.peek() {
            if i == group_start {
                let mut old_count = 0usize;
                let mut new_count = 0usize;
                let mut hunk = String::new();
                for op in &ops[group_start..=group_end] {
                    match op {
                        Op::Keep(l) => {
                            old_count += 1;
                            new_count += 1;
                            hunk.push(' ');
                            hunk.push_str(l);
                        }
                        Op::Del(l) => {
                            old_count += 1;
                            hunk.push('-');
                            hunk.push_str(l);
                        }
                        Op::Add(l) => {
                            new_count += 1;
                            hunk.push('+');
                            hunk.push_str(l);
                        }
                    }
                    hunk.push('\n');
                }

                // Unified convention: an empty side anchors to the line
                // before the hunk.
                let old_start = if old_count == 0 { old_line - 1 } else { old_line };
                let new_start = if new_count == 0 { new_line - 1 } else { new_line };
                out.push_str(&format!(
                    "@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"
                ));
                out.push_str(&hunk);

                old_line += old_count;
                new_line += new_count;
                i = group_end + 1;
                groups_iter.next();
                continue;
            }
        }

        // Everything outside a group is unchanged context.
        old_line += 1;
        new_line += 1;
        i += 1;
    }

    out
}
