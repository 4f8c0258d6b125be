//! Unified diff / patch parser.
//!
//! Turns the raw text served by `.patch`/`.diff` endpoints into one
//! [`Change`] per `diff --git` section. Accepts plain `git diff` output as
//! well as `git format-patch` mail (preamble, diffstat and signature are
//! skipped). Line counts are driven by hunk headers, so content lines that
//! happen to start with `---` or `+++` are still counted.

use crate::types::Change;

const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Default)]
struct Section {
    old_path: String,
    new_path: String,
    added: bool,
    deleted: bool,
    renamed: bool,
    binary: bool,
    additions: u64,
    deletions: u64,
    patch: Vec<String>,
    // Lines still expected in the current hunk
    old_remaining: u64,
    new_remaining: u64,
}

impl Section {
    fn from_header(rest: &str) -> Self {
        let (old_path, new_path) = split_git_header(rest);
        Section {
            old_path,
            new_path,
            ..Default::default()
        }
    }

    fn in_hunk(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    /// Consume one hunk body line. Returns false if the line does not belong
    /// to the hunk.
    fn hunk_line(&mut self, line: &str) -> bool {
        match line.as_bytes().first() {
            Some(b'+') => {
                self.additions += 1;
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            Some(b'-') => {
                self.deletions += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
            }
            Some(b' ') | None => {
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            Some(b'\\') => {}
            _ => return false,
        }
        self.patch.push(line.to_string());
        true
    }

    fn header_line(&mut self, line: &str) {
        if let Some(header) = line.strip_prefix("@@ ") {
            let (old, new) = parse_hunk_ranges(header);
            self.old_remaining = old;
            self.new_remaining = new;
            self.patch.push(line.to_string());
        } else if let Some(path) = line.strip_prefix("--- ") {
            let path = strip_prefix_dir(path, "a/");
            if path == DEV_NULL {
                self.added = true;
            } else {
                self.old_path = path;
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            let path = strip_prefix_dir(path, "b/");
            if path == DEV_NULL {
                self.deleted = true;
            } else {
                self.new_path = path;
            }
        } else if line.starts_with("new file mode") {
            self.added = true;
        } else if line.starts_with("deleted file mode") {
            self.deleted = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            self.renamed = true;
            self.old_path = unquote_path(path);
        } else if let Some(path) = line.strip_prefix("rename to ") {
            self.renamed = true;
            self.new_path = unquote_path(path);
        } else if let Some(path) = line.strip_prefix("copy from ") {
            self.old_path = unquote_path(path);
        } else if let Some(path) = line.strip_prefix("copy to ") {
            self.new_path = unquote_path(path);
        } else if line == "GIT binary patch"
            || (line.starts_with("Binary files ") && line.ends_with(" differ"))
        {
            self.binary = true;
        }
    }

    fn finish(self) -> Change {
        let path = if self.deleted {
            self.old_path.clone()
        } else {
            self.new_path.clone()
        };
        let previous_path = if self.added {
            String::new()
        } else {
            self.old_path
        };
        let mut patch = self.patch.join("\n");
        if !patch.is_empty() {
            patch.push('\n');
        }

        Change {
            path,
            previous_path,
            added: self.added,
            renamed: self.renamed,
            deleted: self.deleted,
            binary: self.binary,
            additions: self.additions,
            deletions: self.deletions,
            patch,
        }
    }
}

/// Parse patch text into per-file changes, in the order they appear.
pub fn parse_patch(text: &str) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(section) = current.take() {
                changes.push(section.finish());
            }
            current = Some(Section::from_header(rest));
            continue;
        }

        let Some(section) = current.as_mut() else {
            // format-patch preamble, diffstat, trailing signature
            continue;
        };

        if section.in_hunk() && section.hunk_line(line) {
            continue;
        }
        section.old_remaining = 0;
        section.new_remaining = 0;

        // format-patch signature separator closes the mail.
        if line == "-- " || line == "--" {
            if let Some(section) = current.take() {
                changes.push(section.finish());
            }
            continue;
        }

        section.header_line(line);
    }

    if let Some(section) = current.take() {
        changes.push(section.finish());
    }

    tracing::debug!(files = changes.len(), "parsed patch");
    changes
}

/// Split `a/old b/new` from a `diff --git` header.
fn split_git_header(rest: &str) -> (String, String) {
    let rest = rest.trim();
    if rest.starts_with('"') || rest.ends_with('"') {
        if let Some(paths) = split_quoted_header(rest) {
            return paths;
        }
    }
    let candidates: Vec<usize> = rest.match_indices(" b/").map(|(i, _)| i).collect();

    // Prefer the split that makes both sides equal; renames fall back to the first.
    let split = candidates
        .iter()
        .copied()
        .find(|&i| rest.get(2..i) == rest.get(i + 3..))
        .or_else(|| candidates.first().copied());

    match split {
        Some(i) => (
            strip_prefix_dir(&rest[..i], "a/"),
            rest[i + 3..].to_string(),
        ),
        None => (rest.to_string(), rest.to_string()),
    }
}

/// Header where git quoted one or both paths, e.g. `"a/t\303\251st" "b/t\303\251st"`.
fn split_quoted_header(rest: &str) -> Option<(String, String)> {
    let (old, remainder) = if rest.starts_with('"') {
        let (old, end) = unquote(rest)?;
        (old, &rest[end..])
    } else {
        let i = rest.find(" \"b/")?;
        (rest[..i].to_string(), &rest[i..])
    };
    let remainder = remainder.trim_start();
    let new = if remainder.starts_with('"') {
        unquote(remainder)?.0
    } else {
        remainder.to_string()
    };
    Some((
        old.strip_prefix("a/").unwrap_or(&old).to_string(),
        new.strip_prefix("b/").unwrap_or(&new).to_string(),
    ))
}

fn strip_prefix_dir(path: &str, prefix: &str) -> String {
    if path.starts_with('"') {
        if let Some((path, _)) = unquote(path) {
            return path.strip_prefix(prefix).unwrap_or(&path).to_string();
        }
    }
    // `--- a/file\t2024-01-01` from non-git diffs carries a timestamp.
    let path = path.split('\t').next().unwrap_or(path).trim_end();
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn unquote_path(path: &str) -> String {
    unquote(path).map_or_else(|| path.to_string(), |(path, _)| path)
}

/// Decode a C-style quoted path as git writes it. Returns the path and the
/// byte offset just past the closing quote, or `None` if `s` is not quoted.
fn unquote(s: &str) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Some((String::from_utf8_lossy(&out).into_owned(), i + 1)),
            b'\\' => {
                let escaped = *bytes.get(i + 1)?;
                i += 2;
                match escaped {
                    b'0'..=b'7' => {
                        let digits = bytes.get(i - 1..i + 2)?;
                        let octal = std::str::from_utf8(digits).ok()?;
                        out.push(u8::from_str_radix(octal, 8).ok()?);
                        i += 2;
                    }
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'r' => out.push(b'\r'),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'v' => out.push(0x0b),
                    other => out.push(other),
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    None
}

/// `-12,3 +12,4 @@ fn name` -> (3, 4). A missing count means one line.
fn parse_hunk_ranges(header: &str) -> (u64, u64) {
    let mut old = 0;
    let mut new = 0;
    for token in header.split_whitespace() {
        if token.starts_with("@@") {
            break;
        }
        let count = |range: &str| -> u64 {
            match range.split_once(',') {
                Some((_, count)) => count.parse().unwrap_or(0),
                None => 1,
            }
        };
        if let Some(range) = token.strip_prefix('-') {
            old = count(range);
        } else if let Some(range) = token.strip_prefix('+') {
            new = count(range);
        }
    }
    (old, new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/main.rs b/src/main.rs
index 1111111..2222222 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,4 +1,6 @@
 fn main() {
-    println!(\"hello\");
+    println!(\"hello\");
+    println!(\"world\");
+    println!(\"!\");
 }
diff --git a/docs/old.md b/docs/new.md
similarity index 100%
rename from docs/old.md
rename to docs/new.md
";

    #[test]
    fn test_modified_and_rename_only() {
        let changes = parse_patch(TWO_FILES);
        assert_eq!(changes.len(), 2);

        assert_eq!(changes[0].path, "src/main.rs");
        assert_eq!(changes[0].previous_path, "src/main.rs");
        assert_eq!((changes[0].additions, changes[0].deletions), (3, 1));
        assert!(!changes[0].renamed);
        assert!(changes[0].patch.starts_with("@@ -1,4 +1,6 @@\n"));

        assert_eq!(changes[1].path, "docs/new.md");
        assert_eq!(changes[1].previous_path, "docs/old.md");
        assert!(changes[1].renamed);
        assert_eq!((changes[1].additions, changes[1].deletions), (0, 0));
        assert!(changes[1].patch.is_empty());
    }

    #[test]
    fn test_multiple_hunks_accumulate() {
        let patch = "\
diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -1,2 +1,3 @@
 a
+b
 c
@@ -10,3 +11,2 @@ fn tail()
 x
-y
-z
+w
";
        let changes = parse_patch(patch);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].additions, 2);
        assert_eq!(changes[0].deletions, 2);
    }

    #[test]
    fn test_content_lines_that_look_like_headers() {
        let patch = "\
diff --git a/notes.md b/notes.md
--- a/notes.md
+++ b/notes.md
@@ -1,2 +1,2 @@
---- old rule
+++++ new rule
 end
";
        let changes = parse_patch(patch);
        assert_eq!(changes[0].path, "notes.md");
        assert_eq!((changes[0].additions, changes[0].deletions), (1, 1));
    }

    #[test]
    fn test_new_deleted_and_binary() {
        let patch = "\
diff --git a/added.txt b/added.txt
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/added.txt
@@ -0,0 +1,2 @@
+one
+two
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
index e69de29..0000000
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
diff --git a/logo.png b/logo.png
index 1111111..2222222 100644
Binary files a/logo.png and b/logo.png differ
";
        let changes = parse_patch(patch);
        assert_eq!(changes.len(), 3);

        assert!(changes[0].added);
        assert_eq!(changes[0].path, "added.txt");
        assert_eq!(changes[0].previous_path, "");
        assert_eq!((changes[0].additions, changes[0].deletions), (2, 0));

        assert!(changes[1].deleted);
        assert_eq!(changes[1].path, "gone.txt");
        assert_eq!((changes[1].additions, changes[1].deletions), (0, 1));

        assert!(changes[2].binary);
        assert_eq!((changes[2].additions, changes[2].deletions), (0, 0));
    }

    #[test]
    fn test_format_patch_mail() {
        let patch = "\
From 7f1c2a3b Mon Sep 17 00:00:00 2001
From: Jane Citizen <jane@example.com>
Date: Tue, 1 Oct 2024 10:00:00 +0000
Subject: [PATCH] Add License File

---
 LICENSE | 2 ++
 1 file changed, 2 insertions(+)

diff --git a/LICENSE b/LICENSE
new file mode 100644
--- /dev/null
+++ b/LICENSE
@@ -0,0 +1,2 @@
+BSD License
+Copyright
\\ No newline at end of file
--
2.43.0

";
        let changes = parse_patch(patch);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "LICENSE");
        assert!(changes[0].added);
        assert_eq!((changes[0].additions, changes[0].deletions), (2, 0));
    }

    #[test]
    fn test_binary_patch_literal() {
        let patch = "\
diff --git a/a.bin b/a.bin
new file mode 100644
index 0000000..1111111
GIT binary patch
literal 4
LcmZ?wbaDUy00aO8

literal 0
HcmV?d00001

";
        let changes = parse_patch(patch);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].binary);
        assert!(changes[0].added);
        assert_eq!((changes[0].additions, changes[0].deletions), (0, 0));
    }

    #[test]
    fn test_split_git_header_with_spaces() {
        assert_eq!(
            split_git_header("a/my file.txt b/my file.txt"),
            ("my file.txt".to_string(), "my file.txt".to_string())
        );
        assert_eq!(
            split_git_header("a/x b/y"),
            ("x".to_string(), "y".to_string())
        );
    }

    #[test]
    fn test_quoted_paths() {
        let patch = "\
diff --git \"a/t\\303\\251st file.txt\" \"b/t\\303\\251st file.txt\"
index 1111111..2222222 100644
--- \"a/t\\303\\251st file.txt\"
+++ \"b/t\\303\\251st file.txt\"
@@ -1 +1 @@
-old
+new
diff --git a/plain.txt \"b/tab\\there.txt\"
similarity index 100%
rename from plain.txt
rename to \"tab\\there.txt\"
";
        let changes = parse_patch(patch);
        assert_eq!(changes.len(), 2);

        assert_eq!(changes[0].path, "t\u{e9}st file.txt");
        assert_eq!(changes[0].previous_path, "t\u{e9}st file.txt");
        assert_eq!((changes[0].additions, changes[0].deletions), (1, 1));

        assert!(changes[1].renamed);
        assert_eq!(changes[1].path, "tab\there.txt");
        assert_eq!(changes[1].previous_path, "plain.txt");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a/b\\\"c\" rest"), Some(("a/b\"c".to_string(), 8)));
        assert_eq!(unquote("plain"), None);
        assert_eq!(unquote("\"unterminated"), None);
    }

    #[test]
    fn test_parse_hunk_ranges() {
        assert_eq!(parse_hunk_ranges("-1,4 +1,6 @@"), (4, 6));
        assert_eq!(parse_hunk_ranges("-1 +1 @@ fn x()"), (1, 1));
        assert_eq!(parse_hunk_ranges("-0,0 +1,3 @@"), (0, 3));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_patch("").is_empty());
        assert!(parse_patch("no diff here\n").is_empty());
    }
}
