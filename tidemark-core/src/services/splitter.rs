//! Batch splitting on separator lines
//!
//! Some servers require explicit batch boundaries for certain DDL, written as
//! a line containing only `GO`. This is a purely textual split; SQL is never
//! parsed.

/// Default batch separator token
pub const DEFAULT_BATCH_SEPARATOR: &str = "GO";

/// Splits migration text into executable batches
#[derive(Debug, Clone)]
pub struct BatchSplitter {
    separator: String,
}

impl Default for BatchSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SEPARATOR)
    }
}

impl BatchSplitter {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into().trim().to_string(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Split `sql` into non-empty, trimmed batches in file order
    ///
    /// A separator line matches case-insensitively, ignoring surrounding
    /// whitespace. Text without any separator comes back as a single batch;
    /// whitespace-only segments are dropped.
    pub fn split(&self, sql: &str) -> Vec<String> {
        let mut batches = Vec::new();
        let mut current = String::new();

        for line in sql.lines() {
            if self.is_separator(line) {
                flush(&mut current, &mut batches);
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        flush(&mut current, &mut batches);

        batches
    }

    fn is_separator(&self, line: &str) -> bool {
        line.trim().eq_ignore_ascii_case(&self.separator)
    }
}

fn flush(current: &mut String, batches: &mut Vec<String>) {
    let batch = current.trim();
    if !batch.is_empty() {
        batches.push(batch.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(sql: &str) -> Vec<String> {
        BatchSplitter::default().split(sql)
    }

    #[test]
    fn test_two_batches_with_trailing_separator() {
        let batches = split("CREATE TABLE Foo;\nGO\nCREATE TABLE Bar;\nGO\n");
        assert_eq!(batches, vec!["CREATE TABLE Foo;", "CREATE TABLE Bar;"]);
    }

    #[test]
    fn test_no_separator_is_single_batch() {
        assert_eq!(split("SELECT 1"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_duplicate_and_leading_separators_dropped() {
        let batches = split("GO\n\nSELECT 1;\nGO\n  go  \nGO\n\nSELECT 2;\nGO\nGO");
        assert_eq!(batches, vec!["SELECT 1;", "SELECT 2;"]);
    }

    #[test]
    fn test_separator_case_and_whitespace() {
        let batches = split("SELECT 1;\n\tGo \r\nSELECT 2;");
        assert_eq!(batches, vec!["SELECT 1;", "SELECT 2;"]);
    }

    #[test]
    fn test_separator_inside_line_is_not_a_boundary() {
        let sql = "SELECT 'GO' AS word;\nSELECT 1; GO\nGOTO_TABLE;";
        assert_eq!(split(sql).len(), 1);
    }

    #[test]
    fn test_multiline_batch_preserved() {
        let sql = "CREATE TABLE a (\n    id INTEGER\n);\nINSERT INTO a VALUES (1);\nGO\nSELECT 1;";
        let batches = split(sql);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0],
            "CREATE TABLE a (\n    id INTEGER\n);\nINSERT INTO a VALUES (1);"
        );
    }

    #[test]
    fn test_whitespace_only_content_has_no_batches() {
        assert!(split("").is_empty());
        assert!(split("  \n\nGO\n ").is_empty());
    }

    #[test]
    fn test_custom_separator() {
        let splitter = BatchSplitter::new("@@");
        let batches = splitter.split("SELECT 1;\n@@\nSELECT 2;\nGO\nSELECT 3;");
        assert_eq!(batches, vec!["SELECT 1;", "SELECT 2;\nGO\nSELECT 3;"]);
    }
}
