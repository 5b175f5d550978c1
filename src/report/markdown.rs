//! Markdown table repair
//!
//! Model-generated advice often carries tables that renderers choke on:
//! tables wrapped in code fences, or tables glued to the previous paragraph
//! without a blank line. Both get fixed here before anything is displayed.

/// Repair table formatting in model output. Safe to apply repeatedly.
pub fn clean_markdown_table(text: &str) -> String {
    let unfenced = unwrap_table_fences(text);
    let spaced = insert_table_spacing(&unfenced);

    if text.ends_with('\n') && !spaced.ends_with('\n') {
        format!("{}\n", spaced)
    } else {
        spaced
    }
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Drop fence lines around blocks whose body is nothing but table rows.
/// Fenced blocks containing anything else are left alone.
fn unwrap_table_fences(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_fence_line(line) {
            if let Some(offset) = lines[i + 1..].iter().position(|l| l.trim() == "```") {
                let close = i + 1 + offset;
                let body = &lines[i + 1..close];
                let table_only = body.iter().any(|l| is_table_line(l))
                    && body
                        .iter()
                        .all(|l| l.trim().is_empty() || is_table_line(l));

                if table_only {
                    out.extend_from_slice(body);
                    i = close + 1;
                    continue;
                }
            }
        }

        out.push(line);
        i += 1;
    }

    out.join("\n")
}

/// Insert a blank separation before a table that directly follows ordinary
/// text, so markdown renderers recognize the table as its own block.
fn insert_table_spacing(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_table_line(line) {
            if let Some(prev) = out.last() {
                if !prev.trim().is_empty() && !is_table_line(prev) {
                    out.push("");
                    out.push("");
                }
            }
        }
        out.push(line);
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_inserted_before_table_after_text() {
        let raw = "- item\n| C1 | C2 |\n| --- | --- |\n| A | B |\nNext";

        let cleaned = clean_markdown_table(raw);

        assert!(cleaned.starts_with("- item\n\n\n| C1 | C2 |\n"));
    }

    #[test]
    fn test_fenced_table_block_unwrapped() {
        let raw = "```\n| A | B |\n| --- | --- |\n| 1 | 2 |\n```";

        let cleaned = clean_markdown_table(raw);

        assert!(!cleaned.contains("```"));
        assert!(cleaned.trim_start().starts_with("| A | B |"));
    }

    #[test]
    fn test_language_tagged_fence_unwrapped() {
        let raw = "```markdown\n| A | B |\n| --- | --- |\n| 1 | 2 |\n```";

        let cleaned = clean_markdown_table(raw);

        assert!(!cleaned.contains("```"));
    }

    #[test]
    fn test_code_fence_without_table_kept() {
        let raw = "```rust\nlet x = 1;\n```";

        assert_eq!(clean_markdown_table(raw), raw);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let raw = "intro\n| A | B |\n| --- | --- |\n| 1 | 2 |";

        let once = clean_markdown_table(raw);
        let twice = clean_markdown_table(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_already_separated_table_untouched() {
        let raw = "intro\n\n| A | B |\n| --- | --- |\n| 1 | 2 |";

        assert_eq!(clean_markdown_table(raw), raw);
    }

    #[test]
    fn test_plain_text_untouched() {
        let raw = "Nothing tabular here.\nJust prose.";

        assert_eq!(clean_markdown_table(raw), raw);
    }

    #[test]
    fn test_trailing_newline_preserved() {
        let raw = "intro\n| A | B |\n| --- | --- |\n";

        let cleaned = clean_markdown_table(raw);

        assert!(cleaned.ends_with('\n'));
    }
}
