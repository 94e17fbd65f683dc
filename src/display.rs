use crate::document::DocumentRef;
use console::{measure_text_width, style};
use termimad::MadSkin;

fn box_width(max: usize) -> usize {
    let terminal_width = console::Term::stdout().size().1 as usize;
    std::cmp::min(terminal_width.saturating_sub(4), max).max(40)
}

/// Splits `line` into pieces no wider than `width` columns, breaking at
/// spaces where possible.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if measure_text_width(line) <= width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for word in line.split(' ') {
        let word_width = measure_text_width(word);
        let sep = usize::from(!current.is_empty());

        if current_width + sep + word_width <= width {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_width += sep + word_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }

        // Words longer than a line are cut by character
        for ch in word.chars() {
            let ch_width = measure_text_width(ch.encode_utf8(&mut [0; 4]));
            if current_width + ch_width > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += ch_width;
        }
    }
    lines.push(current);
    lines
}

/// Whether the answer is worth rendering as markdown.
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains("```")
        || text.contains('`')
        || text.contains("**")
        || text.lines().any(|l| {
            let l = l.trim_start();
            l.starts_with('#') || l.starts_with("- ") || l.starts_with("* ")
        })
}

pub fn display_markdown(text: &str) {
    let skin = MadSkin::default();
    println!("\n{}", style("🤖 AI RESPONSE").bold().blue());
    println!("{}", skin.term_text(text));
}

/// Display an AI response in a formatted box
pub fn display_response(response: &str) {
    if looks_like_markdown(response) {
        display_markdown(response);
        return;
    }

    let max_width = box_width(120);
    let wrapped: Vec<String> = response
        .lines()
        .flat_map(|line| wrap_line(line, max_width.saturating_sub(4)))
        .collect();

    let content_max = wrapped
        .iter()
        .map(|line| measure_text_width(line))
        .max()
        .unwrap_or(0);
    let inner = std::cmp::min(max_width, content_max + 4).saturating_sub(2);

    println!("\n{}", style("🤖 AI RESPONSE").bold().blue());
    println!("{}", style(format!("┌{}┐", "─".repeat(inner))).dim().blue());
    for line in wrapped {
        let padding = inner.saturating_sub(measure_text_width(&line) + 1);
        println!("│ {}{}│", style(&line).bold().white(), " ".repeat(padding));
    }
    println!("{}", style(format!("└{}┘", "─".repeat(inner))).dim().blue());
}

/// Shows the notes a question will be answered from.
pub fn display_context(docs: &[DocumentRef]) {
    if docs.is_empty() {
        return;
    }
    let titles: Vec<String> = docs.iter().map(|d| d.title.clone()).collect();
    let line = format!("📎 {}", titles.join(", "));
    let width = box_width(100);
    for piece in wrap_line(&line, width) {
        println!("{}", style(piece).dim());
    }
}

pub fn display_thinking() {
    println!("{}", style("… thinking").dim().italic());
}

pub fn display_notice(message: &str) {
    println!("{}", style(message).cyan());
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").bold().red(), style(message).red());
}

pub fn display_banner(title: &str, detail: &str) {
    let width = box_width(100);
    println!("{}", style(title).bold().magenta());
    println!("{}", style(detail).dim());
    println!("{}", style("═".repeat(width)).dim());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(wrap_line("hello world", 20), vec!["hello world"]);
    }

    #[test]
    fn wraps_at_spaces() {
        assert_eq!(
            wrap_line("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn cuts_long_words_and_counts_wide_chars() {
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        // Each of these takes two columns
        assert_eq!(wrap_line("日本語です", 4), vec!["日本", "語で", "す"]);
    }

    #[test]
    fn markdown_detection() {
        assert!(looks_like_markdown("# Title\nbody"));
        assert!(looks_like_markdown("use `cargo`"));
        assert!(looks_like_markdown("- one\n- two"));
        assert!(!looks_like_markdown("plain answer with 3 * 4 = 12"));
    }
}
