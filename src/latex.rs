//! LaTeX delimiter rewriting.
//!
//! ChatGPT writes math as `\( … \)` and `\[ … \]`; most Markdown editors
//! (Obsidian, Typora, GitHub) expect `$ … $` and `$$ … $$`.
//!
//! Delimiters are matched lazily: the body runs to the first closing delimiter,
//! may span lines and must not be empty. Nested delimiters of the same kind are
//! not supported.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PAREN_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").expect("inline math pattern"));
static BRACKET_DISPLAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").expect("display math pattern"));
static DOLLAR_DISPLAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("display dollar pattern"));
static DOLLAR_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$(.+?)\$").expect("inline dollar pattern"));

/// `\(x\)` → `$x$`, then `\[x\]` → `$$x$$`.
pub fn convert_latex(content: &str) -> String {
    let inline = PAREN_INLINE.replace_all(content, |caps: &Captures| format!("${}$", &caps[1]));
    BRACKET_DISPLAY
        .replace_all(&inline, |caps: &Captures| format!("$${}$$", &caps[1]))
        .into_owned()
}

/// Inverse of [`convert_latex`] for text that had no `$` of its own.
pub fn revert_latex(content: &str) -> String {
    let display =
        DOLLAR_DISPLAY.replace_all(content, |caps: &Captures| format!("\\[{}\\]", &caps[1]));
    DOLLAR_INLINE
        .replace_all(&display, |caps: &Captures| format!("\\({}\\)", &caps[1]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_inline_and_display() {
        assert_eq!(convert_latex(r"Let \(x^2\) be"), "Let $x^2$ be");
        assert_eq!(convert_latex(r"\[ \int_0^1 f \]"), "$$ \\int_0^1 f $$");
        assert_eq!(
            convert_latex(r"both \(a\) and \[b\] here"),
            "both $a$ and $$b$$ here"
        );
    }

    #[test]
    fn display_math_may_span_lines() {
        let input = "Solve:\n\\[\na + b = c\n\\]\ndone";
        assert_eq!(convert_latex(input), "Solve:\n$$\na + b = c\n$$\ndone");
    }

    #[test]
    fn lazy_matching_keeps_expressions_apart() {
        assert_eq!(
            convert_latex(r"\(a\), then \(b\)"),
            "$a$, then $b$"
        );
    }

    #[test]
    fn empty_or_unbalanced_delimiters_are_left_alone() {
        assert_eq!(convert_latex(r"\(\)"), r"\(\)");
        assert_eq!(convert_latex(r"open \( only"), r"open \( only");
        assert_eq!(convert_latex("no math at all"), "no math at all");
    }

    #[test]
    fn conversion_is_idempotent() {
        let samples = [
            r"Let \(x\) and \[y = mx + b\] hold.",
            "Multi\n\\[\n\\frac{1}{2}\n\\]\nline with \\(z\\)",
            "plain text",
            "already $x$ converted $$y$$",
        ];
        for s in samples {
            let once = convert_latex(s);
            assert_eq!(convert_latex(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn revert_undoes_convert_for_well_formed_input() {
        let samples = [
            r"Let \(x\) and \[y = mx + b\] hold.",
            "Multi\n\\[\n\\frac{1}{2}\n\\]\nline with \\(z\\) end",
            r"Euler: \(e^{i\pi} + 1 = 0\).",
            "plain text",
        ];
        for s in samples {
            assert_eq!(revert_latex(&convert_latex(s)), s, "input: {s:?}");
        }
    }
}
