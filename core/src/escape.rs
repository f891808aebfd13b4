//! Escaping text for a `define ... endef` block.
//!
//! Text placed between `define NAME` and `endef` survives make's parser
//! unchanged except for three things: a line reading `endef` ends the block
//! early, a line reading `define` opens a nested block that swallows the
//! closing `endef`, and a backslash before a newline joins two lines. The
//! last one includes a trailing backslash, which would join the text with
//! the closing `endef`. All are broken up by inserting `$()`, a reference
//! to the empty variable, which expands to nothing.
//!
//! [`escape`] is enough when the block is stored without expansion.
//! [`escape_fully`] also doubles every `$` so that expanding the stored
//! value gives back the original text.

const BLOCK_START: &str = "define";
const BLOCK_END: &str = "endef";
const CONTINUATION: &str = "\\\n";
const EMPTY_REF: &str = "$()";

/// Escape `text` for storage in a `define` block.
pub fn escape(text: &str) -> String {
    escape_with(text, false)
}

/// Escape `text` so that `$(NAME)` reproduces it after a `define` block.
pub fn escape_fully(text: &str) -> String {
    escape_with(text, true)
}

// Single left-to-right pass so the `$()` we insert is never doubled itself.
fn escape_with(text: &str, double_dollars: bool) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let keyword = [BLOCK_START, BLOCK_END]
            .into_iter()
            .find(|keyword| rest.starts_with(*keyword));

        if let Some(keyword) = keyword {
            out.push_str(EMPTY_REF);
            out.push_str(keyword);
            rest = &rest[keyword.len()..];
        } else if rest.starts_with(CONTINUATION) {
            out.push('\\');
            out.push_str(EMPTY_REF);
            out.push('\n');
            rest = &rest[CONTINUATION.len()..];
        } else if rest == "\\" {
            // The block's own newline follows the text.
            out.push('\\');
            out.push_str(EMPTY_REF);
            rest = "";
        } else if double_dollars && c == '$' {
            out.push_str("$$");
            rest = &rest[1..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    out
}

#[cfg(test)]
#[path = "escape_test.rs"]
mod escape_test;
