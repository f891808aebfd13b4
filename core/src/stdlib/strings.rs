//! String Package
//!
//! String functions for build scripts, named `str*` so they sit beside
//! make's own `$(subst)`, `$(patsubst)` and friends.
//!
//! Design notes:
//! - Lengths and indices count characters, not bytes
//! - Optional arguments treat the empty string as "not given", since make
//!   cannot omit an argument in the middle of a call
//! - Predicates return `1` or nothing, so they compose with `$(if ...)`
//! - Word lists (`strsplit`, `strrsplit`) come back joined by single spaces

use hashbrown::HashMap;

use crate::error::CallError;
use gnumake_macros::{make_fn, make_package};

/// `None` for an omitted or empty optional argument.
fn given(arg: Option<&str>) -> Option<&str> {
    arg.filter(|s| !s.is_empty())
}

fn parse_int(arg: &str) -> Result<i64, CallError> {
    Ok(arg.trim().parse::<i64>()?)
}

fn optional_int(arg: Option<&str>) -> Result<Option<i64>, CallError> {
    given(arg).map(parse_int).transpose()
}

/// The single fill character of the padding functions.
fn fill_char(arg: Option<&str>) -> Result<char, CallError> {
    let Some(fill) = given(arg) else {
        return Ok(' ');
    };
    let mut chars = fill.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CallError::new(
            "TypeError",
            "The fill character must be exactly one character long",
        )),
    }
}

/// Resolve slice bounds over `len` characters, counting negative bounds
/// from the end. `None` when the window is empty because it starts past the
/// end or after its own end.
fn window(len: usize, start: Option<i64>, end: Option<i64>) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let resolve = |bound: i64| {
        if bound < 0 {
            (bound + len).max(0)
        } else {
            bound
        }
    };
    let start = resolve(start.unwrap_or(0));
    let end = resolve(end.unwrap_or(len)).min(len);

    if start > len || end < start {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?))
}

/// The substring between two character offsets.
fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let byte = |index: usize| s.char_indices().nth(index).map_or(s.len(), |(i, _)| i);
    &s[byte(start)..byte(end)]
}

/// `s` restricted to the optional `start`/`end` window.
fn sliced<'a>(
    s: &'a str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(usize, &'a str)>, CallError> {
    let window = window(s.chars().count(), optional_int(start)?, optional_int(end)?);
    Ok(window.map(|(from, to)| (from, char_slice(s, from, to))))
}

fn pad(s: &str, width: &str, fill: Option<&str>, left_share: impl Fn(usize) -> usize) -> Result<String, CallError> {
    let width = parse_int(width)?;
    let fill = fill_char(fill)?;
    let len = s.chars().count();
    let Some(margin) = usize::try_from(width).ok().and_then(|w| w.checked_sub(len)) else {
        return Ok(s.to_owned());
    };

    let left = left_share(margin);
    let mut out = String::with_capacity(s.len() + margin);
    out.extend(core::iter::repeat_n(fill, left));
    out.push_str(s);
    out.extend(core::iter::repeat_n(fill, margin - left));
    Ok(out)
}

fn all_chars(s: &str, predicate: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(predicate)
}

fn whitespace_split(s: &str, limit: Option<usize>) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();

    while !rest.is_empty() && limit.is_none_or(|n| parts.len() < n) {
        match rest.find(char::is_whitespace) {
            Some(i) => {
                parts.push(&rest[..i]);
                rest = rest[i..].trim_start();
            }
            None => {
                parts.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

fn whitespace_rsplit(s: &str, limit: Option<usize>) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s.trim_end();

    while !rest.is_empty() && limit.is_none_or(|n| parts.len() < n) {
        match rest.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            Some((i, c)) => {
                parts.push(&rest[i + c.len_utf8()..]);
                rest = rest[..i].trim_end();
            }
            None => {
                parts.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts.reverse();
    parts
}

/// Negative counts mean unlimited.
fn split_limit(maxsplit: Option<&str>) -> Result<Option<usize>, CallError> {
    Ok(optional_int(maxsplit)?.and_then(|n| usize::try_from(n).ok()))
}

fn find_in(
    s: &str,
    sub: &str,
    start: Option<&str>,
    end: Option<&str>,
    from_right: bool,
) -> Result<usize, CallError> {
    let found = sliced(s, start, end)?.and_then(|(offset, haystack)| {
        let byte = if from_right {
            haystack.rfind(sub)
        } else {
            haystack.find(sub)
        }?;
        Some(offset + haystack[..byte].chars().count())
    });
    found.ok_or_else(|| CallError::value("substring not found"))
}

#[make_package]
pub mod strings {
    use super::*;

    // ========================================================================
    // Comparison and inspection
    // ========================================================================

    /// `<`, `>` or `=`.
    #[make_fn(name = "strcmp")]
    pub fn strcmp(x: &str, y: &str) -> &'static str {
        match x.cmp(y) {
            core::cmp::Ordering::Less => "<",
            core::cmp::Ordering::Greater => ">",
            core::cmp::Ordering::Equal => "=",
        }
    }

    #[make_fn(name = "strlen")]
    pub fn strlen(arg: &str) -> usize {
        arg.chars().count()
    }

    #[make_fn(name = "strcount")]
    pub fn strcount(
        s: &str,
        sub: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, CallError> {
        Ok(sliced(s, start, end)?.map_or(0, |(_, haystack)| haystack.matches(sub).count()))
    }

    #[make_fn(name = "strstartswith")]
    pub fn strstartswith(
        s: &str,
        prefix: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<bool, CallError> {
        Ok(sliced(s, start, end)?.is_some_and(|(_, window)| window.starts_with(prefix)))
    }

    #[make_fn(name = "strendswith")]
    pub fn strendswith(
        s: &str,
        suffix: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<bool, CallError> {
        Ok(sliced(s, start, end)?.is_some_and(|(_, window)| window.ends_with(suffix)))
    }

    /// Character index of the first `sub`; a `ValueError` when absent.
    #[make_fn(name = "strindex")]
    pub fn strindex(
        s: &str,
        sub: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, CallError> {
        find_in(s, sub, start, end, false)
    }

    #[make_fn(name = "strrindex")]
    pub fn strrindex(
        s: &str,
        sub: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, CallError> {
        find_in(s, sub, start, end, true)
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    #[make_fn(name = "strisalnum")]
    pub fn strisalnum(s: &str) -> bool {
        all_chars(s, char::is_alphanumeric)
    }

    #[make_fn(name = "strisalpha")]
    pub fn strisalpha(s: &str) -> bool {
        all_chars(s, char::is_alphabetic)
    }

    #[make_fn(name = "strisdigit")]
    pub fn strisdigit(s: &str) -> bool {
        all_chars(s, char::is_numeric)
    }

    #[make_fn(name = "strisspace")]
    pub fn strisspace(s: &str) -> bool {
        all_chars(s, char::is_whitespace)
    }

    #[make_fn(name = "strislower")]
    pub fn strislower(s: &str) -> bool {
        s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
    }

    #[make_fn(name = "strisupper")]
    pub fn strisupper(s: &str) -> bool {
        s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
    }

    #[make_fn(name = "strisidentifier")]
    pub fn strisidentifier(s: &str) -> bool {
        let mut chars = s.chars();
        chars
            .next()
            .is_some_and(|c| c == '_' || c.is_alphabetic())
            && chars.all(|c| c == '_' || c.is_alphanumeric())
    }

    #[make_fn(name = "strisprintable")]
    pub fn strisprintable(s: &str) -> bool {
        s.chars().all(|c| c == ' ' || !(c.is_control() || c.is_whitespace()))
    }

    /// Uppercase only after uncased characters, lowercase only after cased
    /// ones, and at least one cased character.
    #[make_fn(name = "stristitle")]
    pub fn stristitle(s: &str) -> bool {
        let mut cased = false;
        let mut previous_cased = false;
        for c in s.chars() {
            if c.is_uppercase() {
                if previous_cased {
                    return false;
                }
                previous_cased = true;
                cased = true;
            } else if c.is_lowercase() {
                if !previous_cased {
                    return false;
                }
                previous_cased = true;
                cased = true;
            } else {
                previous_cased = false;
            }
        }
        cased
    }

    // ========================================================================
    // Case
    // ========================================================================

    #[make_fn(name = "strlower")]
    pub fn strlower(s: &str) -> String {
        s.to_lowercase()
    }

    #[make_fn(name = "strupper")]
    pub fn strupper(s: &str) -> String {
        s.to_uppercase()
    }

    #[make_fn(name = "strcapitalize")]
    pub fn strcapitalize(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
            None => String::new(),
        }
    }

    #[make_fn(name = "strswapcase")]
    pub fn strswapcase(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            if c.is_uppercase() {
                out.extend(c.to_lowercase());
            } else if c.is_lowercase() {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Every run of letters starts uppercase and continues lowercase.
    #[make_fn(name = "strtitle")]
    pub fn strtitle(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut previous_cased = false;
        for c in s.chars() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = c.is_alphabetic();
        }
        out
    }

    // ========================================================================
    // Padding and whitespace
    // ========================================================================

    #[make_fn(name = "strcenter")]
    pub fn strcenter(s: &str, width: &str, fillchar: Option<&str>) -> Result<String, CallError> {
        // An odd margin puts the extra fill on the left only for odd widths.
        let odd_width = parse_int(width)? % 2 != 0;
        pad(s, width, fillchar, |margin| {
            margin / 2 + usize::from(odd_width && margin % 2 == 1)
        })
    }

    #[make_fn(name = "strljust")]
    pub fn strljust(s: &str, width: &str, fillchar: Option<&str>) -> Result<String, CallError> {
        pad(s, width, fillchar, |_| 0)
    }

    #[make_fn(name = "strrjust")]
    pub fn strrjust(s: &str, width: &str, fillchar: Option<&str>) -> Result<String, CallError> {
        pad(s, width, fillchar, |margin| margin)
    }

    /// Strip leading whitespace, or leading characters from `chars`.
    #[make_fn(name = "strlstrip")]
    pub fn strlstrip(s: &str, chars: Option<&str>) -> String {
        match given(chars) {
            Some(chars) => s.trim_start_matches(|c| chars.contains(c)).to_owned(),
            None => s.trim_start().to_owned(),
        }
    }

    #[make_fn(name = "strrstrip")]
    pub fn strrstrip(s: &str, chars: Option<&str>) -> String {
        match given(chars) {
            Some(chars) => s.trim_end_matches(|c| chars.contains(c)).to_owned(),
            None => s.trim_end().to_owned(),
        }
    }

    /// Replace tabs with spaces up to the next multiple of `tabsize`
    /// (default 8); the column restarts after every line break.
    #[make_fn(name = "strexpandtabs")]
    pub fn strexpandtabs(s: &str, tabsize: Option<&str>) -> Result<String, CallError> {
        let tabsize = usize::try_from(optional_int(tabsize)?.unwrap_or(8)).unwrap_or(0);
        let mut out = String::with_capacity(s.len());
        let mut column = 0;
        for c in s.chars() {
            match c {
                '\t' => {
                    if tabsize > 0 {
                        let spaces = tabsize - column % tabsize;
                        out.extend(core::iter::repeat_n(' ', spaces));
                        column += spaces;
                    }
                }
                '\n' | '\r' => {
                    out.push(c);
                    column = 0;
                }
                _ => {
                    out.push(c);
                    column += 1;
                }
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Words
    // ========================================================================

    /// Join the words of `to_join` with `s`.
    #[make_fn(name = "strjoin")]
    pub fn strjoin(s: &str, to_join: &str) -> String {
        to_join.split_whitespace().collect::<Vec<_>>().join(s)
    }

    /// Split on `sep` (whitespace runs if not given), at most `maxsplit`
    /// times, and return the pieces as a word list.
    #[make_fn(name = "strsplit")]
    pub fn strsplit(s: &str, sep: Option<&str>, maxsplit: Option<&str>) -> Result<String, CallError> {
        let limit = split_limit(maxsplit)?;
        let parts: Vec<&str> = match (given(sep), limit) {
            (Some(sep), Some(n)) => s.splitn(n + 1, sep).collect(),
            (Some(sep), None) => s.split(sep).collect(),
            (None, limit) => whitespace_split(s, limit),
        };
        Ok(parts.join(" "))
    }

    #[make_fn(name = "strrsplit")]
    pub fn strrsplit(s: &str, sep: Option<&str>, maxsplit: Option<&str>) -> Result<String, CallError> {
        let limit = split_limit(maxsplit)?;
        let parts: Vec<&str> = match (given(sep), limit) {
            (Some(sep), Some(n)) => {
                let mut parts: Vec<&str> = s.rsplitn(n + 1, sep).collect();
                parts.reverse();
                parts
            }
            (Some(sep), None) => s.split(sep).collect(),
            (None, limit) => whitespace_rsplit(s, limit),
        };
        Ok(parts.join(" "))
    }

    /// Map each character of `fromchars` to the one at the same position in
    /// `tochars`; extra characters on either side are ignored.
    #[make_fn(name = "strtranslate")]
    pub fn strtranslate(text: &str, fromchars: &str, tochars: &str) -> String {
        let table: HashMap<char, char> = fromchars.chars().zip(tochars.chars()).collect();
        text.chars()
            .map(|c| table.get(&c).copied().unwrap_or(c))
            .collect()
    }
}

#[cfg(test)]
#[path = "strings_test.rs"]
mod strings_test;
