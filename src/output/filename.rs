//! Recording file names
//!
//! Templates accept `%CCYY %YY %MM %DD %hh %mm %ss %%` plus the strftime
//! specifiers `%a %A %b %B %d %H %I %m %M %p %S %y %Y %z %Z`. Any other `%`
//! is dropped.

use crate::utils::{BridgeError, BridgeResult};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::fs;
use std::path::Path;

/// Longest file name the engine accepts, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

/// Upper bound on `(N)` suffixes tried before giving up
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 10_000;

/// Template token and the strftime pattern it expands to
const TOKENS: [(&str, &str); 23] = [
    ("%CCYY", "%Y"),
    ("%YY", "%y"),
    ("%MM", "%m"),
    ("%DD", "%d"),
    ("%hh", "%H"),
    ("%mm", "%M"),
    ("%ss", "%S"),
    ("%%", "%%"),
    ("%a", "%a"),
    ("%A", "%A"),
    ("%b", "%b"),
    ("%B", "%B"),
    ("%d", "%d"),
    ("%H", "%H"),
    ("%I", "%I"),
    ("%m", "%m"),
    ("%M", "%M"),
    ("%p", "%p"),
    ("%S", "%S"),
    ("%y", "%y"),
    ("%Y", "%Y"),
    ("%z", "%z"),
    ("%Z", "%Z"),
];

/// Expand `format` at `now`, append `.extension` and cap the length
pub fn generate_formatted_filename<Tz>(
    extension: &str,
    allow_spaces: bool,
    format: &str,
    now: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut name = String::with_capacity(format.len() + extension.len() + 8);
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        if c != '%' {
            name.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }

        match TOKENS.iter().find(|(token, _)| rest.starts_with(*token)) {
            Some((token, pattern)) => {
                let expanded = now.format(*pattern).to_string();
                if !expanded.trim().is_empty() {
                    name.push_str(&expanded);
                }
                rest = &rest[token.len()..];
            }
            None => {
                rest = &rest[1..];
            }
        }
    }

    name = replace_reserved(&name, true);
    if !allow_spaces {
        name = name.replace(' ', "_");
    }

    name.push('.');
    name.push_str(extension);

    truncate_bytes(&mut name, MAX_FILENAME_LEN);
    name
}

fn truncate_bytes(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Replace characters file systems reject with `_`
pub fn remove_reserved_file_characters(s: &str) -> String {
    replace_reserved(s, false)
}

/// `keep_separators` leaves `/` and `\` alone so templates can name
/// subdirectories
fn replace_reserved(s: &str, keep_separators: bool) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' if keep_separators => c,
            '/' | '\\' | '*' | '?' | '"' | '|' | ':' | '>' | '<' => '_',
            other => other,
        })
        .collect()
}

/// `directory` joined with `filename`, adding a `/` when missing
pub fn join_directory(directory: &str, filename: &str) -> String {
    let mut path = directory.to_string();
    if !path.ends_with('/') && !path.ends_with('\\') {
        path.push('/');
    }
    path.push_str(filename);
    path
}

/// Create the parent directory of `path`
pub fn ensure_directory_exists(path: &str) -> BridgeResult<()> {
    let normalized = path.replace('\\', "/");
    let Some(last) = normalized.rfind('/') else {
        return Ok(());
    };

    let directory = &normalized[..last];
    if !directory.is_empty() {
        fs::create_dir_all(directory)?;
    }
    Ok(())
}

/// First free variant of `path`: `name (2).ext`, `name (3).ext`, ... or
/// `name_2.ext` when spaces are not allowed
pub fn find_best_filename(path: &str, no_space: bool) -> BridgeResult<String> {
    if !Path::new(path).exists() {
        return Ok(path.to_string());
    }

    let Some(ext_start) = path.rfind('.') else {
        return Ok(path.to_string());
    };
    let (stem, ext) = path.split_at(ext_start);

    for num in 2..MAX_DISAMBIGUATION_ATTEMPTS + 2 {
        let candidate = if no_space {
            format!("{}_{}{}", stem, num, ext)
        } else {
            format!("{} ({}){}", stem, num, ext)
        };

        if !Path::new(&candidate).exists() {
            return Ok(candidate);
        }
    }

    Err(BridgeError::FilenameExhausted(path.to_string()))
}

/// Replay buffer file name template: `prefix format suffix`, sanitized
pub fn replay_buffer_format(prefix: &str, format: &str, suffix: &str) -> String {
    let mut f = String::new();

    if !prefix.is_empty() {
        f.push_str(prefix);
        if !f.ends_with(' ') {
            f.push(' ');
        }
    }

    f.push_str(format);

    if !suffix.is_empty() {
        if !suffix.starts_with(' ') {
            f.push(' ');
        }
        f.push_str(suffix);
    }

    remove_reserved_file_characters(&f)
}
