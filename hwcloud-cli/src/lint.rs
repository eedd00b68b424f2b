//! Static check for resource `read` handlers that never call `check_deleted`
//!
//! Without it a resource deleted outside of the tool fails every refresh instead of
//! dropping out of state.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static RESOURCE_IMPL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"impl\s+(?:[A-Za-z_:]+::)?Resource\s+for\s+([A-Za-z0-9_]+)")
        .unwrap_or_else(|e| unreachable!("invalid impl pattern: {e}"))
});

static READ_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"async\s+fn\s+read\s*\(").unwrap_or_else(|e| unreachable!("invalid read pattern: {e}"))
});

const REQUIRED_CALL: &str = "check_deleted";

/// One `read` handler without the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub file: PathBuf,
    /// 1-based line of the `read` signature.
    pub line: usize,
    pub resource: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}::read does not call {REQUIRED_CALL}",
            self.file.display(),
            self.line,
            self.resource
        )
    }
}

/// Length of the `r"`, `r#"`, `br##"`... opener at `i` and its `#` count.
fn raw_string_opener(bytes: &[u8], i: usize) -> Option<(usize, usize)> {
    if i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
        return None;
    }
    let prefix = match bytes.get(i..i + 2) {
        Some(b"br") => 2,
        _ if bytes[i] == b'r' => 1,
        _ => return None,
    };
    let hashes = bytes[i + prefix..].iter().take_while(|&&b| b == b'#').count();
    (bytes.get(i + prefix + hashes) == Some(&b'"')).then_some((prefix + hashes + 1, hashes))
}

fn blank(out: &mut [u8], range: std::ops::Range<usize>) {
    for b in &mut out[range] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

/// `src` with string literal contents and line comments blanked out.
///
/// Byte offsets and line numbers are preserved.
fn code_only(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        if let Some((opener, hashes)) = raw_string_opener(bytes, i) {
            let start = i + opener;
            let mut closing = vec![b'"'];
            closing.extend(std::iter::repeat_n(b'#', hashes));
            let end = bytes[start..]
                .windows(closing.len())
                .position(|w| w == closing.as_slice())
                .map_or(bytes.len(), |p| start + p);
            blank(&mut out, start..end);
            i = end + closing.len();
            continue;
        }
        match bytes[i] {
            b'"' => {
                let start = i + 1;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                blank(&mut out, start..i.min(bytes.len()));
            }
            // '"' and '{' style char literals
            b'\'' if bytes.get(i + 2) == Some(&b'\'') => {
                out[i + 1] = b' ';
                i += 2;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    // Every byte of a multi-byte character is blanked, so none is split.
    String::from_utf8_lossy(&out).into_owned()
}

/// Byte range of the `{ ... }` block opening at or after `from`.
fn block_range(src: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + src[from..].find('{')?;
    let mut depth = 0usize;
    for (i, c) in src[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

/// Findings for one file's source.
pub fn check_source(file: &Path, src: &str) -> Vec<Finding> {
    let src = &code_only(src);
    let mut findings = Vec::new();
    for caps in RESOURCE_IMPL.captures_iter(src) {
        let Some(impl_match) = caps.get(0) else {
            continue;
        };
        let Some((impl_start, impl_end)) = block_range(src, impl_match.end()) else {
            continue;
        };
        let body = &src[impl_start..impl_end];
        let Some(read) = READ_FN.find(body) else {
            continue;
        };
        let Some((read_start, read_end)) = block_range(body, read.end()) else {
            continue;
        };
        if !body[read_start..read_end].contains(REQUIRED_CALL) {
            findings.push(Finding {
                file: file.to_path_buf(),
                line: line_of(src, impl_start + read.start()),
                resource: caps[1].to_string(),
            });
        }
    }
    findings
}

fn collect_rust_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_rust_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

/// Check every `.rs` file under `dir`.
pub fn check_dir(dir: &Path) -> Result<Vec<Finding>> {
    let mut files = Vec::new();
    collect_rust_files(dir, &mut files)?;
    files.sort();

    let mut findings = Vec::new();
    for file in &files {
        let src = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
        findings.extend(check_source(file, &src));
    }
    tracing::debug!("checked {} files, {} findings", files.len(), findings.len());
    Ok(findings)
}
