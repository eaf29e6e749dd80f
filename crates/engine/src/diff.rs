//! Expected-vs-observed event type diffs for convergence failures.

use std::io::Write;
use std::path::PathBuf;

/// Render a line diff of two type lists (`-` expected only, `+` observed only).
pub fn render_type_diff(expected: &[String], observed: &[String]) -> String {
    let n = expected.len();
    let m = observed.len();

    // lcs[i][j] = LCS length of expected[i..] and observed[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if expected[i] == observed[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = String::from("--- expected\n+++ observed\n");
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && expected[i] == observed[j] {
            out.push_str(&format!("  {}\n", expected[i]));
            i += 1;
            j += 1;
        } else if j < m && (i == n || lcs[i][j + 1] >= lcs[i + 1][j]) {
            out.push_str(&format!("+ {}\n", observed[j]));
            j += 1;
        } else {
            out.push_str(&format!("- {}\n", expected[i]));
            i += 1;
        }
    }
    out
}

/// Write both lists as pretty JSON to kept temp files for an external diff tool.
pub fn write_diff_files(
    expected: &[String],
    observed: &[String],
) -> std::io::Result<(PathBuf, PathBuf)> {
    Ok((
        write_kept("wait_for-", expected)?,
        write_kept("next_set-", observed)?,
    ))
}

fn write_kept(prefix: &str, types: &[String]) -> std::io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".json")
        .tempfile()?;
    let json = serde_json::to_string_pretty(types).map_err(std::io::Error::other)?;
    file.write_all(json.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
