//! Line filter: reduces converter output to the message definition lines.
//!
//! `tsp2ebusd` emits ebusd CSV: one header line naming the columns, then
//! definition lines, interleaved with comments (`#`) and meta lines (`*`).
//! Newer ebusd CSV layouts carry an access `level` as the third column, which
//! the daemon's `read -def` / `define` commands do not accept, so it is cut
//! out when the header announces it.
//!
//! ```text
//! type,circuit,level,name,...   <- header, dropped; contains ",level,"
//! r,heating,,temp,...           <- kept as "r,heating,temp,..."
//! # comment                     <- dropped
//! *r,,,,                        <- dropped (default line)
//! ```

/// Substring in the header line announcing a `level` column.
pub const LEVEL_MARKER: &str = ",level,";

/// Name of the column removed when the header announces it.
const LEVEL_FIELD: &str = "level";

/// Filters raw converter output into definition lines.
///
/// The first line is the header and is never returned.  Whether a level
/// column exists, and where, is decided once from the header only: when it
/// contains [`LEVEL_MARKER`], the position of the `level` field is cut from
/// every kept line (index 2 in the usual `type,circuit,level,name` layout).
/// Every following line is dropped if it is blank or starts with `#` or `*`.
///
/// An empty input yields an empty output.
///
/// # Example
///
/// ```rust
/// use ebus_core::filter_lines;
///
/// let out = filter_lines(["head,level,name", "A1,1,foo", "# c", "A1,1,bar"]);
/// assert_eq!(out, vec!["A1,foo", "A1,bar"]);
/// ```
pub fn filter_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines = lines.into_iter();
    let level = match lines.next() {
        Some(header) => level_column(header.as_ref()),
        None => return Vec::new(),
    };

    lines
        .filter_map(|line| {
            let line = line.as_ref().trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') || line.starts_with('*') {
                return None;
            }
            Some(match level {
                Some(index) => remove_column(line, index),
                None => line.to_string(),
            })
        })
        .collect()
}

fn level_column(header: &str) -> Option<usize> {
    let header = header.trim_end_matches('\r');
    if !header.contains(LEVEL_MARKER) {
        return None;
    }
    header.split(',').position(|field| field == LEVEL_FIELD)
}

/// Removes the comma-separated field at `index`, keeping the others in order.
///
/// Lines with fewer fields are returned unchanged.
fn remove_column(line: &str, index: usize) -> String {
    let mut parts: Vec<&str> = line.split(',').collect();
    if index < parts.len() {
        parts.remove(index);
    }
    parts.join(",")
}
