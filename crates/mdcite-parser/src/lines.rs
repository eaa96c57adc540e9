//! Line-offset bookkeeping for byte → line/column conversions.

/// Byte offsets at which each line starts. Index 0 is always 0.
pub fn compute_line_offsets(contents: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    offsets.push(0);
    for (idx, ch) in contents.char_indices() {
        if ch == '\n' {
            offsets.push(idx + 1);
        }
    }
    offsets
}

/// 1-based line number containing `byte`.
pub fn byte_to_line(byte: usize, offsets: &[usize]) -> usize {
    match offsets.binary_search(&byte) {
        Ok(idx) => idx + 1,
        Err(idx) => idx,
    }
}

/// (1-based line, 0-based byte column) for `byte`.
pub fn line_col(byte: usize, offsets: &[usize]) -> (usize, usize) {
    let line = byte_to_line(byte, offsets);
    let start = offsets.get(line.saturating_sub(1)).copied().unwrap_or(0);
    (line, byte.saturating_sub(start))
}

/// Text of a 1-based line, without its terminator.
pub fn line_text<'a>(contents: &'a str, offsets: &[usize], line: usize) -> &'a str {
    if line == 0 || line > offsets.len() {
        return "";
    }
    let start = offsets[line - 1];
    let end = offsets
        .get(line)
        .map(|next| next.saturating_sub(1))
        .unwrap_or(contents.len());
    contents[start..end].trim_end_matches('\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_cover_every_line() {
        let offsets = compute_line_offsets("one\ntwo\nthree");
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(byte_to_line(0, &offsets), 1);
        assert_eq!(byte_to_line(5, &offsets), 2);
        assert_eq!(byte_to_line(8, &offsets), 3);
    }

    #[test]
    fn line_col_is_zero_indexed_on_columns() {
        let offsets = compute_line_offsets("ab\ncd");
        assert_eq!(line_col(4, &offsets), (2, 1));
    }

    #[test]
    fn line_text_strips_terminators() {
        let content = "first\r\nsecond\nlast";
        let offsets = compute_line_offsets(content);
        assert_eq!(line_text(content, &offsets, 1), "first");
        assert_eq!(line_text(content, &offsets, 2), "second");
        assert_eq!(line_text(content, &offsets, 3), "last");
    }
}
