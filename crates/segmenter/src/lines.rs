/// Maps byte offsets to 1-indexed line numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self {
            newlines: source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// Line containing byte `offset`
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }

    /// First and last line touched by `[start, end)`
    #[must_use]
    pub fn span_lines(&self, start: usize, end: usize) -> (usize, usize) {
        let last = if end > start { end - 1 } else { start };
        (self.line_of(start), self.line_of(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of() {
        let index = LineIndex::new("a;\nb;\n\nc;");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 1);
        assert_eq!(index.line_of(3), 2);
        assert_eq!(index.line_of(7), 4);
    }

    #[test]
    fn test_span_lines() {
        let index = LineIndex::new("a {\n  b;\n}\n");
        assert_eq!(index.span_lines(0, 10), (1, 3));
        assert_eq!(index.span_lines(6, 8), (2, 2));
        assert_eq!(index.span_lines(4, 4), (2, 2));
    }
}
