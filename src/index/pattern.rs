//! Name pattern matching shared by the symbol and path sub-indexes.

/// A compiled containing-pattern query: anchoring, subsequence, and case
/// options applied to candidate names.
pub(crate) struct NamePattern {
    text: String,
    anchor_start: bool,
    anchor_end: bool,
    subsequence: bool,
    ignore_case: bool,
}

impl NamePattern {
    pub fn new(
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
    ) -> Self {
        let text = if ignore_case {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        Self {
            text,
            anchor_start,
            anchor_end,
            subsequence,
            ignore_case,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let lowered;
        let candidate = if self.ignore_case {
            lowered = candidate.to_lowercase();
            &lowered
        } else {
            candidate
        };

        if self.subsequence {
            return self.matches_subsequence(candidate);
        }

        match (self.anchor_start, self.anchor_end) {
            (true, true) => candidate == self.text,
            (true, false) => candidate.starts_with(&self.text),
            (false, true) => candidate.ends_with(&self.text),
            (false, false) => candidate.contains(&self.text),
        }
    }

    /// Pattern characters must appear in order; anchors pin the first and
    /// last pattern character to the candidate's ends.
    fn matches_subsequence(&self, candidate: &str) -> bool {
        if self.anchor_start
            && self.text.chars().next() != candidate.chars().next()
        {
            return false;
        }
        if self.anchor_end
            && self.text.chars().next_back() != candidate.chars().next_back()
        {
            return false;
        }

        let mut pattern = self.text.chars().peekable();
        for c in candidate.chars() {
            if pattern.peek() == Some(&c) {
                pattern.next();
            }
        }
        pattern.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_anchors() {
        assert!(NamePattern::new("draw", false, false, false, false).matches("redrawAll"));
        assert!(NamePattern::new("re", true, false, false, false).matches("redrawAll"));
        assert!(!NamePattern::new("draw", true, false, false, false).matches("redrawAll"));
        assert!(NamePattern::new("All", false, true, false, false).matches("redrawAll"));
        assert!(NamePattern::new("redrawAll", true, true, false, false).matches("redrawAll"));
        assert!(!NamePattern::new("redraw", true, true, false, false).matches("redrawAll"));
    }

    #[test]
    fn test_case_folding() {
        assert!(NamePattern::new("DRAW", false, false, false, true).matches("redrawAll"));
        assert!(!NamePattern::new("DRAW", false, false, false, false).matches("redrawAll"));
    }

    #[test]
    fn test_subsequence() {
        assert!(NamePattern::new("rwa", false, false, true, false).matches("redrawAll"));
        assert!(!NamePattern::new("rwz", false, false, true, false).matches("redrawAll"));
        assert!(NamePattern::new("rl", true, true, true, false).matches("redrawAll"));
        assert!(!NamePattern::new("wl", true, true, true, false).matches("redrawAll"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(NamePattern::new("", true, true, false, false).matches("anything"));
    }
}
