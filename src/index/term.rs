use std::cmp::Ordering;
use std::fmt;
use crate::util::string_order::compare_utf8_as_utf16;

/// A term: field name plus term text.
///
/// Terms sort by field name, then by text, both in UTF-16 order; this is the
/// order of every term dictionary on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Term { field: field.into(), text: text.into() }
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_utf8_as_utf16(self.field.as_bytes(), other.field.as_bytes())
            .then_with(|| compare_utf8_as_utf16(self.text.as_bytes(), other.text.as_bytes()))
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Dictionary entry of a term: document frequency and where its postings live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub freq_pointer: u64,
    pub prox_pointer: u64,
    /// Offset of the skip data from `freq_pointer`; 0 when there is none
    pub skip_offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_sorts_before_text() {
        let mut terms = vec![Term::new("b", "a"), Term::new("a", "z"), Term::new("a", "\u{1f600}"), Term::new("a", "\u{e000}")];
        terms.sort();
        assert_eq!(
            terms,
            vec![Term::new("a", "z"), Term::new("a", "\u{1f600}"), Term::new("a", "\u{e000}"), Term::new("b", "a")]
        );
    }
}
