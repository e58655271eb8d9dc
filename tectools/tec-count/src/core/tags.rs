//! Molecular tag matching
//!
//! Read names terminate in `#<random_and_barcode_bases>`; the suffix
//! length equals the barcode length. Barcodes are written over the
//! IUPAC alphabet and compiled into anchored regular expressions, one
//! small ordered list per barcode; the first barcode whose list
//! matches the terminal `[ACGT]+` run of a read name wins.

use regex::Regex;

use crate::core::PipelineError;

/// A matched barcode together with its random-prefix length: the
/// number of ambiguity letters before the first fixed base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch<'a> {
    pub barcode: &'a str,
    pub random_prefix: usize,
}

#[derive(Debug)]
struct TagEntry {
    barcode: String,
    regexes: Vec<Regex>,
    random_prefix: usize,
}

/// Compiled matcher over a fixed, ordered set of barcodes.
#[derive(Debug)]
pub struct TagMatcher {
    entries: Vec<TagEntry>,
}

impl TagMatcher {
    /// Compile a matcher. Barcode order is preserved: when a suffix
    /// matches several barcodes, the first configured one wins.
    pub fn new(barcodes: &[String]) -> Result<Self, PipelineError> {
        let mut entries = Vec::with_capacity(barcodes.len());

        for barcode in barcodes {
            let mut pattern = String::with_capacity(barcode.len() * 5 + 1);
            for base in barcode.chars() {
                pattern.push_str(expand_base(base));
            }
            pattern.push('$');

            entries.push(TagEntry {
                barcode: barcode.clone(),
                regexes: vec![Regex::new(&pattern)?],
                random_prefix: random_prefix(barcode),
            });
        }

        Ok(TagMatcher { entries })
    }

    /// Test the terminal `[ACGT]+` run of a read name against every
    /// barcode in configuration order.
    pub fn match_name(&self, name: &str) -> Option<TagMatch<'_>> {
        let suffix = terminal_bases(name);
        if suffix.is_empty() {
            return None;
        }

        for entry in &self.entries {
            if suffix.len() < entry.barcode.len() {
                continue;
            }
            if entry.regexes.iter().any(|re| re.is_match(suffix)) {
                return Some(TagMatch {
                    barcode: &entry.barcode,
                    random_prefix: entry.random_prefix,
                });
            }
        }

        None
    }

    pub fn barcodes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.barcode.as_str())
    }
}

/// Terminal run of unambiguous bases in a read name.
fn terminal_bases(name: &str) -> &str {
    let bytes = name.as_bytes();
    let mut start = bytes.len();

    while start > 0 && matches!(bytes[start - 1], b'A' | b'C' | b'G' | b'T') {
        start -= 1;
    }

    &name[start..]
}

/// Count of ambiguity letters before the first fixed base.
fn random_prefix(barcode: &str) -> usize {
    barcode
        .chars()
        .take_while(|base| !matches!(base, 'A' | 'C' | 'G' | 'T'))
        .count()
}

/// IUPAC ambiguity classes over {A, C, G, T}. `N` is a wildcard.
fn expand_base(base: char) -> &'static str {
    match base {
        'A' => "A",
        'C' => "C",
        'G' => "G",
        'T' => "T",
        'R' => "[AG]",
        'Y' => "[CT]",
        'K' => "[GT]",
        'M' => "[AC]",
        'S' => "[CG]",
        'W' => "[AT]",
        'B' => "[CGT]",
        'D' => "[AGT]",
        'H' => "[ACT]",
        'V' => "[ACG]",
        'N' => "[ACGT]",
        _ => panic!("ERROR: non-IUPAC letter '{}' in barcode!", base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(barcodes: &[&str]) -> TagMatcher {
        let owned: Vec<String> = barcodes.iter().map(|b| b.to_string()).collect();
        TagMatcher::new(&owned).unwrap()
    }

    #[test]
    fn test_fixed_suffix_matches() {
        let m = matcher(&["NNNNBGAGGC"]);
        let hit = m.match_name("HWI-1:2:3#ACGTCGAGGC").unwrap();
        assert_eq!(hit.barcode, "NNNNBGAGGC");
        assert_eq!(hit.random_prefix, 5);
    }

    #[test]
    fn test_fixed_position_mismatch_rejected() {
        let m = matcher(&["NNNNBGAGGC"]);
        assert!(m.match_name("HWI-1:2:3#ACGTCGAGGA").is_none());
    }

    #[test]
    fn test_ambiguity_class_honored() {
        // B expands to {C, G, T}, never A
        let m = matcher(&["NNNNBGAGGC"]);
        assert!(m.match_name("r#AAAATGAGGC").is_some());
        assert!(m.match_name("r#AAAAAGAGGC").is_none());
    }

    #[test]
    fn test_first_barcode_wins() {
        let m = matcher(&["NNNNNNNNNN", "NNNNBAGAAG"]);
        let hit = m.match_name("r#ACGTCAGAAG").unwrap();
        assert_eq!(hit.barcode, "NNNNNNNNNN");
    }

    #[test]
    fn test_terminal_run_shorter_than_barcode() {
        let m = matcher(&["NNNNBGAGGC"]);
        assert!(m.match_name("read#GAGGC").is_none());
    }

    #[test]
    fn test_random_prefix_counts_leading_ambiguity_only() {
        assert_eq!(random_prefix("NNNNBGAGGC"), 5);
        assert_eq!(random_prefix("ACGT"), 0);
        assert_eq!(random_prefix("NNAANN"), 2);
    }
}
