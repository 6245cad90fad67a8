//! Text parsers for the solver listings.
//!
//! Every parser works on the raw file content, reading it line by line. A line
//! is classified by a fixed list of matchers tried in order; the first matcher
//! that recognises the line decides whether it is a record, a section boundary,
//! or noise to be skipped.

pub mod klist;
pub mod energy;
pub mod scf;
pub mod structure;
pub mod output1;
pub mod kgen;

pub use klist::{
    KlistRecord,
    parse_klist,
};
pub use energy::{
    EnergyBlock,
    parse_energy,
};
pub use scf::{
    parse_fermi_energy,
    fermi_energy_or_zero,
};
pub use structure::{
    Lattice,
    Structure,
    parse_structure,
};
pub use output1::{
    EigenvalueTable,
    parse_output1,
};
pub use kgen::{
    MeshListing,
    RelationRow,
    parse_kgen,
};


/// Result of classifying a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<T> {
    Record(T),
    Skip,
    Boundary,
}

pub type Matcher<T> = fn(&str) -> Option<Line<T>>;


/// Try the matchers in order, lines recognised by none of them are skipped.
pub fn classify<T>(line: &str, matchers: &[Matcher<T>]) -> Line<T> {
    matchers.iter()
        .find_map(|m| m(line))
        .unwrap_or(Line::Skip)
}


/// Compile a constant regex once.
macro_rules! regex {
    ($re:literal) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}
pub(crate) use regex;


/// Parse a Fortran formatted float, `D` exponents included.
pub fn parse_fortran_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.contains(['D', 'd']) {
        s.replace(['D', 'd'], "E").parse::<f64>().ok()
    } else {
        s.parse::<f64>().ok()
    }
}


/// Extract all floats from a line, including those glued together such as
/// `-0.3872013-0.1234567`.
pub fn float_tokens(line: &str) -> Vec<f64> {
    regex!(r"[-+]?(?:\d+\.\d*|\.\d+)(?:[EeDd][-+]?\d+)?")
        .find_iter(line)
        .filter_map(|m| parse_fortran_float(m.as_str()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn end_marker(line: &str) -> Option<Line<i32>> {
        line.trim().eq("END").then_some(Line::Boundary)
    }

    fn integer(line: &str) -> Option<Line<i32>> {
        line.trim().parse::<i32>().ok().map(Line::Record)
    }

    #[test]
    fn test_classify() {
        let matchers: &[Matcher<i32>] = &[end_marker, integer];
        assert_eq!(classify(" 42 ", matchers), Line::Record(42));
        assert_eq!(classify("END", matchers), Line::Boundary);
        assert_eq!(classify("garbage", matchers), Line::Skip);
    }

    #[test]
    fn test_parse_fortran_float() {
        assert_eq!(parse_fortran_float(" 0.15D+01"), Some(1.5));
        assert_eq!(parse_fortran_float("-2.5E-01"), Some(-0.25));
        assert_eq!(parse_fortran_float("x"), None);
    }

    #[test]
    fn test_float_tokens() {
        assert_eq!(float_tokens("  -0.3872013-0.1234567   0.5"), vec![-0.3872013, -0.1234567, 0.5]);
        assert_eq!(float_tokens(" 0.500000000000E+00-0.25D+00"), vec![0.5, -0.25]);
        assert!(float_tokens("EIGENVALUES ARE:").is_empty());
    }
}
