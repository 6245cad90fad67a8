use log::{
    debug,
    warn,
};

use crate::types::RY_TO_EV;
use super::{
    Line,
    Matcher,
    classify,
    float_tokens,
    regex,
};


/// Eigenvalues (eV) per irreducible k-point, in listing order. Every row has
/// the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EigenvalueTable {
    pub kpoints:  Vec<Option<[f64; 3]>>,
    pub energies: Vec<Vec<f64>>,
}


impl EigenvalueTable {
    pub fn nkpoints(&self) -> usize {
        self.energies.len()
    }

    pub fn nbands(&self) -> usize {
        self.energies.first().map_or(0, Vec::len)
    }
}


#[derive(Debug, Clone, PartialEq)]
enum Output1Record {
    KPoint(Option<[f64; 3]>),
    Open,
    Values(Vec<f64>),
}


fn kpoint_marker(line: &str) -> Option<Line<Output1Record>> {
    regex!(r"^\s*K=").is_match(line).then(|| {
        let v = float_tokens(&line[line.find("K=").unwrap_or(0) + 2 ..]);
        let k = (v.len() >= 3).then(|| [v[0], v[1], v[2]]);
        Line::Record(Output1Record::KPoint(k))
    })
}

fn close_marker(line: &str) -> Option<Line<Output1Record>> {
    line.contains("EIGENVALUES BELOW").then_some(Line::Boundary)
}

fn open_marker(line: &str) -> Option<Line<Output1Record>> {
    line.contains("EIGENVALUES ARE").then_some(Line::Record(Output1Record::Open))
}

fn values(line: &str) -> Option<Line<Output1Record>> {
    let v = float_tokens(line);
    (!v.is_empty()).then_some(Line::Record(Output1Record::Values(v)))
}


/// Parse the block-delimited band energy listing.
///
/// Each `K=` marker opens a k-point block; the floats (Ry) between
/// `EIGENVALUES ARE` and `EIGENVALUES BELOW` are its eigenvalues. Rows are
/// truncated to the smallest band count found across k-points.
pub fn parse_output1(content: &str) -> EigenvalueTable {
    let matchers: &[Matcher<Output1Record>] = &[kpoint_marker, close_marker, open_marker, values];

    let mut table = EigenvalueTable::default();
    let mut collecting = false;

    for (iline, line) in content.lines().enumerate() {
        match classify(line, matchers) {
            Line::Record(Output1Record::KPoint(k)) => {
                table.kpoints.push(k);
                table.energies.push(vec![]);
                collecting = false;
            },
            Line::Record(Output1Record::Open) => {
                if table.energies.is_empty() {
                    debug!("Eigenvalue section without K= marker at line {}", iline + 1);
                    table.kpoints.push(None);
                    table.energies.push(vec![]);
                }
                collecting = true;
            },
            Line::Record(Output1Record::Values(v)) if collecting => {
                if let Some(row) = table.energies.last_mut() {
                    row.extend(v.into_iter().map(|e| e * RY_TO_EV));
                }
            },
            Line::Boundary => collecting = false,
            _ => (),
        }
    }

    // Blocks that never reached an eigenvalue section carry nothing
    let (kpoints, energies): (Vec<_>, Vec<_>) = table.kpoints.into_iter()
        .zip(table.energies)
        .filter(|(_, e)| !e.is_empty())
        .unzip();
    table.kpoints = kpoints;
    table.energies = energies;

    let nmin = table.energies.iter().map(Vec::len).min().unwrap_or(0);
    let ntruncated = table.energies.iter().filter(|e| e.len() > nmin).count();
    if ntruncated > 0 {
        warn!("Band count differs between k-points, {} k-point(s) truncated to {} bands.", ntruncated, nmin);
        table.energies.iter_mut().for_each(|e| e.truncate(nmin));
    }

    table
}
