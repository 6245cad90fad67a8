use log::{
    debug,
    warn,
};

use super::{
    Line,
    Matcher,
    classify,
};


/// One record of the k-point listing, the fractional coordinates are
/// `numerators / division`.
#[derive(Debug, Clone, PartialEq)]
pub struct KlistRecord {
    pub label:      String,
    pub numerators: [i64; 3],
    pub division:   i64,
    pub weight:     f64,
}


impl KlistRecord {
    pub fn frac(&self) -> [f64; 3] {
        let d = self.division as f64;
        [
            self.numerators[0] as f64 / d,
            self.numerators[1] as f64 / d,
            self.numerators[2] as f64 / d,
        ]
    }
}


fn end_marker(line: &str) -> Option<Line<KlistRecord>> {
    line.trim_start().starts_with("END").then_some(Line::Boundary)
}


fn record_from_fields(label: &str, fields: &[&str]) -> Option<KlistRecord> {
    if fields.len() < 5 {
        return None;
    }
    let kx = fields[0].trim().parse::<i64>().ok()?;
    let ky = fields[1].trim().parse::<i64>().ok()?;
    let kz = fields[2].trim().parse::<i64>().ok()?;
    let division = fields[3].trim().parse::<i64>().ok()?;
    let weight = fields[4].trim().parse::<f64>().ok()?;
    if division <= 0 {
        return None;
    }

    Some(KlistRecord {
        label: label.trim().to_string(),
        numerators: [kx, ky, kz],
        division,
        weight,
    })
}


/// Whitespace separated form: `label kx ky kz d weight [trailing...]`, the
/// label may be omitted.
fn spaced_record(line: &str) -> Option<Line<KlistRecord>> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() >= 6 {
        if let Some(rec) = record_from_fields(tokens[0], &tokens[1..6]) {
            return Some(Line::Record(rec));
        }
    }
    record_from_fields("", &tokens).map(Line::Record)
}


/// Fixed column form (A10, 4I10, F5), used when wide integers run together.
fn fixed_record(line: &str) -> Option<Line<KlistRecord>> {
    if !line.is_ascii() || line.len() < 51 {
        return None;
    }
    let end = line.len().min(55);
    let fields = [&line[10..20], &line[20..30], &line[30..40], &line[40..50], &line[50..end]];
    record_from_fields(&line[..10], &fields).map(Line::Record)
}


/// Parse the k-point listing until the `END` marker, malformed records are skipped.
pub fn parse_klist(content: &str) -> Vec<KlistRecord> {
    let matchers: &[Matcher<KlistRecord>] = &[end_marker, spaced_record, fixed_record];
    let mut ret = vec![];

    for (iline, line) in content.lines().enumerate() {
        match classify(line, matchers) {
            Line::Record(rec) => ret.push(rec),
            Line::Boundary    => break,
            Line::Skip        => {
                if !line.trim().is_empty() {
                    debug!("Skipping malformed k-point record at line {}: {:?}", iline + 1, line);
                }
            },
        }
    }

    if ret.is_empty() {
        warn!("No valid k-point record found in the k-point listing.");
    }
    ret
}


/// Most common division among the records, i.e. the k-mesh subdivision.
pub fn mesh_division(records: &[KlistRecord]) -> Option<usize> {
    let mut counts: Vec<(i64, usize)> = vec![];
    for r in records {
        match counts.iter_mut().find(|(d, _)| *d == r.division) {
            Some((_, n)) => *n += 1,
            None => counts.push((r.division, 1)),
        }
    }
    counts.into_iter()
        .max_by_key(|&(_, n)| n)
        .map(|(d, _)| d as usize)
}
