use log::{
    debug,
    warn,
};

use crate::{
    error::{
        Error,
        Result,
    },
    types::Mat33,
};
use super::{
    float_tokens,
    regex,
};

const FILE: &str = "mesh generation listing";


/// One row of the full-mesh relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRow {
    pub point:    usize,
    pub x:        usize,
    pub y:        usize,
    pub z:        usize,
    pub relation: usize,
}


/// Full k-mesh as enumerated by the mesh generator.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshListing {
    pub reciprocal_basis: Mat33<f64>,
    pub dims:             [usize; 3],
    pub rows:             Vec<RelationRow>,
}


impl MeshListing {
    pub fn npoints(&self) -> usize {
        self.dims.iter().fold(1usize, |acc, &n| acc.saturating_mul(n))
    }
}


fn parse_basis(lines: &[&str]) -> Option<Mat33<f64>> {
    let ihead = lines.iter().position(|l| regex!(r"\bG1\s+G2\s+G3\b").is_match(l))?;
    let mut basis = [[0.0; 3]; 3];
    for (i, row) in basis.iter_mut().enumerate() {
        let v = float_tokens(lines.get(ihead + 1 + i)?);
        if v.len() < 3 {
            return None;
        }
        row.copy_from_slice(&v[..3]);
    }
    Some(basis)
}


/// Last three integers of the `DIVISION` line, each incremented by one.
fn parse_dims(lines: &[&str]) -> Option<Result<[usize; 3]>> {
    lines.iter()
        .filter(|l| l.contains("DIVISION"))
        .find_map(|l| {
            let ints = regex!(r"\d+")
                .find_iter(l)
                .filter_map(|m| m.as_str().parse::<usize>().ok())
                .collect::<Vec<_>>();
            (ints.len() >= 3).then(|| -> Result<[usize; 3]> {
                let n = ints.len();
                let mut dims = [0usize; 3];
                for (d, &i) in dims.iter_mut().zip(ints[n - 3 ..].iter()) {
                    *d = i.checked_add(1)
                        .ok_or_else(|| Error::mismatch("mesh divisions", usize::MAX, i))?;
                }
                Ok(dims)
            })
        })
}


/// Number of mesh points, `None` when it does not fit in `usize`.
fn checked_npoints(dims: [usize; 3]) -> Option<usize> {
    dims[0].checked_mul(dims[1])?.checked_mul(dims[2])
}


fn relation_row(line: &str) -> Option<RelationRow> {
    let v = line.split_whitespace()
        .take(5)
        .map(|s| s.parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    (v.len() == 5).then(|| RelationRow { point: v[0], x: v[1], y: v[2], z: v[3], relation: v[4] })
}


/// Parse the mesh generation listing.
///
/// The mesh dimensions are the last three integers of the `DIVISION` line,
/// each incremented by one; the relation table follows the header naming the
/// `POINT`, `COORDINATES` and `RELATION` columns and must contain exactly
/// `nx*ny*nz` rows. A missing reciprocal basis falls back to the identity.
pub fn parse_kgen(content: &str) -> Result<MeshListing> {
    let lines = content.lines().collect::<Vec<_>>();

    let reciprocal_basis = parse_basis(&lines).unwrap_or_else(|| {
        warn!("No reciprocal basis (G1 G2 G3) found in the mesh generation listing, using identity.");
        [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
    });

    let dims = parse_dims(&lines)
        .ok_or_else(|| Error::missing(FILE, "DIVISION"))??;
    let npoints = checked_npoints(dims)
        .ok_or_else(|| {
            let claimed = dims[0].saturating_mul(dims[1]).saturating_mul(dims[2]);
            Error::mismatch("mesh divisions", usize::MAX, claimed)
        })?;

    let ihead = lines.iter()
        .position(|l| l.contains("POINT") && l.contains("COORDINATES") && l.contains("RELATION"))
        .ok_or_else(|| Error::missing(FILE, "POINT COORDINATES RELATION"))?;

    // the header is not trusted for the allocation size
    let mut rows = Vec::with_capacity(npoints.min(lines.len() - ihead));
    for (iline, line) in lines.iter().enumerate().skip(ihead + 1) {
        if rows.len() == npoints {
            break;
        }
        match relation_row(line) {
            Some(row) => rows.push(row),
            None => debug!("Skipping malformed relation row at line {}: {:?}", iline + 1, line),
        }
    }

    if rows.len() < npoints {
        return Err(Error::mismatch("relation rows", npoints, rows.len()));
    }

    Ok(MeshListing { reciprocal_basis, dims, rows })
}
