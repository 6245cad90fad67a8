use log::{
    debug,
    warn,
};
use nom::{
    IResult,
    character::complete::{
        one_of,
        satisfy,
        space0,
    },
    combinator::opt,
    number::complete::double,
    sequence::preceded,
};
use serde::Serialize;

use crate::{
    error::{
        Error,
        Result,
    },
    symmetry::SymmetryOperation,
    types::Mat33,
};
use super::regex;

const FILE: &str = "structure file";
const LATTICE_LINE: usize = 3;


/// Lattice constants, lengths in bohr and angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lattice {
    pub a:     f64,
    pub b:     f64,
    pub c:     f64,
    pub alpha: f64,
    pub beta:  f64,
    pub gamma: f64,
}


impl Lattice {
    pub fn cubic(a: f64) -> Self {
        Self { a, b: a, c: a, alpha: 90.0, beta: 90.0, gamma: 90.0 }
    }

    /// Real space lattice vectors as rows, `a` along x and `b` in the xy plane.
    pub fn direct_basis(&self) -> Mat33<f64> {
        let (ca, cb, cg) = (self.alpha.to_radians().cos(),
                            self.beta.to_radians().cos(),
                            self.gamma.to_radians().cos());
        let sg = self.gamma.to_radians().sin();
        let cy = (ca - cb * cg) / sg;
        let cz = (1.0 - cb * cb - cy * cy).max(0.0).sqrt();

        [[self.a,      0.0,         0.0],
         [self.b * cg, self.b * sg, 0.0],
         [self.c * cb, self.c * cy, self.c * cz]]
    }

    pub fn volume(&self) -> f64 {
        let m = self.direct_basis();
        dot(m[0], cross(m[1], m[2]))
    }

    /// Reciprocal lattice vectors as rows, in units of 2π/bohr.
    pub fn reciprocal_basis(&self) -> Mat33<f64> {
        let m = self.direct_basis();
        let v = self.volume();
        let b1 = cross(m[1], m[2]);
        let b2 = cross(m[2], m[0]);
        let b3 = cross(m[0], m[1]);
        [b1.map(|x| x / v), b2.map(|x| x / v), b3.map(|x| x / v)]
    }
}


fn cross(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [u[1] * v[2] - u[2] * v[1],
     u[2] * v[0] - u[0] * v[2],
     u[0] * v[1] - u[1] * v[0]]
}

fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}


/// Lattice and point group read from the structure file.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub title:    String,
    pub lattice:  Lattice,
    pub symmetry: Vec<SymmetryOperation>,
}


fn parse_lattice(line: &str) -> Option<Lattice> {
    let spaced = line.split_whitespace()
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()
        .filter(|v| v.len() >= 6);

    // 6F10.6, wide values may run together
    let v = spaced.or_else(|| {
        (0 .. 6).map(|i| {
            line.get(i * 10 .. (i + 1) * 10)
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
        .collect::<Option<Vec<f64>>>()
    })?;
    Some(Lattice { a: v[0], b: v[1], c: v[2], alpha: v[3], beta: v[4], gamma: v[5] })
}


fn signed_digit(input: &str) -> IResult<&str, i32> {
    let (input, _) = space0(input)?;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, digit) = satisfy(|c| c.is_ascii_digit())(input)?;
    let value = digit as i32 - '0' as i32;
    Ok((input, if sign == Some('-') { -value } else { value }))
}


/// A rotation row: three signed single digits, spaced (`-1 0 0`) or packed
/// (`0-1 0`), followed by an optional translation.
fn rotation_row(input: &str) -> IResult<&str, ([i32; 3], f64)> {
    let (input, r0) = signed_digit(input)?;
    let (input, r1) = signed_digit(input)?;
    let (input, r2) = signed_digit(input)?;
    let (input, t) = opt(preceded(space0, double))(input)?;
    Ok((input, ([r0, r1, r2], t.unwrap_or(0.0))))
}


fn parse_operation(rows: &[&str]) -> Option<SymmetryOperation> {
    let mut rotation = [[0i32; 3]; 3];
    let mut translation = [0.0f64; 3];
    for (i, row) in rows.iter().take(3).enumerate() {
        let (_, (r, t)) = rotation_row(row).ok()?;
        rotation[i] = r;
        translation[i] = t;
    }
    (rows.len() >= 3).then_some(SymmetryOperation { rotation, translation })
}


/// Parse the structure file: lattice constants from the fourth line and the
/// symmetry operations following the `NUMBER OF SYMMETRY OPERATIONS` header.
///
/// Each operation spans 4 lines, 3 rotation rows and a trailing index line.
/// Operations with malformed rows are skipped.
pub fn parse_structure(content: &str) -> Result<Structure> {
    let lines = content.lines().collect::<Vec<_>>();
    let title = lines.first().map(|l| l.trim().to_string()).unwrap_or_default();

    let lattice = lines.get(LATTICE_LINE)
        .and_then(|l| parse_lattice(l))
        .ok_or_else(|| Error::missing(FILE, "lattice parameters"))?;

    let (iheader, nsym) = lines.iter()
        .enumerate()
        .find_map(|(i, l)| {
            regex!(r"^\s*(\d+)\s+NUMBER OF SYMMETRY OPERATIONS")
                .captures(l)
                .and_then(|c| c[1].parse::<usize>().ok())
                .map(|n| (i, n))
        })
        .ok_or_else(|| Error::missing(FILE, "NUMBER OF SYMMETRY OPERATIONS"))?;

    let symmetry = lines[iheader + 1 ..]
        .chunks(4)
        .take(nsym)
        .enumerate()
        .filter_map(|(isym, rows)| {
            let op = parse_operation(rows);
            if op.is_none() {
                debug!("Skipping malformed symmetry operation {}: {:?}", isym + 1, rows);
            }
            op
        })
        .collect::<Vec<_>>();

    if symmetry.len() != nsym {
        warn!("Structure file declares {} symmetry operations, {} were read.", nsym, symmetry.len());
    }

    Ok(Structure { title, lattice, symmetry })
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "\
Cu
F   LATTICE,NONEQUIV.ATOMS:  1 225 Fm-3m
MODE OF CALC=RELA unit=bohr
  6.820000  6.820000  6.820000 90.000000 90.000000 90.000000
ATOM   1: X=0.00000000 Y=0.00000000 Z=0.00000000
          MULT= 1          ISPLIT= 2
Cu1        NPT=  781  R0=0.00005000 RMT=    2.2000   Z: 29.0
LOCAL ROT MATRIX:    1.0000000 0.0000000 0.0000000
                     0.0000000 1.0000000 0.0000000
                     0.0000000 0.0000000 1.0000000
   3      NUMBER OF SYMMETRY OPERATIONS
-1 0 0 0.00000000
 0-1 0 0.00000000
 0 0-1 0.50000000
       1
 0 1 0 0.00000000
 1 0 0 0.00000000
 0 0 1 0.00000000
       2
 x y z
 1 0 0 0.00000000
 0 0 1 0.00000000
       3
";

    #[test]
    fn test_parse_structure() {
        let s = parse_structure(SAMPLE).unwrap();
        assert_eq!(s.title, "Cu");
        assert_eq!(s.lattice, Lattice::cubic(6.82));
        assert_eq!(s.symmetry.len(), 2);
        assert_eq!(s.symmetry[0].rotation, [[-1, 0, 0], [0, -1, 0], [0, 0, -1]]);
        assert_eq!(s.symmetry[0].translation, [0.0, 0.0, 0.5]);
        assert_eq!(s.symmetry[1].rotation, [[0, 1, 0], [1, 0, 0], [0, 0, 1]]);
    }

    #[test]
    fn test_rotation_row() {
        assert_eq!(rotation_row(" 0-1 0 0.25000000").unwrap().1, ([0, -1, 0], 0.25));
        assert_eq!(rotation_row("-1 0 0 0.00000000").unwrap().1, ([-1, 0, 0], 0.0));
        assert_eq!(rotation_row("-1-1+1").unwrap().1, ([-1, -1, 1], 0.0));
        assert!(rotation_row(" a b c").is_err());
    }

    #[test]
    fn test_missing_symmetry_header() {
        let input = SAMPLE.replace("NUMBER OF SYMMETRY OPERATIONS", "SOMETHING ELSE");
        match parse_structure(&input) {
            Err(Error::MissingSection { anchor, .. }) => assert_eq!(anchor, "NUMBER OF SYMMETRY OPERATIONS"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_packed_lattice_line() {
        let lat = parse_lattice("123.456789123.456789 10.000000 90.000000 90.000000120.000000").unwrap();
        assert_relative_eq!(lat.a, 123.456789);
        assert_relative_eq!(lat.b, 123.456789);
        assert_relative_eq!(lat.gamma, 120.0);
    }

    #[test]
    fn test_reciprocal_basis() {
        let rec = Lattice::cubic(2.0).reciprocal_basis();
        let expected = [[0.5, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.5]];
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                assert_relative_eq!(rec[i][j], expected[i][j], epsilon = 1e-12);
            }
        }

        let hex = Lattice { a: 3.0, b: 3.0, c: 5.0, alpha: 90.0, beta: 90.0, gamma: 120.0 };
        let direct = hex.direct_basis();
        let rec = hex.reciprocal_basis();
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                let d = dot(direct[i], rec[j]);
                assert_relative_eq!(d, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-12);
            }
        }
    }
}
