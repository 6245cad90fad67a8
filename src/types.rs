use anyhow::{
    bail,
    Context,
};
use ndarray::Array3;

pub type Result<T> = anyhow::Result<T>;

pub type Cube<T>  = Array3<T>;  // indexed as [iz, iy, ix], flat layout is ix + iy*nx + iz*nx*ny
pub type Vec3<T>  = [T;3];
pub type MatX3<T> = Vec<[T;3]>;  // Nx3 matrix
pub type Mat33<T> = [[T;3];3];   // 3x3 matrix

/// 1 Ry in eV.
pub const RY_TO_EV: f64 = 13.605693122994;


/// Parse a range like "3", "5..7" or "-2..-1" into the inclusive list of indices.
pub fn range_parse(input: &str) -> Result<Vec<i32>> {
    let input = input.trim();
    if let Some((start, end)) = input.split_once("..") {
        let start = start.parse::<i32>()
            .with_context(|| format!("Invalid range start in {:?}", input))?;
        let end = end.parse::<i32>()
            .with_context(|| format!("Invalid range end in {:?}", input))?;
        if start > end {
            bail!("Invalid range {:?}: start is greater than end", input);
        }
        Ok((start ..= end).collect())
    } else {
        Ok(vec![input.parse::<i32>()
           .with_context(|| format!("Invalid index {:?}", input))?])
    }
}


/// Convert 1-based indices (negative ones count from the tail) to 0-based ones,
/// sorted and deduplicated. Out-of-range indices are dropped.
pub fn index_transform(v: Vec<i32>, len: usize) -> Vec<usize> {
    let mut ret = v.into_iter()
        .filter_map(|i| {
            if i < 0 {
                let i = len as i32 + i;
                (i >= 0).then_some(i as usize)
            } else if i > 0 && (i as usize) <= len {
                Some(i as usize - 1)
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    ret.sort();
    ret.dedup();
    ret
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_parse() {
        assert_eq!(range_parse("3").unwrap(), vec![3]);
        assert_eq!(range_parse("5..7").unwrap(), vec![5, 6, 7]);
        assert_eq!(range_parse("-2..-1").unwrap(), vec![-2, -1]);
        assert!(range_parse("-1..-2").is_err());
        assert!(range_parse("t").is_err());
    }

    #[test]
    fn test_index_transform() {
        assert_eq!(index_transform(vec![1, 2, 2, 8], 5), vec![0, 1]);
        assert_eq!(index_transform(vec![-1, -5, -6], 5), vec![0, 4]);
        assert_eq!(index_transform(vec![0], 5), Vec::<usize>::new());
    }
}
