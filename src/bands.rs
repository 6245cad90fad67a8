use log::info;


/// Bands with at least one sample strictly above and one strictly below the
/// Fermi energy, in ascending order.
///
/// Each item of `samples` holds the energies of one k-point, bands past its
/// length are treated as unsampled there.
pub fn crossing_bands<'a, I>(samples: I, nbands: usize, fermi_energy: f64) -> Vec<usize>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut above = vec![false; nbands];
    let mut below = vec![false; nbands];

    for energies in samples {
        for (band, &e) in energies.iter().take(nbands).enumerate() {
            if e > fermi_energy {
                above[band] = true;
            } else if e < fermi_energy {
                below[band] = true;
            }
        }
    }

    let ret = (0 .. nbands)
        .filter(|&b| above[b] && below[b])
        .collect::<Vec<_>>();
    info!("{} of {} bands cross the Fermi level: {:?}", ret.len(), nbands,
          ret.iter().map(|b| b + 1).collect::<Vec<_>>());
    ret
}


const PALETTE: [[f32; 3]; 8] = [
    [0.894, 0.102, 0.110],
    [0.216, 0.494, 0.722],
    [0.302, 0.686, 0.290],
    [0.596, 0.306, 0.639],
    [1.000, 0.498, 0.000],
    [0.651, 0.337, 0.157],
    [0.969, 0.506, 0.749],
    [0.100, 0.700, 0.700],
];


/// Display colour (linear RGB) of a band, cycling through a fixed palette.
pub fn band_color(band: usize) -> [f32; 3] {
    PALETTE[band % PALETTE.len()]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_bands() {
        let samples = [vec![-1.0, 1.0], vec![0.5, 2.0], vec![2.0, 3.0]];
        let ret = crossing_bands(samples.iter().map(Vec::as_slice), 2, 0.0);
        assert_eq!(ret, vec![0]);
    }

    #[test]
    fn test_touching_is_not_crossing() {
        let samples = [vec![0.0, -1.0], vec![1.0, 0.0], vec![2.0, -2.0]];
        assert!(crossing_bands(samples.iter().map(Vec::as_slice), 2, 0.0).is_empty());
    }

    #[test]
    fn test_ragged_samples() {
        let samples = [vec![-1.0, -1.0, 4.0], vec![1.0], vec![1.0, -3.0, -4.0]];
        assert_eq!(crossing_bands(samples.iter().map(Vec::as_slice), 3, 0.0), vec![0, 2]);
        assert!(crossing_bands(samples.iter().map(Vec::as_slice), 0, 0.0).is_empty());
    }

    #[test]
    fn test_band_color() {
        assert_eq!(band_color(0), band_color(8));
        assert_ne!(band_color(0), band_color(1));
    }
}
