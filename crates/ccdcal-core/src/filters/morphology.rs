use ndarray::{s, Array2, Zip};

/// Binary dilation with a 3x3 square kernel. Out-of-bounds pixels are false.
pub fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    let mut result = mask.clone();

    for row in 0..h {
        let r0 = row.saturating_sub(1);
        let r1 = (row + 2).min(h);
        for col in 0..w {
            if result[[row, col]] {
                continue;
            }
            let c0 = col.saturating_sub(1);
            let c1 = (col + 2).min(w);
            result[[row, col]] = mask.slice(s![r0..r1, c0..c1]).iter().any(|&v| v);
        }
    }

    result
}

/// Seeds plus their 3x3 neighbours that are also set in `allowed`.
pub fn grow_into(seeds: &Array2<bool>, allowed: &Array2<bool>) -> Array2<bool> {
    let dilated = dilate(seeds);
    Zip::from(&dilated)
        .and(seeds)
        .and(allowed)
        .map_collect(|&d, &s, &a| s || (d && a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_only_where_allowed() {
        let mut seeds = Array2::from_elem((3, 3), false);
        seeds[[1, 1]] = true;
        let mut allowed = Array2::from_elem((3, 3), false);
        allowed[[0, 0]] = true;
        allowed[[2, 2]] = true;
        let grown = grow_into(&seeds, &allowed);
        assert_eq!(grown.iter().filter(|&&v| v).count(), 3);
        assert!(grown[[0, 0]] && grown[[1, 1]] && grown[[2, 2]]);
    }
}
