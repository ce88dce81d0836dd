use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Neighbourhood rule for joining foreground pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Pixels touching by an edge.
    Four,
    /// Pixels touching by an edge or a corner.
    #[default]
    Eight,
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Four => write!(f, "4-connected"),
            Connectivity::Eight => write!(f, "8-connected"),
        }
    }
}

/// One connected group of foreground pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// 1-based label, assigned in raster order of each component's first pixel.
    pub label: u32,
    /// Member pixels as (row, col), raster order.
    pub pixels: Vec<(usize, usize)>,
    /// Number of pixels in the component.
    pub area: usize,
    /// Bounding box: (min_row, max_row, min_col, max_col).
    pub bbox: (usize, usize, usize, usize),
}

impl Component {
    /// Unweighted centroid as (row, col).
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.area.max(1) as f64;
        let (sum_row, sum_col) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(r, c), &(row, col)| (r + row as f64, c + col as f64));
        (sum_row / n, sum_col / n)
    }
}

/// Label connected foreground pixels using two-pass union-find.
///
/// Components are returned ordered by label. Labels and pixel lists depend
/// only on the mask contents, never on traversal order.
pub fn connected_components(mask: &Array2<bool>, connectivity: Connectivity) -> Vec<Component> {
    let (h, w) = mask.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    let mut labels = Array2::<u32>::zeros((h, w));
    let mut next_label: u32 = 1;
    // Union-find parent array. Index 0 unused; labels start at 1.
    let mut parent: Vec<u32> = vec![0; h * w / 2 + 2];

    // Pass 1: assign provisional labels from already-visited neighbours.
    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }

            let mut current = 0u32;
            for (nr, nc) in previous_neighbours(row, col, w, connectivity) {
                let lbl = labels[[nr, nc]];
                if lbl == 0 {
                    continue;
                }
                if current == 0 {
                    current = lbl;
                } else if lbl != current {
                    union(&mut parent, current, lbl);
                    current = current.min(lbl);
                }
            }

            if current == 0 {
                if next_label as usize >= parent.len() {
                    parent.resize(parent.len() * 2, 0);
                }
                parent[next_label as usize] = next_label;
                current = next_label;
                next_label += 1;
            }
            labels[[row, col]] = current;
        }
    }

    // Pass 2: resolve roots and collect pixels. The first time a root is
    // seen in raster order fixes its final label.
    let mut final_label = vec![0u32; next_label as usize];
    let mut components: Vec<Component> = Vec::new();

    for row in 0..h {
        for col in 0..w {
            let lbl = labels[[row, col]];
            if lbl == 0 {
                continue;
            }
            let root = find(&parent, lbl) as usize;
            if final_label[root] == 0 {
                components.push(Component {
                    label: components.len() as u32 + 1,
                    pixels: Vec::new(),
                    area: 0,
                    bbox: (row, row, col, col),
                });
                final_label[root] = components.len() as u32;
            }

            let entry = &mut components[final_label[root] as usize - 1];
            entry.pixels.push((row, col));
            entry.area += 1;
            entry.bbox.0 = entry.bbox.0.min(row);
            entry.bbox.1 = entry.bbox.1.max(row);
            entry.bbox.2 = entry.bbox.2.min(col);
            entry.bbox.3 = entry.bbox.3.max(col);
        }
    }

    components
}

/// Threshold an image and label the foreground, dropping components smaller
/// than `min_pixels`. Surviving components are relabelled 1..n.
pub fn detect_sources(
    image: &Array2<f64>,
    threshold: f64,
    min_pixels: usize,
    connectivity: Connectivity,
) -> Vec<Component> {
    let foreground = image.mapv(|v| v > threshold);
    connected_components(&foreground, connectivity)
        .into_iter()
        .filter(|c| c.area >= min_pixels)
        .enumerate()
        .map(|(i, mut c)| {
            c.label = i as u32 + 1;
            c
        })
        .collect()
}

/// Neighbours that precede (row, col) in raster order.
fn previous_neighbours(
    row: usize,
    col: usize,
    width: usize,
    connectivity: Connectivity,
) -> impl Iterator<Item = (usize, usize)> {
    let mut out: [Option<(usize, usize)>; 4] = [None; 4];
    if col > 0 {
        out[0] = Some((row, col - 1));
    }
    if row > 0 {
        out[1] = Some((row - 1, col));
        if connectivity == Connectivity::Eight {
            if col > 0 {
                out[2] = Some((row - 1, col - 1));
            }
            if col + 1 < width {
                out[3] = Some((row - 1, col + 1));
            }
        }
    }
    out.into_iter().flatten()
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Merge larger root into smaller root to keep labels consistent.
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}
