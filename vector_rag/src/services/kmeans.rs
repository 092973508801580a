use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

/// Seeded Lloyd's k-means with k-means++ initialisation (euclidean distance)
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iter: usize,
    tol: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster label per input point. Labels are numbered by first appearance.
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub iterations: usize,
}

impl KMeansResult {
    pub fn num_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Point indices of one cluster, in input order
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn with_tolerance(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Cluster `points` into at most `k` groups.
    ///
    /// `k` is clamped to the number of points. Clusters that end up empty are
    /// dropped, so fewer than `k` clusters may come back for duplicate-heavy input.
    pub fn fit(&self, points: &[&[f32]]) -> KMeansResult {
        let n = points.len();
        let k = self.k.min(n);
        if n == 0 || k == 0 {
            return KMeansResult {
                assignments: Vec::new(),
                centroids: Vec::new(),
                iterations: 0,
            };
        }

        let dim = points[0].len();
        let data = Array2::from_shape_fn((n, dim), |(i, j)| points[i].get(j).copied().unwrap_or(0.0));

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_plus_plus(&data, k, &mut rng);
        let mut assignments = assign(&data, &centroids);
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;

            let updated = update_centroids(&data, &mut assignments, &centroids);
            let shift: f32 = (&updated - &centroids).mapv(|x| x * x).sum();
            centroids = updated;
            assignments = assign(&data, &centroids);

            if shift <= self.tol {
                break;
            }
        }

        compact(assignments, &centroids, iterations)
    }
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid per row, ties to the lower centroid index
fn assign(data: &Array2<f32>, centroids: &Array2<f32>) -> Vec<usize> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut best = 0;
            let mut best_dist = f32::INFINITY;
            for (c, centroid) in centroids.outer_iter().enumerate() {
                let dist = squared_distance(row, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            best
        })
        .collect()
}

fn init_plus_plus(data: &Array2<f32>, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let n = data.nrows();
    let mut chosen = vec![rng.gen_range(0..n)];
    let mut nearest: Vec<f32> = (0..n)
        .map(|i| squared_distance(data.row(i), data.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f32 = nearest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f32>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &d) in nearest.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative >= target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        // Every point coincides with a chosen centroid: take the next unused row
        let next = match next {
            Some(i) => i,
            None => match (0..n).find(|i| !chosen.contains(i)) {
                Some(i) => i,
                None => break,
            },
        };

        chosen.push(next);
        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(squared_distance(data.row(i), data.row(next)));
        }
    }

    data.select(Axis(0), &chosen)
}

/// Mean of each cluster's members. An empty cluster takes over the point
/// farthest from its own centroid, drawn from clusters with more than one member.
fn update_centroids(data: &Array2<f32>, assignments: &mut [usize], centroids: &Array2<f32>) -> Array2<f32> {
    let k = centroids.nrows();
    let mut sums = Array2::<f32>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; k];

    for (i, &label) in assignments.iter().enumerate() {
        sums.row_mut(label).scaled_add(1.0, &data.row(i));
        counts[label] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }

        let farthest = assignments
            .iter()
            .enumerate()
            .filter(|(_, &label)| counts[label] > 1)
            .map(|(i, &label)| (i, squared_distance(data.row(i), centroids.row(label))))
            .fold(None, |best: Option<(usize, f32)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        if let Some((point, _)) = farthest {
            let old = assignments[point];
            sums.row_mut(old).scaled_add(-1.0, &data.row(point));
            counts[old] -= 1;
            sums.row_mut(empty).assign(&data.row(point));
            counts[empty] = 1;
            assignments[point] = empty;
        }
    }

    let mut updated = centroids.clone();
    for (c, count) in counts.iter().enumerate() {
        if *count > 0 {
            let mean: Array1<f32> = sums.row(c).mapv(|x| x / *count as f32);
            updated.row_mut(c).assign(&mean);
        }
    }
    updated
}

/// Drop empty clusters and renumber labels by first appearance
fn compact(assignments: Vec<usize>, centroids: &Array2<f32>, iterations: usize) -> KMeansResult {
    let mut relabel: Vec<Option<usize>> = vec![None; centroids.nrows()];
    let mut order = Vec::new();

    let assignments = assignments
        .into_iter()
        .map(|label| {
            *relabel[label].get_or_insert_with(|| {
                order.push(label);
                order.len() - 1
            })
        })
        .collect();

    KMeansResult {
        assignments,
        centroids: order.iter().map(|&c| centroids.row(c).to_vec()).collect(),
        iterations,
    }
}
