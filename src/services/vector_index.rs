use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AdvisorError, Result};

const KMEANS_ITERATIONS: usize = 10;

/// One raw nearest-neighbor hit, before any similarity transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    pub id: i64,
    pub distance: f32,
}

/// Inverted-file structure built by the one-way clustering upgrade.
#[derive(Debug, Clone)]
struct InvertedLists {
    centroids: Array2<f32>,
    /// Row indices per centroid, in insertion order.
    lists: Vec<Vec<usize>>,
}

/// In-process index over cocktail embeddings.
///
/// Starts as an exact flat-L2 index. Once the row count passes the
/// clustering threshold the structure is upgraded to an inverted-file index:
/// rows are partitioned around `⌊√n⌋` centroids and searches probe only the
/// nearest lists. The upgrade happens once and is not reversible; results
/// afterwards are approximate nearest neighbors.
///
/// Insertion is append-only. Re-inserting an id creates a duplicate entry.
#[derive(Debug)]
pub struct CocktailVectorIndex {
    dimension: usize,
    clustering_threshold: Option<usize>,
    probe_count: usize,
    ids: Vec<i64>,
    vectors: Vec<f32>,
    inverted: Option<InvertedLists>,
}

/// Serializable index state for on-disk snapshots. The inverted-file
/// structure is not persisted; it is re-trained on load when `clustered` is
/// set (the training pass is deterministic).
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimension: usize,
    pub ids: Vec<i64>,
    pub vectors: Vec<f32>,
    pub clustered: bool,
}

impl CocktailVectorIndex {
    /// `clustering_threshold` of `None` keeps the index flat forever
    /// (non-production deployments).
    pub fn new(dimension: usize, clustering_threshold: Option<usize>, probe_count: usize) -> Self {
        Self {
            dimension,
            clustering_threshold,
            probe_count: probe_count.max(1),
            ids: Vec::new(),
            vectors: Vec::new(),
            inverted: None,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_clustered(&self) -> bool {
        self.inverted.is_some()
    }

    /// Append a batch of vectors. Row count must match the id count and the
    /// column count must match the configured dimension.
    pub fn insert(&mut self, ids: &[i64], vectors: ArrayView2<'_, f32>) -> Result<()> {
        if vectors.nrows() != ids.len() {
            return Err(AdvisorError::DimensionMismatch {
                expected: ids.len(),
                got: vectors.nrows(),
            });
        }
        if vectors.ncols() != self.dimension {
            return Err(AdvisorError::DimensionMismatch {
                expected: self.dimension,
                got: vectors.ncols(),
            });
        }

        for (id, row) in ids.iter().zip(vectors.rows()) {
            let row_index = self.ids.len();
            self.ids.push(*id);
            self.vectors.extend(row.iter());

            // Post-upgrade inserts join the nearest existing list; the
            // centroids are not retrained.
            if let Some(inverted) = &mut self.inverted {
                let list = nearest_centroid(&inverted.centroids, self.dimension, {
                    let start = row_index * self.dimension;
                    &self.vectors[start..start + self.dimension]
                });
                inverted.lists[list].push(row_index);
            }
        }

        self.maybe_upgrade();
        Ok(())
    }

    /// Exact (flat) or probed (clustered) nearest-neighbor search by
    /// Euclidean distance. Returns up to `k` hits in ascending distance,
    /// ties broken by insertion order.
    pub fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Vec<RawHit>> {
        if query.len() != self.dimension {
            return Err(AdvisorError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = query.to_vec();

        let mut hits: Vec<(usize, f32)> = match &self.inverted {
            None => (0..self.len())
                .map(|row| (row, euclidean(&query, self.row(row))))
                .collect(),
            Some(inverted) => {
                let probes = self.probed_lists(inverted, &query);
                probes
                    .iter()
                    .flat_map(|&list| inverted.lists[list].iter().copied())
                    .map(|row| (row, euclidean(&query, self.row(row))))
                    .collect()
            }
        };

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(row, distance)| RawHit {
                id: self.ids[row],
                distance,
            })
            .collect())
    }

    pub fn to_snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            dimension: self.dimension,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
            clustered: self.is_clustered(),
        }
    }

    pub fn from_snapshot(
        snapshot: IndexSnapshot,
        clustering_threshold: Option<usize>,
        probe_count: usize,
    ) -> Result<Self> {
        if snapshot.vectors.len() != snapshot.ids.len() * snapshot.dimension {
            return Err(AdvisorError::DimensionMismatch {
                expected: snapshot.ids.len() * snapshot.dimension,
                got: snapshot.vectors.len(),
            });
        }

        let mut index = Self {
            dimension: snapshot.dimension,
            clustering_threshold,
            probe_count: probe_count.max(1),
            ids: snapshot.ids,
            vectors: snapshot.vectors,
            inverted: None,
        };

        if snapshot.clustered && !index.is_empty() {
            index.train_inverted_lists();
        } else {
            index.maybe_upgrade();
        }

        Ok(index)
    }

    fn row(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    fn maybe_upgrade(&mut self) {
        if self.inverted.is_some() {
            return;
        }
        let Some(threshold) = self.clustering_threshold else {
            return;
        };
        if self.len() > threshold {
            info!(
                rows = self.len(),
                threshold, "upgrading flat index to inverted-file structure"
            );
            self.train_inverted_lists();
        }
    }

    /// Deterministic Lloyd's k-means over the current rows: centroids are
    /// seeded from evenly spaced rows, so training the same data always
    /// yields the same partition.
    fn train_inverted_lists(&mut self) {
        let n = self.len();
        let nlist = isqrt(n).max(1);

        let mut centroids = Array2::<f32>::zeros((nlist, self.dimension));
        for c in 0..nlist {
            let seed_row = c * n / nlist;
            centroids
                .row_mut(c)
                .iter_mut()
                .zip(self.row(seed_row))
                .for_each(|(dst, src)| *dst = *src);
        }

        let mut assignments = vec![0usize; n];
        for _ in 0..KMEANS_ITERATIONS {
            for (row, slot) in assignments.iter_mut().enumerate() {
                *slot = nearest_centroid(&centroids, self.dimension, self.row(row));
            }

            let mut sums = Array2::<f32>::zeros((nlist, self.dimension));
            let mut counts = vec![0usize; nlist];
            for (row, &list) in assignments.iter().enumerate() {
                counts[list] += 1;
                sums.row_mut(list)
                    .iter_mut()
                    .zip(self.row(row))
                    .for_each(|(dst, src)| *dst += *src);
            }

            for list in 0..nlist {
                // Empty clusters keep their previous centroid.
                if counts[list] == 0 {
                    continue;
                }
                let inv = 1.0 / counts[list] as f32;
                centroids
                    .row_mut(list)
                    .iter_mut()
                    .zip(sums.row(list))
                    .for_each(|(dst, src)| *dst = src * inv);
            }
        }

        let mut lists = vec![Vec::new(); nlist];
        for (row, slot) in assignments.iter_mut().enumerate() {
            *slot = nearest_centroid(&centroids, self.dimension, self.row(row));
            lists[*slot].push(row);
        }

        debug!(nlist, rows = n, "trained inverted lists");
        self.inverted = Some(InvertedLists { centroids, lists });
    }

    fn probed_lists(&self, inverted: &InvertedLists, query: &[f32]) -> Vec<usize> {
        let nlist = inverted.lists.len();
        let mut ranked: Vec<(usize, f32)> = (0..nlist)
            .map(|list| {
                let centroid = inverted.centroids.row(list);
                let centroid = centroid.as_slice().expect("centroid rows are contiguous");
                (list, euclidean(query, centroid))
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(self.probe_count.min(nlist));
        ranked.into_iter().map(|(list, _)| list).collect()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

fn nearest_centroid(centroids: &Array2<f32>, dimension: usize, vector: &[f32]) -> usize {
    debug_assert_eq!(centroids.ncols(), dimension);
    let mut best = 0usize;
    let mut best_distance = f32::INFINITY;
    for (list, centroid) in centroids.rows().into_iter().enumerate() {
        let centroid = centroid.as_slice().expect("centroid rows are contiguous");
        let distance = euclidean(vector, centroid);
        if distance < best_distance {
            best = list;
            best_distance = distance;
        }
    }
    best
}

fn isqrt(n: usize) -> usize {
    (n as f64).sqrt().floor() as usize
}
