//! Estimation observations and the grid that accumulates them.

use serde::Serialize;

/// One executed case: the optimizer's estimate against the real row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstResult {
    /// Estimated row count of the plan's root operator.
    pub est_cnt: f64,
    /// Actual row count produced by the root operator.
    pub act_cnt: f64,
    /// Version of the instance that produced the plan.
    pub version: String,
}

impl EstResult {
    /// Builds an observation.
    pub fn new(est_cnt: f64, act_cnt: f64, version: impl Into<String>) -> Self {
        Self {
            est_cnt,
            act_cnt,
            version: version.into(),
        }
    }

    // Counts below one are clamped so empty results do not divide by zero.
    fn clamped(&self) -> (f64, f64) {
        (self.est_cnt.max(1.0), self.act_cnt.max(1.0))
    }

    /// `max(est/act, act/est)`; exactly 1 for a perfect estimate.
    pub fn q_error(&self) -> f64 {
        let (est, act) = self.clamped();
        if est >= act {
            est / act
        } else {
            act / est
        }
    }

    /// Signed relative error: positive when over-estimating, negative when
    /// under-estimating, zero for a perfect estimate.
    pub fn p_error(&self) -> f64 {
        let (est, act) = self.clamped();
        if est >= act {
            est / act - 1.0
        } else {
            -(act / est - 1.0)
        }
    }
}

/// Observations of a single instance: one cell per (dataset, query type).
///
/// A partition is owned by exactly one worker while the run is in flight,
/// which is what makes its appends safe without locking.
#[derive(Debug, Clone)]
pub struct CollectorPartition {
    instance_idx: usize,
    n_datasets: usize,
    n_query_types: usize,
    cells: Vec<Vec<EstResult>>,
}

impl CollectorPartition {
    /// An empty partition for `instance_idx`.
    pub fn new(instance_idx: usize, n_datasets: usize, n_query_types: usize) -> Self {
        Self {
            instance_idx,
            n_datasets,
            n_query_types,
            cells: vec![Vec::new(); n_datasets * n_query_types],
        }
    }

    /// Instance index this partition belongs to.
    pub fn instance_idx(&self) -> usize {
        self.instance_idx
    }

    fn slot(&self, dataset_idx: usize, query_type_idx: usize) -> usize {
        assert!(
            dataset_idx < self.n_datasets && query_type_idx < self.n_query_types,
            "collector index out of range: instance={} dataset={dataset_idx}/{} query_type={query_type_idx}/{}",
            self.instance_idx,
            self.n_datasets,
            self.n_query_types,
        );
        dataset_idx * self.n_query_types + query_type_idx
    }

    /// Appends an observation. Panics when an index is out of range.
    pub fn add(&mut self, dataset_idx: usize, query_type_idx: usize, result: EstResult) {
        let slot = self.slot(dataset_idx, query_type_idx);
        self.cells[slot].push(result);
    }

    /// Observations of one cell, in append order.
    pub fn results(&self, dataset_idx: usize, query_type_idx: usize) -> &[EstResult] {
        &self.cells[self.slot(dataset_idx, query_type_idx)]
    }

    /// Total observations across all cells of this partition.
    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    /// Whether the partition holds no observation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Three-dimensional grid of observations addressed by
/// (instance, dataset, query type). Cells only ever grow.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    n_datasets: usize,
    n_query_types: usize,
    partitions: Vec<CollectorPartition>,
}

impl ResultCollector {
    /// Allocates every cell up front; the dimensions never change afterwards.
    pub fn new(n_instances: usize, n_datasets: usize, n_query_types: usize) -> Self {
        Self {
            n_datasets,
            n_query_types,
            partitions: (0..n_instances)
                .map(|idx| CollectorPartition::new(idx, n_datasets, n_query_types))
                .collect(),
        }
    }

    /// `(instances, datasets, query types)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.partitions.len(), self.n_datasets, self.n_query_types)
    }

    fn partition(&self, instance_idx: usize) -> &CollectorPartition {
        assert!(
            instance_idx < self.partitions.len(),
            "collector instance index {instance_idx} out of range ({})",
            self.partitions.len()
        );
        &self.partitions[instance_idx]
    }

    /// Appends an observation. Panics when an index is out of range.
    pub fn add(
        &mut self,
        instance_idx: usize,
        dataset_idx: usize,
        query_type_idx: usize,
        result: EstResult,
    ) {
        let n_instances = self.partitions.len();
        assert!(
            instance_idx < n_instances,
            "collector instance index {instance_idx} out of range ({n_instances})"
        );
        self.partitions[instance_idx].add(dataset_idx, query_type_idx, result);
    }

    /// Observations of one cell, in append order.
    pub fn results(
        &self,
        instance_idx: usize,
        dataset_idx: usize,
        query_type_idx: usize,
    ) -> &[EstResult] {
        self.partition(instance_idx)
            .results(dataset_idx, query_type_idx)
    }

    /// Every cell with its index, instance-major.
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize, usize), &[EstResult])> + '_ {
        self.partitions.iter().flat_map(move |part| {
            (0..self.n_datasets).flat_map(move |d| {
                (0..self.n_query_types)
                    .map(move |q| ((part.instance_idx, d, q), part.results(d, q)))
            })
        })
    }

    /// Observations across the whole grid.
    pub fn total(&self) -> usize {
        self.partitions.iter().map(CollectorPartition::len).sum()
    }

    /// Splits the grid into one owned partition per instance.
    pub fn into_partitions(self) -> Vec<CollectorPartition> {
        self.partitions
    }

    /// Reassembles partitions produced by [`ResultCollector::into_partitions`].
    ///
    /// Panics when partitions are missing, duplicated or shaped differently.
    pub fn from_partitions(mut partitions: Vec<CollectorPartition>) -> Self {
        partitions.sort_by_key(CollectorPartition::instance_idx);
        let (n_datasets, n_query_types) = partitions
            .first()
            .map(|p| (p.n_datasets, p.n_query_types))
            .unwrap_or((0, 0));
        for (idx, part) in partitions.iter().enumerate() {
            assert_eq!(part.instance_idx, idx, "collector partitions are not contiguous");
            assert_eq!(
                (part.n_datasets, part.n_query_types),
                (n_datasets, n_query_types),
                "collector partitions disagree on dimensions"
            );
        }
        Self {
            n_datasets,
            n_query_types,
            partitions,
        }
    }
}
