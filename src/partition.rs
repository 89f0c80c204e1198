use crate::bucketer::MAX_TRAFFIC_VALUE;

/// A single entry of a [`TrafficPartition`]: bucket values below `end_of_range` (and not claimed
/// by an earlier entry) go to `variation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub end_of_range: u32,
    /// Index into the owning experiment's variations.
    pub variation: usize,
}

/// Ordered, cumulative division of the bucketing range between variations.
///
/// Bounds are non-decreasing and never exceed [`MAX_TRAFFIC_VALUE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TrafficPartition {
    allocations: Box<[Allocation]>,
}

impl TrafficPartition {
    /// Build a partition from `(end_of_range, variation)` pairs in configuration order.
    ///
    /// An entry whose bound is lower than a previous one can never be selected by a first-match
    /// scan, so its bound is raised to the previous one. Bounds above [`MAX_TRAFFIC_VALUE`] are
    /// clamped. Neither adjustment changes which variation a valid bucket value resolves to.
    pub fn new(allocations: impl IntoIterator<Item = (u32, usize)>) -> TrafficPartition {
        let mut floor = 0;
        let allocations = allocations
            .into_iter()
            .map(|(end_of_range, variation)| {
                let clamped = end_of_range.clamp(floor, MAX_TRAFFIC_VALUE);
                if clamped != end_of_range {
                    log::warn!(target: "optimizely",
                               end_of_range,
                               adjusted = clamped;
                               "traffic allocation bound out of order or out of range");
                }
                floor = clamped;
                Allocation {
                    end_of_range: clamped,
                    variation,
                }
            })
            .collect();
        TrafficPartition { allocations }
    }

    /// Return the variation index for `bucket_value`, or `None` if the value falls past the last
    /// bound (the user is excluded from the experiment).
    pub fn find(&self, bucket_value: u32) -> Option<usize> {
        self.allocations
            .iter()
            .find(|allocation| bucket_value < allocation.end_of_range)
            .map(|allocation| allocation.variation)
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }
}
