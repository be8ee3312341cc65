use crate::domain::Report;

/// A contiguous run of reports dispatched to one worker.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Dispatch index, unique across a whole run
    pub seq: usize,
    pub reports: Vec<Report>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Split `records` into batches of `batch_size`, numbering them from zero.
pub fn partition(records: Vec<Report>, batch_size: usize) -> Vec<Batch> {
    partition_from(records, batch_size, 0)
}

/// Split `records` into batches of `batch_size`, numbering them from `first_seq`.
///
/// The last batch carries the remainder. A `batch_size` of zero is treated as one.
pub fn partition_from(records: Vec<Report>, batch_size: usize, first_seq: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut records = records.into_iter();

    loop {
        let reports: Vec<Report> = records.by_ref().take(batch_size).collect();
        if reports.is_empty() {
            break;
        }
        batches.push(Batch {
            seq: first_seq + batches.len(),
            reports,
        });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;

    fn sizes(batches: &[Batch]) -> Vec<usize> {
        batches.iter().map(Batch::len).collect()
    }

    #[test]
    fn test_partition_with_remainder() {
        let batches = partition(generate(2500), 1000);
        assert_eq!(sizes(&batches), vec![1000, 1000, 500]);
    }

    #[test]
    fn test_partition_exact_multiple() {
        let batches = partition(generate(3000), 1000);
        assert_eq!(sizes(&batches), vec![1000, 1000, 1000]);
    }

    #[test]
    fn test_partition_empty_input() {
        assert!(partition(Vec::new(), 1000).is_empty());
    }

    #[test]
    fn test_partition_preserves_order() {
        let records = generate(23);
        let expected: Vec<String> = records.iter().map(|r| r.transaction_id.clone()).collect();

        let batches = partition(records, 5);
        let flattened: Vec<String> = batches
            .iter()
            .flat_map(|b| b.reports.iter().map(|r| r.transaction_id.clone()))
            .collect();

        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_partition_counts_for_many_sizes() {
        for n in [0usize, 1, 2, 7, 64, 99, 100, 101] {
            for b in [1usize, 2, 3, 10, 100, 500] {
                let batches = partition(generate(n), b);
                assert_eq!(batches.len(), n.div_ceil(b), "n={} b={}", n, b);
                assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), n);
                if let Some((last, rest)) = batches.split_last() {
                    assert!(rest.iter().all(|batch| batch.len() == b));
                    assert!((1..=b).contains(&last.len()));
                }
            }
        }
    }

    #[test]
    fn test_partition_from_numbers_sequentially() {
        let batches = partition_from(generate(25), 10, 40);
        let seqs: Vec<usize> = batches.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, vec![40, 41, 42]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let batches = partition(generate(3), 0);
        assert_eq!(sizes(&batches), vec![1, 1, 1]);
    }
}
