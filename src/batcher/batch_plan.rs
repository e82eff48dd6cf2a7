use crate::error::{FitBatchError, Result};

/// Ordered split of a list into groups of at most `batch_size` items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan<T> {
    batch_size: usize,
    batches: Vec<Vec<T>>,
}

impl<T: Clone> BatchPlan<T> {
    pub fn build(items: &[T], batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(FitBatchError::Config {
                message: "batch_size must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            batch_size,
            batches: items.chunks(batch_size).map(|chunk| chunk.to_vec()).collect(),
        })
    }
}

impl<T> BatchPlan<T> {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn total_items(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches(&self) -> &[Vec<T>] {
        &self.batches
    }

    /// Pairs each batch with its folder name.
    pub fn named_batches<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (String, &'a [T])> + 'a {
        let total = self.batches.len();
        self.batches
            .iter()
            .enumerate()
            .map(move |(index, batch)| (batch_folder_name(prefix, index, total), batch.as_slice()))
    }
}

/// `batch_001`, `batch_002`, ... for a zero-based `index`. The counter is at
/// least three digits wide and grows when `total` needs more.
pub fn batch_folder_name(prefix: &str, index: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("{}_{:0width$}", prefix, index + 1, width = width)
}
