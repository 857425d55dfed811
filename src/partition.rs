//! Deterministic range partition of band rows across logical workers.

use crate::util::CumsumExt;

/// Block partition of `n` entries over a fixed worker count.
///
/// Worker `r` owns `⌊n/P⌋` entries plus one extra if `r < n mod P`;
/// starting offsets are the exclusive prefix sum of the counts. The
/// same rule the MPI scripts use with `exscan`, so a band built with
/// any worker count maps rows to workers reproducibly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
  global_size: usize,
  counts: Vec<usize>,
  offsets: Vec<usize>,
}

impl Partition {
  pub fn block(n: usize, nworkers: usize) -> Self {
    assert!(nworkers > 0);
    let counts: Vec<usize> = (0..nworkers)
      .map(|rank| n / nworkers + usize::from(rank < n % nworkers))
      .collect();

    // exclusive scan
    let offsets: Vec<usize> = std::iter::once(0)
      .chain(counts.iter().copied().cumsum().take(nworkers - 1))
      .collect();

    Self {
      global_size: n,
      counts,
      offsets,
    }
  }

  pub fn global_size(&self) -> usize {
    self.global_size
  }
  pub fn nworkers(&self) -> usize {
    self.counts.len()
  }
  pub fn local_size(&self, rank: usize) -> usize {
    self.counts[rank]
  }
  pub fn offset(&self, rank: usize) -> usize {
    self.offsets[rank]
  }
  pub fn local_range(&self, rank: usize) -> std::ops::Range<usize> {
    self.offsets[rank]..self.offsets[rank] + self.counts[rank]
  }

  /// Worker owning a given global row.
  pub fn owner(&self, row: usize) -> usize {
    assert!(row < self.global_size);
    match self.offsets.binary_search(&row) {
      Ok(rank) => {
        // empty ranks share an offset with their successor; skip them
        (rank..self.nworkers())
          .find(|&r| self.counts[r] > 0)
          .unwrap()
      }
      Err(rank) => rank - 1,
    }
  }
}
