//! Partition assignments: splitting a router set into host-sized parts.
//!
//! A partition is an ordered list of disjoint node sets. The last set is the
//! overflow part: every link that crosses between two other parts must end
//! in it. On disk it is a JSON array of integer arrays (`partition.json`).

pub mod range;
pub mod separator;
pub mod validate;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TopoError};
use crate::topology::Graph;

pub use range::RangePartitioner;
pub use separator::SeparatorPartitioner;
pub use validate::{check_coverage, check_cut, CoverageReport};

/// File name of a persisted partition inside a topology directory
pub const PARTITION_FILE: &str = "partition.json";

/// Ordered node sets, the last one being the overflow part.
///
/// Values are kept as read so that validation can report ids outside
/// `[1, N]` instead of failing to load them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    parts: Vec<Vec<i64>>,
}

impl Partition {
    pub fn new(parts: Vec<Vec<i64>>) -> Self {
        Self { parts }
    }

    /// Build from node ids; `overflow` is appended as the last part.
    pub fn from_nodes(parts: Vec<Vec<u32>>, overflow: Vec<u32>) -> Self {
        let widen = |part: Vec<u32>| part.into_iter().map(i64::from).collect::<Vec<_>>();
        let mut rows: Vec<Vec<i64>> = parts.into_iter().map(widen).collect();
        rows.push(widen(overflow));
        Self { parts: rows }
    }

    pub fn parts(&self) -> &[Vec<i64>] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Index of the overflow part
    pub fn overflow_index(&self) -> Option<usize> {
        self.parts.len().checked_sub(1)
    }

    pub fn overflow(&self) -> &[i64] {
        self.parts.last().map_or(&[], Vec::as_slice)
    }

    /// Every part except the overflow part
    pub fn regular_parts(&self) -> &[Vec<i64>] {
        match self.overflow_index() {
            Some(last) => &self.parts[..last],
            None => &[],
        }
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.parts.iter().map(Vec::len).collect()
    }
}

/// A strategy that splits a graph's nodes into `parts` regular parts plus
/// the overflow part.
pub trait Partitioner {
    fn partition(&self, graph: &Graph, parts: u32) -> Result<Partition>;
}

/// Read a partition file, reporting the position of the first malformed
/// element.
pub fn load_partition(path: &Path) -> Result<Partition> {
    let text = fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&text)?;
    let rows = data
        .as_array()
        .ok_or_else(|| TopoError::InvalidPartitionFile("top-level JSON must be an array".into()))?;

    let mut parts = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let items = row
            .as_array()
            .ok_or_else(|| TopoError::InvalidPartitionFile(format!("element {i} is not an array")))?;
        let mut part = Vec::with_capacity(items.len());
        for (j, item) in items.iter().enumerate() {
            let value = item.as_i64().ok_or_else(|| {
                TopoError::InvalidPartitionFile(format!(
                    "item {j} of subarray {i} is not an integer: {item}"
                ))
            })?;
            part.push(value);
        }
        parts.push(part);
    }
    Ok(Partition::new(parts))
}

/// Write `partition.json` into `dir`, creating the directory if needed.
pub fn save_partition(dir: &Path, partition: &Partition) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(PARTITION_FILE);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, partition)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("Partition file written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    fn load_text(text: &str) -> Result<Partition> {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{text}").unwrap();
        load_partition(file.path())
    }

    #[test]
    fn test_overflow_is_last() {
        let p = Partition::from_nodes(vec![vec![1, 2], vec![3]], vec![4, 5]);
        assert_eq!(p.len(), 3);
        assert_eq!(p.overflow(), &[4, 5]);
        assert_eq!(p.regular_parts().len(), 2);
        assert_eq!(p.sizes(), vec![2, 1, 2]);
        assert!(Partition::default().regular_parts().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested");
        let p = Partition::from_nodes(vec![vec![1, 2]], vec![3]);
        save_partition(&out, &p).unwrap();
        assert_eq!(load_partition(&out.join(PARTITION_FILE)).unwrap(), p);
    }

    #[test]
    fn test_load_keeps_out_of_range_values() {
        let p = load_text("[[1, -2], [0], []]").unwrap();
        assert_eq!(p.parts(), &[vec![1, -2], vec![0], vec![]]);
    }

    #[test]
    fn test_load_reports_position() {
        let err = load_text("{\"a\": 1}").unwrap_err();
        assert!(matches!(err, TopoError::InvalidPartitionFile(_)));

        let err = load_text("[[1], 2]").unwrap_err().to_string();
        assert!(err.contains("element 1"), "{err}");

        let err = load_text("[[1], [2, \"x\"]]").unwrap_err().to_string();
        assert!(err.contains("item 1 of subarray 1"), "{err}");

        let err = load_text("[[1.5]]").unwrap_err().to_string();
        assert!(err.contains("item 0 of subarray 0"), "{err}");
    }
}
