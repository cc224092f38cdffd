//! 数据检查.
//!
//! 宽松检查 ([`check_dataset`], [`check_batches`]) 只记录日志: 单个样本失败时写一条
//! `warn` 日志并继续, 结果汇总在 [`CheckReport`] 中. 严格检查 ([`validate_dataset`])
//! 在第一个错误处返回.

use crate::dataset::Dataset;
use crate::loader::Batch;
use crate::{DataError, Result};

/// 宽松检查的结果.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CheckReport {
    /// 检查过的项数.
    pub checked: usize,

    /// 失败项的描述 (病人名或批次序号).
    pub failures: Vec<String>,
}

impl CheckReport {
    /// 是否全部通过?
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// 合并另一份报告.
    pub fn merge(&mut self, other: CheckReport) {
        self.checked += other.checked;
        self.failures.extend(other.failures);
    }
}

/// 遍历数据集一次, 记录每个样本的形状. 失败的样本只记录日志.
pub fn check_dataset<D: Dataset>(label: &str, dataset: &D) -> CheckReport {
    let mut report = CheckReport::default();
    for index in 0..dataset.len() {
        let patient = dataset.patient(index).unwrap_or_default();
        report.checked += 1;
        match dataset.get(index).and_then(|s| s.check_aligned().map(|()| s)) {
            Ok(s) => log::info!(
                "{label} {index} ({patient}): image {:?}, label {:?}",
                s.image.shape(),
                s.label.shape()
            ),
            Err(e) => {
                log::warn!("check data error! Check the input data: {patient} ({e})");
                report.failures.push(patient);
            }
        }
    }
    log::info!(
        "{label}: checked {}, {} failures",
        report.checked,
        report.failures.len()
    );
    report
}

/// 依次检查训练集和验证集.
pub fn check_volumes<D: Dataset>(train: &D, val: &D) -> CheckReport {
    let mut report = check_dataset("train", train);
    report.merge(check_dataset("val", val));
    report
}

/// 遍历批次一次, 记录每个批次的形状. 失败的批次以序号记录.
pub fn check_batches<I>(label: &str, batches: I) -> CheckReport
where
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut report = CheckReport::default();
    for (index, batch) in batches.into_iter().enumerate() {
        report.checked += 1;
        match batch {
            Ok(b) => log::info!(
                "{label} batch {index}: image {:?}, label {:?}",
                b.image.shape(),
                b.label.shape()
            ),
            Err(e) => {
                log::warn!("check data error! {label} batch {index}: {e}");
                report.failures.push(index.to_string());
            }
        }
    }
    report
}

/// 严格检查: 遇到第一个无法加载或 image/label 形状不一致的样本时返回 `Err`.
/// 成功时返回样本数.
pub fn validate_dataset<D: Dataset>(dataset: &D) -> Result<usize> {
    for index in 0..dataset.len() {
        let sample = dataset.get(index)?;
        if !sample.is_aligned() {
            log::error!(
                "image/label shape mismatch: {}",
                dataset.patient(index).unwrap_or_default()
            );
            return Err(DataError::ShapeMismatch {
                left: sample.image.shape().to_vec(),
                right: sample.label.shape().to_vec(),
            });
        }
    }
    Ok(dataset.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::paths::{list_pairs, PairLayout};
    use crate::dataset::VolumeDataset;
    use crate::loader::{DataLoader, LoaderOptions};
    use crate::testing::{self, ramp_sample, MemoryDataset};
    use crate::transforms::{volume_transforms, Normalize};
    use std::sync::Arc;

    #[test]
    fn test_corrupt_entry_reported_once() {
        testing::init_logger();
        let root = tempfile::tempdir().unwrap();
        testing::write_patient(root.path(), "p1", (4, 4, 3));
        testing::write_corrupt_patient(root.path(), "p2", (4, 4, 3));
        testing::write_patient(root.path(), "p3", (4, 4, 5));
        let pairs = list_pairs(root.path(), &PairLayout::default()).unwrap();
        let pipeline = Arc::new(volume_transforms(
            Normalize::ZScore,
            &[Some(4), Some(4), None],
            &[Some(4), Some(4), None],
        ));
        let ds = VolumeDataset::new(pairs, pipeline);

        let report = check_dataset("train", &ds);
        assert_eq!(report.checked, 3);
        assert_eq!(report.failures, ["p2"]);
        assert!(!report.is_ok());

        assert!(validate_dataset(&ds).is_err());
    }

    #[test]
    fn test_mismatch_is_a_failure() {
        let mut bad = ramp_sample((2, 2, 2));
        bad.label = ramp_sample((2, 2, 3)).label;
        let ds = MemoryDataset::new([ramp_sample((2, 2, 2)), bad]);

        let report = check_volumes(&ds, &MemoryDataset::new([]));
        assert_eq!(report.checked, 2);
        assert_eq!(report.failures, ["m1"]);
        assert!(matches!(
            validate_dataset(&ds),
            Err(DataError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_ok() {
        let ds = MemoryDataset::new((0..3).map(|_| ramp_sample((2, 2, 2))));
        assert_eq!(validate_dataset(&ds).unwrap(), 3);
        assert!(check_dataset("val", &ds).is_ok());
    }

    #[test]
    fn test_check_batches() {
        let mut ds = MemoryDataset::new((0..3).map(|_| ramp_sample((2, 2, 2))));
        ds.items[1] = None;
        let loader = DataLoader::new(ds, LoaderOptions::new(1, 0, true)).unwrap();
        let report = check_batches("train", &loader);
        assert_eq!(report.checked, 3);
        assert_eq!(report.failures, ["1"]);
    }
}
