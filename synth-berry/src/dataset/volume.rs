//! 惰性体数据集: 每次访问时才加载并处理对应的路径对.

use std::sync::Arc;

use crate::dataset::manifest::{patient_records, ManifestPaths};
use crate::dataset::{Dataset, SamplePair};
use crate::diagnostics;
use crate::transforms::Pipeline;
use crate::{DataError, Result, Sample};

/// 由路径对和共享流水线组成的惰性数据集. 不缓存任何处理结果.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    pairs: Vec<SamplePair>,
    pipeline: Arc<Pipeline>,
}

impl VolumeDataset {
    /// 直接初始化.
    #[inline]
    pub fn new(pairs: Vec<SamplePair>, pipeline: Arc<Pipeline>) -> Self {
        Self { pairs, pipeline }
    }

    /// 全部路径对.
    #[inline]
    pub fn pairs(&self) -> &[SamplePair] {
        &self.pairs
    }

    /// 共享的流水线.
    #[inline]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

impl Dataset for VolumeDataset {
    #[inline]
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let pair = self.pairs.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.pairs.len(),
        })?;
        self.pipeline.run_pair(pair)
    }

    fn patient(&self, index: usize) -> Option<String> {
        self.pairs.get(index).map(SamplePair::patient_name)
    }
}

/// 用同一条流水线构造训练集和验证集.
///
/// `manifests` 非空时写出两个只含病人名的 manifest. `check` 为真时对两个数据集
/// 各做一次宽松检查, 检查失败只记录日志, 不返回错误.
pub fn load_volumes(
    pipeline: &Arc<Pipeline>,
    train: Vec<SamplePair>,
    val: Vec<SamplePair>,
    manifests: Option<&ManifestPaths>,
    check: bool,
) -> Result<(VolumeDataset, VolumeDataset)> {
    if let Some(paths) = manifests {
        paths.write(&patient_records(&train), &patient_records(&val))?;
    }
    let train_ds = VolumeDataset::new(train, Arc::clone(pipeline));
    let val_ds = VolumeDataset::new(val, Arc::clone(pipeline));
    log::info!("transforms: {pipeline}");

    if check {
        diagnostics::check_volumes(&train_ds, &val_ds);
    }
    Ok((train_ds, val_ds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::paths::{list_pairs, PairLayout};
    use crate::testing;
    use crate::transforms::{volume_transforms, Normalize};
    use std::fs;

    fn pipeline() -> Arc<Pipeline> {
        Arc::new(volume_transforms(
            Normalize::ZScore,
            &[Some(8), Some(6), None],
            &[Some(4), Some(4), None],
        ))
    }

    #[test]
    fn test_lazy_get() {
        let root = tempfile::tempdir().unwrap();
        testing::write_patient(root.path(), "p1", (5, 7, 3));
        testing::write_patient(root.path(), "p2", (9, 4, 6));
        let pairs = list_pairs(root.path(), &PairLayout::default()).unwrap();
        let ds = VolumeDataset::new(pairs, pipeline());

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.patient(1).as_deref(), Some("p2"));
        assert_eq!(ds.patient(2), None);

        // (W, H, D) -> 通道优先 -> (8, 6, D) -> 旋转 -> (6, 8, D) -> 整除 4 -> (8, 8, D).
        let s = ds.get(0).unwrap();
        assert_eq!(s.image.shape(), &[1, 8, 8, 3]);
        assert!(s.is_aligned());
        let s = ds.get(1).unwrap();
        assert_eq!(s.label.shape(), &[1, 8, 8, 6]);

        // 两次访问得到相同的结果.
        assert_eq!(ds.get(1).unwrap(), s);

        assert!(matches!(
            ds.get(2),
            Err(DataError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_missing_file_surfaces_on_get() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("empty")).unwrap();
        let pairs = list_pairs(root.path(), &PairLayout::default()).unwrap();
        let ds = VolumeDataset::new(pairs, pipeline());
        assert_eq!(ds.len(), 1);
        assert!(ds.get(0).is_err());
    }

    #[test]
    fn test_load_volumes_writes_manifests() {
        testing::init_logger();
        let root = tempfile::tempdir().unwrap();
        for name in ["p1", "p2", "p3"] {
            testing::write_patient(root.path(), name, (4, 4, 2));
        }
        let pairs = list_pairs(root.path(), &PairLayout::default()).unwrap();
        let out = tempfile::tempdir().unwrap();
        let manifests = ManifestPaths {
            train: out.path().join("train.csv"),
            val: out.path().join("val.csv"),
        };

        let (train, val) = load_volumes(
            &pipeline(),
            pairs[..2].to_vec(),
            pairs[2..].to_vec(),
            Some(&manifests),
            true,
        )
        .unwrap();
        assert_eq!((train.len(), val.len()), (2, 1));
        assert!(Arc::ptr_eq(train.pipeline(), val.pipeline()));
        assert_eq!(fs::read_to_string(&manifests.train).unwrap(), "p1\np2\n");
        assert_eq!(fs::read_to_string(&manifests.val).unwrap(), "p3\n");
    }
}
