//! 急切的 2D 切片数据集.
//!
//! 一次性把所有原始体数据读入内存, 沿深度方向填充到批大小的倍数, 再展开成切片.
//! 切片的预处理由 [`SliceDataset`] 在访问时完成.

use std::sync::Arc;

use crate::data::slice::{pad_depth_to_multiple, slices_of};
use crate::dataset::manifest::{ManifestPaths, ShapeRecord};
use crate::dataset::{Dataset, SamplePair};
use crate::transforms::Pipeline;
use crate::{ChannelLayout, DataError, Result, Sample, SliceEntry, Volume};

/// 2D 切片数据集. 每次访问时对切片执行流水线.
#[derive(Debug, Clone)]
pub struct SliceDataset {
    entries: Vec<SliceEntry>,
    pipeline: Arc<Pipeline>,
}

impl SliceDataset {
    /// 直接初始化.
    #[inline]
    pub fn new(entries: Vec<SliceEntry>, pipeline: Arc<Pipeline>) -> Self {
        Self { entries, pipeline }
    }

    /// 全部切片.
    #[inline]
    pub fn entries(&self) -> &[SliceEntry] {
        &self.entries
    }
}

impl Dataset for SliceDataset {
    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let entry = self.entries.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })?;
        let image = Volume::new(entry.image.clone().into_dyn(), ChannelLayout::None);
        let label = Volume::new(entry.label.clone().into_dyn(), ChannelLayout::None);
        self.pipeline.run_volumes(image, label)
    }

    fn patient(&self, index: usize) -> Option<String> {
        self.entries.get(index).map(|e| e.patient.clone())
    }
}

/// 展开后的全部切片及统计信息.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// 训练集切片.
    pub train: Vec<SliceEntry>,

    /// 验证集切片.
    pub val: Vec<SliceEntry>,

    /// 训练集切片总数.
    pub train_slices: usize,

    /// 验证集切片总数.
    pub val_slices: usize,

    /// 训练集中每个病人填充后的形状.
    pub train_shapes: Vec<ShapeRecord>,

    /// 验证集中每个病人填充后的形状.
    pub val_shapes: Vec<ShapeRecord>,
}

impl Materialized {
    /// 写出训练集和验证集的形状 manifest.
    #[inline]
    pub fn save_manifests(&self, paths: &ManifestPaths) -> Result<()> {
        paths.write(&self.train_shapes, &self.val_shapes)
    }
}

/// 加载一个路径对, 填充深度并展开成切片.
fn materialize_pair(
    pair: &SamplePair,
    batch_size: usize,
) -> Result<(Vec<SliceEntry>, ShapeRecord)> {
    let patient = pair.patient_name();
    let image = pad_depth_to_multiple(Volume::open_raw(pair.image_path())?, batch_size);
    let label = pad_depth_to_multiple(Volume::open_raw(pair.label_path())?, batch_size);
    let record = ShapeRecord::with_shape(patient.clone(), image.shape());
    let entries = slices_of(&patient, &image, &label)?;
    log::info!("{patient}: padded shape {:?}, {} slices", image.shape(), entries.len());
    Ok((entries, record))
}

fn materialize_split(
    pairs: &[SamplePair],
    batch_size: usize,
) -> Result<(Vec<SliceEntry>, Vec<ShapeRecord>)> {
    let mut entries = Vec::new();
    let mut records = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (slices, record) = materialize_pair(pair, batch_size)?;
        entries.extend(slices);
        records.push(record);
    }
    Ok((entries, records))
}

/// 一次性加载训练集和验证集的全部体数据, 并展开成切片.
///
/// 每个体数据的深度被对称地填充到 `batch_size` 的最小倍数, 每条深度 lane 的填充值为该 lane 的最小值.
pub fn materialize_slices(
    train: &[SamplePair],
    val: &[SamplePair],
    batch_size: usize,
) -> Result<Materialized> {
    let (train, train_shapes) = materialize_split(train, batch_size)?;
    let (val, val_shapes) = materialize_split(val, batch_size)?;
    log::info!("train slices: {}, val slices: {}", train.len(), val.len());
    Ok(Materialized {
        train_slices: train.len(),
        val_slices: val.len(),
        train,
        val,
        train_shapes,
        val_shapes,
    })
}
