//! 预设的批处理策略.
//!
//! | 策略 | 训练加载器 | 验证加载器 |
//! | --- | --- | --- |
//! | 整体积 | - | 整个体数据, 1 worker |
//! | 2D 切片块 | 厚度 `window_width` 的切片, 默认 2 workers | 整体积 |
//! | 3D 子体积 | 深度 32 的子体积 | 整体积 |
//! | 急切切片 | 预展开的 2D 切片, 0 worker | 同左 |
//!
//! 所有预设都保证批次为连续布局.

use std::sync::Arc;

use crate::consts::VAL_WORKERS;
use crate::dataset::{Dataset, SliceDataset};
use crate::loader::{DataLoader, EdgePolicy, LoaderOptions, PatchLoader, PatchSpec};
use crate::transforms::{slice_transforms, Pipeline};
use crate::{Result, SliceEntry};

/// 整体积加载器, 通常用于验证.
pub fn whole_volume_loader<D: Dataset>(
    dataset: D,
    batch_size: usize,
    workers: usize,
) -> Result<DataLoader<D>> {
    DataLoader::new(dataset, LoaderOptions::new(batch_size, workers, true))
}

/// 2D 切片块训练加载器 + 整体积验证加载器.
///
/// `window_width == 1` 时训练批次中的深度轴被去掉, 形状为 `[B, C, W, H]`.
pub fn slice_loaders_2d<D: Dataset>(
    train_ds: D,
    val_ds: D,
    train_batch_size: usize,
    val_batch_size: usize,
    window_width: usize,
    workers: usize,
    edge: EdgePolicy,
) -> Result<(PatchLoader<D>, DataLoader<D>)> {
    let spec = PatchSpec::slices(window_width).with_edge(edge);
    let train = PatchLoader::new(
        train_ds,
        spec,
        LoaderOptions::new(train_batch_size, workers, true),
    )?;
    let val = whole_volume_loader(val_ds, val_batch_size, VAL_WORKERS)?;
    log::info!("2d patch loaders: window {window_width}, {workers} workers, edge {edge:?}");
    Ok((train, val))
}

/// 3D 子体积训练加载器 (深度 32) + 整体积验证加载器.
pub fn subvolume_loaders_3d<D: Dataset>(
    train_ds: D,
    val_ds: D,
    train_batch_size: usize,
    val_batch_size: usize,
    workers: usize,
    edge: EdgePolicy,
) -> Result<(PatchLoader<D>, DataLoader<D>)> {
    let spec = PatchSpec::subvolumes().with_edge(edge);
    let train = PatchLoader::new(
        train_ds,
        spec,
        LoaderOptions::new(train_batch_size, workers, true),
    )?;
    let val = whole_volume_loader(val_ds, val_batch_size, VAL_WORKERS)?;
    log::info!("3d subvolume loaders: depth {}, {workers} workers", spec.depth);
    Ok((train, val))
}

/// 预展开切片的训练/验证加载器. 两者共享同一条切片流水线, 不使用 worker.
pub fn slice_loaders(
    train_entries: Vec<SliceEntry>,
    val_entries: Vec<SliceEntry>,
    batch_size: usize,
    val_batch_size: usize,
    resized_size: &[Option<usize>],
) -> Result<(DataLoader<SliceDataset>, DataLoader<SliceDataset>, Arc<Pipeline>)> {
    let pipeline = Arc::new(slice_transforms(resized_size));
    let train = DataLoader::new(
        SliceDataset::new(train_entries, Arc::clone(&pipeline)),
        LoaderOptions::new(batch_size, 0, true),
    )?;
    let val = DataLoader::new(
        SliceDataset::new(val_entries, Arc::clone(&pipeline)),
        LoaderOptions::new(val_batch_size, 0, true),
    )?;
    log::info!("slice transforms: {pipeline}");
    Ok((train, val, pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::slice::slices_of;
    use crate::testing::{ramp_sample, ramp_volume, MemoryDataset};

    #[test]
    fn test_slice_loaders_2d() {
        let train = MemoryDataset::new([ramp_sample((4, 5, 3)), ramp_sample((4, 5, 2))]);
        let val = MemoryDataset::new([ramp_sample((4, 5, 6))]);
        let (train, val) = slice_loaders_2d(train, val, 2, 1, 1, 2, EdgePolicy::Pad).unwrap();

        let shapes: Vec<Vec<usize>> = train
            .iter()
            .map(|b| b.unwrap().image.shape().to_vec())
            .collect();
        assert_eq!(shapes, [vec![2, 1, 4, 5], vec![2, 1, 4, 5], vec![1, 1, 4, 5]]);

        assert_eq!(val.len(), 1);
        let b = val.batch(0).unwrap();
        assert_eq!(b.image.shape(), &[1, 1, 4, 5, 6]);
        assert_eq!(val.options().workers, VAL_WORKERS);
    }

    #[test]
    fn test_subvolume_loaders_3d() {
        let train = MemoryDataset::new([ramp_sample((2, 3, 40)), ramp_sample((2, 3, 32))]);
        let val = MemoryDataset::new([ramp_sample((2, 3, 40))]);

        let (loader, _) =
            subvolume_loaders_3d(train.clone(), val.clone(), 1, 1, 0, EdgePolicy::Pad).unwrap();
        let shapes: Vec<_> = loader
            .iter()
            .map(|b| b.unwrap().image.shape().to_vec())
            .collect();
        assert_eq!(shapes.len(), 3);
        assert!(shapes.iter().all(|s| s == &[1, 1, 2, 3, 32]));

        let (loader, _) = subvolume_loaders_3d(train, val, 1, 1, 0, EdgePolicy::Drop).unwrap();
        assert_eq!(loader.iter().count(), 2);
    }

    #[test]
    fn test_slice_loaders() {
        let image = ramp_volume((7, 30, 4));
        let label = image.mapv(|v| v - 1.0);
        let entries = slices_of("p1", &image, &label).unwrap();
        let (train, val, pipeline) =
            slice_loaders(entries.clone(), entries[..1].to_vec(), 3, 1, &[Some(20), Some(12)])
                .unwrap();
        assert_eq!(pipeline.stages().len(), 5);
        assert_eq!((train.len(), val.len()), (2, 1));

        let b = train.batch(0).unwrap();
        assert_eq!(b.image.shape(), &[3, 1, 16, 32]);
        assert_eq!(b.label.shape(), &[3, 1, 16, 32]);
        assert!(b.is_pinned());
    }
}
