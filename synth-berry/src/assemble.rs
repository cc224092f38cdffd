//! 一站式入口: 从数据集根目录直接得到加载器.
//!
//! - [`slices_loader`]: 惰性体数据 + 2D 切片块训练加载器;
//! - [`subvolume_loader`]: 惰性体数据 + 3D 子体积训练加载器;
//! - [`eager_slices_loader`]: 一次性展开所有切片的加载器.

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::TRAIN_WORKERS;
use crate::dataset::manifest::{ManifestPaths, ShapeRecord};
use crate::dataset::paths::{resolve_pairs, PairLayout, SplitPolicy};
use crate::dataset::slices::materialize_slices;
use crate::dataset::volume::load_volumes;
use crate::dataset::{home_dataset_dir_with, Dataset, SliceDataset, VolumeDataset};
use crate::diagnostics::check_batches;
use crate::loader::strategy::{slice_loaders, slice_loaders_2d, subvolume_loaders_3d};
use crate::loader::{DataLoader, EdgePolicy, PatchLoader};
use crate::transforms::{volume_transforms, Normalize, Pipeline};
use crate::{DataError, Result};

/// 加载器配置.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// 数据集根目录.
    pub root: PathBuf,

    /// 病人目录内部的文件布局.
    pub layout: PairLayout,

    /// 训练集病人数.
    pub train_number: usize,

    /// 验证集病人数.
    pub val_number: usize,

    /// 划分越界时的处理方式.
    pub split: SplitPolicy,

    /// 训练批大小. 急切路径下也是深度填充的倍数.
    pub train_batch_size: usize,

    /// 验证批大小.
    pub val_batch_size: usize,

    /// 强度归一化模式.
    pub normalize: Normalize,

    /// 体数据填充/裁剪的目标空间形状.
    pub resized_size: Vec<Option<usize>>,

    /// 体数据整除填充的因子.
    pub div_size: Vec<Option<usize>>,

    /// 急切路径下切片填充/裁剪的目标形状.
    pub slice_resized_size: Vec<Option<usize>>,

    /// 2D 切片块的厚度.
    pub window_width: usize,

    /// 训练加载器的 worker 数.
    pub workers: usize,

    /// 不完整块的处理方式.
    pub edge: EdgePolicy,

    /// manifest 保存路径.
    pub manifests: ManifestPaths,

    /// 是否保存 manifest.
    pub save_manifests: bool,

    /// 是否对体数据集做宽松检查.
    pub check_volumes: bool,

    /// 是否对训练/验证批次做宽松检查.
    pub check_slices: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root: home_dataset_dir_with(["pelvis"]).unwrap_or_else(|| PathBuf::from("pelvis")),
            layout: PairLayout::default(),
            train_number: 1,
            val_number: 1,
            split: SplitPolicy::default(),
            train_batch_size: 8,
            val_batch_size: 1,
            normalize: Normalize::default(),
            resized_size: vec![Some(600), Some(400), None],
            div_size: vec![Some(16), Some(16), None],
            slice_resized_size: vec![Some(256), Some(256)],
            window_width: 1,
            workers: TRAIN_WORKERS,
            edge: EdgePolicy::default(),
            manifests: ManifestPaths::default(),
            save_manifests: false,
            check_volumes: true,
            check_slices: false,
        }
    }
}

impl LoaderConfig {
    /// 以 `root` 为根目录的默认配置.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// 3D 子体积路径的默认配置: z-score, 填充/裁剪到 (600, 400, 150),
    /// 三个轴都整除填充到 16, 保存 manifest.
    pub fn subvolume_default<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            normalize: Normalize::ZScore,
            resized_size: vec![Some(600), Some(400), Some(150)],
            div_size: vec![Some(16), Some(16), Some(16)],
            save_manifests: true,
            ..Self::new(root)
        }
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        Arc::new(volume_transforms(
            self.normalize,
            &self.resized_size,
            &self.div_size,
        ))
    }

    fn volumes(&self, pipeline: &Arc<Pipeline>) -> Result<(Arc<VolumeDataset>, Arc<VolumeDataset>)> {
        let (train, val) = resolve_pairs(
            &self.root,
            self.train_number,
            self.val_number,
            &self.layout,
            self.split,
        )?;
        let manifests = self.save_manifests.then_some(&self.manifests);
        let (train, val) = load_volumes(pipeline, train, val, manifests, self.check_volumes)?;
        Ok((Arc::new(train), Arc::new(val)))
    }
}

/// [`slices_loader`] 的结果.
#[derive(Debug)]
pub struct SlicesBundle {
    /// 训练体数据集.
    pub train_volumes: Arc<VolumeDataset>,

    /// 验证体数据集.
    pub val_volumes: Arc<VolumeDataset>,

    /// 2D 切片块训练加载器.
    pub train_loader: PatchLoader<Arc<VolumeDataset>>,

    /// 整体积验证加载器.
    pub val_loader: DataLoader<Arc<VolumeDataset>>,

    /// 体数据流水线.
    pub pipeline: Arc<Pipeline>,
}

/// 惰性体数据集 + 2D 切片块加载器.
pub fn slices_loader(cfg: &LoaderConfig) -> Result<SlicesBundle> {
    let pipeline = cfg.pipeline();
    let (train_volumes, val_volumes) = cfg.volumes(&pipeline)?;
    let (train_loader, val_loader) = slice_loaders_2d(
        Arc::clone(&train_volumes),
        Arc::clone(&val_volumes),
        cfg.train_batch_size,
        cfg.val_batch_size,
        cfg.window_width,
        cfg.workers,
        cfg.edge,
    )?;
    if cfg.check_slices {
        check_batches("train", &train_loader);
        check_batches("val", &val_loader);
    }
    Ok(SlicesBundle {
        train_volumes,
        val_volumes,
        train_loader,
        val_loader,
        pipeline,
    })
}

/// [`subvolume_loader`] 的结果.
#[derive(Debug)]
pub struct SubvolumeBundle {
    /// 3D 子体积训练加载器.
    pub train_loader: PatchLoader<Arc<VolumeDataset>>,

    /// 整体积验证加载器.
    pub val_loader: DataLoader<Arc<VolumeDataset>>,

    /// 体数据流水线.
    pub pipeline: Arc<Pipeline>,
}

/// 惰性体数据集 + 3D 子体积加载器. 通常配合 [`LoaderConfig::subvolume_default`].
pub fn subvolume_loader(cfg: &LoaderConfig) -> Result<SubvolumeBundle> {
    let pipeline = cfg.pipeline();
    let (train, val) = cfg.volumes(&pipeline)?;
    let (train_loader, val_loader) = subvolume_loaders_3d(
        train,
        val,
        cfg.train_batch_size,
        cfg.val_batch_size,
        cfg.workers,
        cfg.edge,
    )?;
    if cfg.check_slices {
        check_batches("train", &train_loader);
    }
    Ok(SubvolumeBundle {
        train_loader,
        val_loader,
        pipeline,
    })
}

/// [`eager_slices_loader`] 的结果.
#[derive(Debug)]
pub struct EagerBundle {
    /// 训练切片加载器.
    pub train_loader: DataLoader<SliceDataset>,

    /// 验证切片加载器.
    pub val_loader: DataLoader<SliceDataset>,

    /// 切片流水线.
    pub pipeline: Arc<Pipeline>,

    /// 训练集切片总数.
    pub train_slices: usize,

    /// 验证集切片总数.
    pub val_slices: usize,

    /// 训练集中每个病人填充后的形状.
    pub train_shapes: Vec<ShapeRecord>,

    /// 验证集中每个病人填充后的形状.
    pub val_shapes: Vec<ShapeRecord>,
}

/// 一次性加载所有体数据并展开为 2D 切片, 然后构造切片加载器.
///
/// 深度填充的倍数为 `cfg.train_batch_size`, 切片目标形状为 `cfg.slice_resized_size`.
pub fn eager_slices_loader(cfg: &LoaderConfig) -> Result<EagerBundle> {
    let (train, val) = resolve_pairs(
        &cfg.root,
        cfg.train_number,
        cfg.val_number,
        &cfg.layout,
        cfg.split,
    )?;
    let m = materialize_slices(&train, &val, cfg.train_batch_size)?;
    if cfg.save_manifests {
        m.save_manifests(&cfg.manifests)?;
    }
    let (train_loader, val_loader, pipeline) = slice_loaders(
        m.train,
        m.val,
        cfg.train_batch_size,
        cfg.val_batch_size,
        &cfg.slice_resized_size,
    )?;
    Ok(EagerBundle {
        train_loader,
        val_loader,
        pipeline,
        train_slices: m.train_slices,
        val_slices: m.val_slices,
        train_shapes: m.train_shapes,
        val_shapes: m.val_shapes,
    })
}

/// 以 `batch_size` 切分 `dataset` 全部切片时的批次数, 即
/// `ceil(所有样本深度之和 / batch_size)`. 需要加载每个样本.
pub fn slice_batch_count<D: Dataset>(dataset: &D, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        return Err(DataError::InvalidArgument("batch_size 必须为正".to_owned()));
    }
    let mut total = 0;
    for index in 0..dataset.len() {
        let sample = dataset.get(index)?;
        total += sample.image.shape().last().copied().unwrap_or(0);
    }
    Ok(total.div_ceil(batch_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::fs;

    fn make_root() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        testing::write_patient(root.path(), "p1", (10, 8, 3));
        testing::write_patient(root.path(), "p2", (10, 8, 4));
        testing::write_patient(root.path(), "p3", (10, 8, 2));
        fs::create_dir(root.path().join("overview")).unwrap();
        root
    }

    fn small_config(root: &tempfile::TempDir) -> LoaderConfig {
        LoaderConfig {
            train_number: 2,
            val_number: 1,
            train_batch_size: 2,
            resized_size: vec![Some(8), Some(8), None],
            div_size: vec![Some(4), Some(4), None],
            slice_resized_size: vec![Some(12), Some(12)],
            ..LoaderConfig::new(root.path())
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = LoaderConfig::new("/data/pelvis");
        assert_eq!((cfg.train_number, cfg.val_number), (1, 1));
        assert_eq!((cfg.train_batch_size, cfg.val_batch_size), (8, 1));
        assert_eq!(cfg.resized_size, [Some(600), Some(400), None]);
        assert_eq!(cfg.manifests.train, PathBuf::from("./train_ds_2d.csv"));

        let cfg = LoaderConfig::subvolume_default("/data/pelvis");
        assert_eq!(cfg.div_size, [Some(16), Some(16), Some(16)]);
        assert!(cfg.save_manifests);
    }

    #[test]
    fn test_slices_loader() {
        testing::init_logger();
        let root = make_root();
        let cfg = LoaderConfig {
            check_slices: true,
            ..small_config(&root)
        };
        let bundle = slices_loader(&cfg).unwrap();
        assert_eq!(bundle.train_volumes.len(), 2);
        assert_eq!(bundle.val_volumes.patient(0).as_deref(), Some("p3"));

        // 3 + 4 = 7 个切片, 批大小 2.
        let sizes: Vec<_> = bundle
            .train_loader
            .iter()
            .map(|b| {
                let b = b.unwrap();
                assert_eq!(&b.image.shape()[1..], &[1, 8, 8]);
                b.len()
            })
            .collect();
        assert_eq!(sizes, [2, 2, 2, 1]);

        let val = bundle.val_loader.batch(0).unwrap();
        assert_eq!(val.image.shape(), &[1, 1, 8, 8, 2]);

        assert_eq!(slice_batch_count(&bundle.train_volumes, 3).unwrap(), 3);
        assert!(slice_batch_count(&bundle.train_volumes, 0).is_err());
    }

    #[test]
    fn test_split_overflow() {
        let root = make_root();
        let cfg = LoaderConfig {
            train_number: 3,
            val_number: 1,
            ..small_config(&root)
        };
        assert!(matches!(
            slices_loader(&cfg),
            Err(DataError::SplitOverflow { .. })
        ));
        let cfg = LoaderConfig {
            split: SplitPolicy::AllowOverlap,
            check_volumes: false,
            ..cfg
        };
        assert_eq!(slices_loader(&cfg).unwrap().train_volumes.len(), 3);
    }

    #[test]
    fn test_subvolume_loader() {
        let root = make_root();
        let out = tempfile::tempdir().unwrap();
        let cfg = LoaderConfig {
            train_number: 2,
            val_number: 1,
            train_batch_size: 1,
            workers: 0,
            resized_size: vec![Some(8), Some(8), Some(40)],
            div_size: vec![Some(4), Some(4), Some(4)],
            manifests: ManifestPaths {
                train: out.path().join("train.csv"),
                val: out.path().join("val.csv"),
            },
            ..LoaderConfig::subvolume_default(root.path())
        };
        let bundle = subvolume_loader(&cfg).unwrap();

        // 深度 40 = 32 + 8 (填充): 每个体数据 2 个子体积.
        let shapes: Vec<_> = bundle
            .train_loader
            .iter()
            .map(|b| b.unwrap().image.shape().to_vec())
            .collect();
        assert_eq!(shapes.len(), 4);
        assert!(shapes.iter().all(|s| s == &[1, 1, 8, 8, 32]));
        assert_eq!(fs::read_to_string(&cfg.manifests.train).unwrap(), "p1\np2\n");
        assert_eq!(fs::read_to_string(&cfg.manifests.val).unwrap(), "p3\n");
    }

    #[test]
    fn test_eager_slices_loader() {
        let root = make_root();
        let cfg = LoaderConfig {
            train_batch_size: 4,
            ..small_config(&root)
        };
        let bundle = eager_slices_loader(&cfg).unwrap();

        // 3 -> 4, 4 -> 4, 2 -> 4.
        assert_eq!((bundle.train_slices, bundle.val_slices), (8, 4));
        assert_eq!(bundle.train_shapes[0].shape_text().as_deref(), Some("10x8x4"));
        assert_eq!(bundle.train_loader.len(), 2);

        let b = bundle.train_loader.batch(0).unwrap();
        assert_eq!(b.image.shape(), &[4, 1, 16, 16]);
        let b = bundle.val_loader.batch(3).unwrap();
        assert_eq!(b.label.shape(), &[1, 1, 16, 16]);
    }
}
