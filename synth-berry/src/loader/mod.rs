//! 批处理.
//!
//! [`DataLoader`] 按索引顺序把数据集样本组装成批次; [`PatchLoader`]
//! 先把每个体数据沿深度方向切成块, 再跨体数据地组装批次. 两者都不打乱顺序.
//!
//! 开启 `rayon` 特性时, `workers > 0` 的加载器拥有一个同等大小的线程池,
//! 批次内的样本 (或预取的体数据) 在池中并行加载. worker 中的错误作为
//! `Err` 项从迭代器返回.

use std::ops::Range;

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::dataset::Dataset;
use crate::{DataError, Result, Sample};

pub mod patch;
pub mod strategy;

pub use patch::{EdgePolicy, GridPatchDataset, PatchLoader, PatchSpec};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        use rayon::{ThreadPool, ThreadPoolBuilder};
    }
}

/// 一个批次. 第 0 轴为批次轴.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 堆叠后的 MR 数组.
    pub image: ArrayD<f32>,

    /// 堆叠后的 CT 数组.
    pub label: ArrayD<f32>,
}

impl Batch {
    /// 批次中的样本数.
    #[inline]
    pub fn len(&self) -> usize {
        self.image.shape().first().copied().unwrap_or(0)
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 两个数组是否都是连续的行优先布局?
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.image.is_standard_layout() && self.label.is_standard_layout()
    }

    /// 转换为连续的行优先布局, 以便零拷贝地交给下游.
    pub fn pin(self) -> Self {
        if self.is_pinned() {
            return self;
        }
        Self {
            image: self.image.as_standard_layout().into_owned(),
            label: self.label.as_standard_layout().into_owned(),
        }
    }
}

fn stack_all(arrays: &[ArrayViewD<'_, f32>]) -> Result<ArrayD<f32>> {
    let first = arrays[0].shape();
    if let Some(bad) = arrays.iter().find(|a| a.shape() != first) {
        return Err(DataError::ShapeMismatch {
            left: first.to_vec(),
            right: bad.shape().to_vec(),
        });
    }
    Ok(ndarray::stack(Axis(0), arrays)?)
}

/// 沿新的第 0 轴堆叠样本. 样本之间形状不一致时返回 `Err`.
pub fn collate(samples: Vec<Sample>) -> Result<Batch> {
    if samples.is_empty() {
        return Err(DataError::InvalidArgument("不能组装空批次".to_owned()));
    }
    let images: Vec<_> = samples.iter().map(|s| s.image.view()).collect();
    let labels: Vec<_> = samples.iter().map(|s| s.label.view()).collect();
    Ok(Batch {
        image: stack_all(&images)?,
        label: stack_all(&labels)?,
    })
}

/// 加载器选项.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoaderOptions {
    /// 批大小, 必须为正.
    pub batch_size: usize,

    /// 并行加载的 worker 数. 0 表示在调用线程上顺序加载.
    pub workers: usize,

    /// 是否保证每个批次都是连续布局.
    pub pin_memory: bool,
}

impl LoaderOptions {
    /// 直接初始化.
    #[inline]
    pub fn new(batch_size: usize, workers: usize, pin_memory: bool) -> Self {
        Self {
            batch_size,
            workers,
            pin_memory,
        }
    }

    fn check(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidArgument("batch_size 必须为正".to_owned()));
        }
        Ok(())
    }

    #[inline]
    fn finish(&self, batch: Batch) -> Batch {
        if self.pin_memory {
            batch.pin()
        } else {
            batch
        }
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::new(1, 0, false)
    }
}

/// 加载器私有的 worker 池.
#[derive(Debug)]
pub(crate) struct Workers {
    #[cfg(feature = "rayon")]
    pool: Option<ThreadPool>,
}

impl Workers {
    /// `n == 0` 时不创建线程池.
    pub(crate) fn new(n: usize) -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let pool = match n {
                    0 => None,
                    n => Some(ThreadPoolBuilder::new().num_threads(n).build()?),
                };
                Ok(Self { pool })
            } else {
                let _ = n;
                Ok(Self {})
            }
        }
    }

    /// 对 `range` 中每个索引计算 `op`, 结果按索引顺序排列.
    pub(crate) fn map<T, F>(&self, range: Range<usize>, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                match &self.pool {
                    Some(pool) => pool.install(|| range.into_par_iter().map(op).collect()),
                    None => range.map(op).collect(),
                }
            } else {
                range.map(op).collect()
            }
        }
    }
}

/// map 风格的批处理加载器, 按索引顺序产生批次.
#[derive(Debug)]
pub struct DataLoader<D> {
    dataset: D,
    options: LoaderOptions,
    workers: Workers,
}

impl<D: Dataset> DataLoader<D> {
    /// 创建加载器. `batch_size` 为 0 或线程池创建失败时返回 `Err`.
    pub fn new(dataset: D, options: LoaderOptions) -> Result<Self> {
        options.check()?;
        let workers = Workers::new(options.workers)?;
        Ok(Self {
            dataset,
            options,
            workers,
        })
    }

    /// 底层数据集.
    #[inline]
    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// 加载器选项.
    #[inline]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// 批次数, 最后一个批次可能不满.
    #[inline]
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.options.batch_size)
    }

    /// 是否没有任何批次?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 组装第 `index` 个批次.
    pub fn batch(&self, index: usize) -> Result<Batch> {
        let len = self.len();
        if index >= len {
            return Err(DataError::IndexOutOfRange { index, len });
        }
        let start = index * self.options.batch_size;
        let end = (start + self.options.batch_size).min(self.dataset.len());
        let dataset = &self.dataset;
        let samples = self
            .workers
            .map(start..end, |i| dataset.get(i))
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        let batch = collate(samples)?;
        log::debug!(
            "batch {index}: image {:?}, label {:?}",
            batch.image.shape(),
            batch.label.shape()
        );
        Ok(self.options.finish(batch))
    }

    /// 按顺序迭代所有批次.
    #[inline]
    pub fn iter(&self) -> Batches<'_, D> {
        Batches {
            loader: self,
            next: 0,
        }
    }
}

impl<'a, D: Dataset> IntoIterator for &'a DataLoader<D> {
    type Item = Result<Batch>;
    type IntoIter = Batches<'a, D>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [`DataLoader`] 的批次迭代器.
#[derive(Debug)]
pub struct Batches<'a, D> {
    loader: &'a DataLoader<D>,
    next: usize,
}

impl<'a, D: Dataset> Iterator for Batches<'a, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.loader.len() {
            return None;
        }
        let ans = self.loader.batch(self.next);
        self.next += 1;
        Some(ans)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len();
        (n, Some(n))
    }
}

impl<'a, D: Dataset> ExactSizeIterator for Batches<'a, D> {
    #[inline]
    fn len(&self) -> usize {
        self.loader.len().saturating_sub(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ramp_sample, MemoryDataset};

    #[test]
    fn test_collate() {
        let samples = vec![ramp_sample((2, 3, 4)), ramp_sample((2, 3, 4))];
        let batch = collate(samples.clone()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.image.shape(), &[2, 1, 2, 3, 4]);
        assert_eq!(batch.label.index_axis(Axis(0), 1), samples[1].label);
        assert!(batch.is_pinned());

        let err = collate(vec![ramp_sample((2, 3, 4)), ramp_sample((2, 3, 5))]).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
        assert!(collate(Vec::new()).is_err());
    }

    #[test]
    fn test_data_loader_batches() {
        let ds = MemoryDataset::new((0..5).map(|_| ramp_sample((2, 2, 3))));
        let loader = DataLoader::new(ds, LoaderOptions::new(2, 0, true)).unwrap();
        assert_eq!(loader.len(), 3);

        let it = loader.iter();
        assert_eq!(it.len(), 3);
        let sizes: Vec<_> = it.map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert!(loader.batch(3).is_err());
    }

    /// 并行加载不改变样本顺序.
    #[test]
    fn test_data_loader_with_workers() {
        let samples: Vec<_> = (0..7)
            .map(|k| {
                let mut s = ramp_sample((3, 2, 2));
                s.image.mapv_inplace(|v| v + k as f32 * 100.0);
                s
            })
            .collect();
        let ds = MemoryDataset::new(samples.clone());
        let loader = DataLoader::new(ds, LoaderOptions::new(3, 2, true)).unwrap();

        let got: Vec<_> = loader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(got.len(), 3);
        let flat: Vec<_> = got
            .iter()
            .flat_map(|b| b.image.outer_iter().map(|v| v.to_owned()).collect::<Vec<_>>())
            .collect();
        assert_eq!(flat, samples.iter().map(|s| s.image.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_error_is_yielded() {
        let mut ds = MemoryDataset::new((0..4).map(|_| ramp_sample((2, 2, 2))));
        ds.items[2] = None;
        let loader = DataLoader::new(ds, LoaderOptions::new(1, 2, false)).unwrap();
        let ok: Vec<bool> = loader.iter().map(|b| b.is_ok()).collect();
        assert_eq!(ok, [true, true, false, true]);
    }

    #[test]
    fn test_zero_batch_size() {
        let ds = MemoryDataset::new([ramp_sample((2, 2, 2))]);
        assert!(DataLoader::new(ds, LoaderOptions::new(0, 0, false)).is_err());
    }
}
