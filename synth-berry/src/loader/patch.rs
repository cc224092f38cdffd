//! 沿深度方向的网格切块.
//!
//! 块的空间范围为 `(全宽, 全高, depth)`, 从原点开始沿深度轴无重叠地排列.
//! 深度不能被 `depth` 整除时, 最后的不完整块按 [`EdgePolicy`] 处理.

use std::collections::VecDeque;

use either::Either;
use ndarray::{Axis, Slice};

use crate::consts::SUBVOLUME_DEPTH;
use crate::dataset::Dataset;
use crate::loader::{collate, Batch, LoaderOptions, Workers};
use crate::transforms::spatial::{channel_minimums, pad_with, squeeze_last, Pad};
use crate::{DataError, Result, Sample};

/// 最后一个不完整块的处理方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgePolicy {
    /// 在深度轴末尾用整个体数据各通道的最小值填充到完整深度.
    #[default]
    Pad,

    /// 丢弃.
    Drop,
}

/// 切块参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PatchSpec {
    /// 块的深度, 必须为正.
    pub depth: usize,

    /// 是否去掉深度轴. 只在 `depth == 1` 时有意义.
    pub squeeze: bool,

    /// 不完整块的处理方式.
    pub edge: EdgePolicy,
}

impl PatchSpec {
    /// 厚度为 `window_width` 的 2D 切片块. 厚度为 1 时去掉深度轴.
    #[inline]
    pub fn slices(window_width: usize) -> Self {
        Self {
            depth: window_width,
            squeeze: window_width == 1,
            edge: EdgePolicy::default(),
        }
    }

    /// 深度为 32 的 3D 子体积.
    #[inline]
    pub fn subvolumes() -> Self {
        Self {
            depth: SUBVOLUME_DEPTH,
            squeeze: false,
            edge: EdgePolicy::default(),
        }
    }

    /// 修改边缘策略.
    #[inline]
    pub fn with_edge(self, edge: EdgePolicy) -> Self {
        Self { edge, ..self }
    }

    fn check(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(DataError::InvalidArgument("块深度必须为正".to_owned()));
        }
        if self.squeeze && self.depth != 1 {
            return Err(DataError::InvalidArgument(format!(
                "只有深度为 1 的块可以去掉深度轴, 当前深度为 {}",
                self.depth
            )));
        }
        Ok(())
    }

    /// 深度为 `depth` 的体数据产生的块数.
    #[inline]
    pub fn patch_count(&self, depth: usize) -> usize {
        match self.edge {
            EdgePolicy::Pad => depth.div_ceil(self.depth),
            EdgePolicy::Drop => depth / self.depth,
        }
    }

    /// 将一个通道优先的样本沿最后一维切块.
    pub fn extract(&self, sample: Sample) -> Result<Vec<Sample>> {
        self.check()?;
        sample.check_aligned()?;
        let ndim = sample.image.ndim();
        if ndim < 2 {
            return Err(DataError::InvalidArgument(format!(
                "切块需要通道轴和深度轴, 但数组形状为 {:?}",
                sample.image.shape()
            )));
        }
        let axis = Axis(ndim - 1);
        let total = sample.image.len_of(axis);
        let image_fill = channel_minimums(&sample.image.view());
        let label_fill = channel_minimums(&sample.label.view());

        let mut ans = Vec::with_capacity(self.patch_count(total));
        for k in 0..self.patch_count(total) {
            let start = k * self.depth;
            let end = (start + self.depth).min(total);
            let cut = |a: &ndarray::ArrayD<f32>, fill: &[f32]| -> Result<ndarray::ArrayD<f32>> {
                let mut part = a.slice_axis(axis, Slice::from(start..end)).to_owned();
                if end - start < self.depth {
                    let mut pads: Vec<Pad> = vec![(0, 0); ndim - 1];
                    pads[ndim - 2] = (0, self.depth - (end - start));
                    part = pad_with(part, &pads, fill);
                }
                if self.squeeze {
                    part = squeeze_last(part)?;
                }
                Ok(part)
            };
            ans.push(Sample::new(
                cut(&sample.image, &image_fill)?,
                cut(&sample.label, &label_fill)?,
            ));
        }
        Ok(ans)
    }
}

/// 以块为单位的数据集视图: 依次产生每个体数据的全部块.
#[derive(Debug, Clone)]
pub struct GridPatchDataset<D> {
    dataset: D,
    spec: PatchSpec,
}

impl<D: Dataset> GridPatchDataset<D> {
    /// 直接初始化.
    #[inline]
    pub fn new(dataset: D, spec: PatchSpec) -> Self {
        Self { dataset, spec }
    }

    /// 底层体数据集.
    #[inline]
    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// 切块参数.
    #[inline]
    pub fn spec(&self) -> &PatchSpec {
        &self.spec
    }

    /// 深度为 `depth` 的体数据产生的块数.
    #[inline]
    pub fn patch_count(&self, depth: usize) -> usize {
        self.spec.patch_count(depth)
    }

    /// 第 `index` 个体数据的全部块.
    pub fn patches_of(&self, index: usize) -> Result<Vec<Sample>> {
        self.spec.extract(self.dataset.get(index)?)
    }

    /// 按顺序迭代所有块. 无法加载的体数据产生一个 `Err`.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.dataset.len()).flat_map(move |i| match self.patches_of(i) {
            Ok(v) => Either::Left(v.into_iter().map(Ok)),
            Err(e) => Either::Right(std::iter::once(Err(e))),
        })
    }
}

/// 跨体数据边界组装块批次的加载器.
///
/// `workers > 0` 时, 每次预取至多 `workers` 个体数据并行加载.
#[derive(Debug)]
pub struct PatchLoader<D> {
    grid: GridPatchDataset<D>,
    options: LoaderOptions,
    workers: Workers,
}

impl<D: Dataset> PatchLoader<D> {
    /// 创建加载器.
    pub fn new(dataset: D, spec: PatchSpec, options: LoaderOptions) -> Result<Self> {
        options.check()?;
        spec.check()?;
        let workers = Workers::new(options.workers)?;
        Ok(Self {
            grid: GridPatchDataset::new(dataset, spec),
            options,
            workers,
        })
    }

    /// 块数据集.
    #[inline]
    pub fn grid(&self) -> &GridPatchDataset<D> {
        &self.grid
    }

    /// 加载器选项.
    #[inline]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// 按顺序迭代所有批次.
    #[inline]
    pub fn iter(&self) -> PatchBatches<'_, D> {
        PatchBatches {
            loader: self,
            next_volume: 0,
            prefetched: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    fn prefetch(&self, start: usize) -> Vec<Result<Vec<Sample>>> {
        let end = (start + self.options.workers.max(1)).min(self.grid.dataset.len());
        let grid = &self.grid;
        self.workers.map(start..end, |i| grid.patches_of(i))
    }
}

impl<'a, D: Dataset> IntoIterator for &'a PatchLoader<D> {
    type Item = Result<Batch>;
    type IntoIter = PatchBatches<'a, D>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [`PatchLoader`] 的批次迭代器.
#[derive(Debug)]
pub struct PatchBatches<'a, D> {
    loader: &'a PatchLoader<D>,
    next_volume: usize,
    prefetched: VecDeque<Result<Vec<Sample>>>,
    pending: VecDeque<Sample>,
}

impl<'a, D: Dataset> PatchBatches<'a, D> {
    fn emit(&mut self, n: usize) -> Result<Batch> {
        let samples: Vec<_> = self.pending.drain(..n).collect();
        let batch = collate(samples)?;
        log::debug!(
            "patch batch: image {:?}, label {:?}",
            batch.image.shape(),
            batch.label.shape()
        );
        Ok(self.loader.options.finish(batch))
    }
}

impl<'a, D: Dataset> Iterator for PatchBatches<'a, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.loader.options.batch_size;
        loop {
            if self.pending.len() >= batch_size {
                return Some(self.emit(batch_size));
            }
            if self.prefetched.is_empty() && self.next_volume < self.loader.grid.dataset.len() {
                let fetched = self.loader.prefetch(self.next_volume);
                self.next_volume += fetched.len();
                self.prefetched.extend(fetched);
            }
            match self.prefetched.pop_front() {
                Some(Ok(patches)) => self.pending.extend(patches),
                Some(Err(e)) => return Some(Err(e)),
                None if self.pending.is_empty() => return None,
                None => {
                    let n = self.pending.len();
                    return Some(self.emit(n));
                }
            }
        }
    }
}
