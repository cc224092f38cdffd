//! 数据集操作.
//!
//! [`Dataset`] 是 map 风格的数据集抽象: 给定索引, 返回一对处理完毕的
//! (image, label) 数组. 每个索引都可以独立计算, 因此数据集可以被多个 worker 共享.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Result, Sample};

pub mod manifest;
pub mod paths;
pub mod slices;
pub mod volume;

pub use paths::{PairLayout, SamplePair, SplitPolicy};
pub use slices::SliceDataset;
pub use volume::VolumeDataset;

/// map 风格的数据集.
pub trait Dataset: Sync {
    /// 样本总数.
    fn len(&self) -> usize;

    /// 是否为空?
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取第 `index` 个样本.
    fn get(&self, index: usize) -> Result<Sample>;

    /// 第 `index` 个样本所属的病人. 索引越界时返回 `None`.
    fn patient(&self, index: usize) -> Option<String>;
}

impl<D: Dataset + Send> Dataset for Arc<D> {
    #[inline]
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    #[inline]
    fn get(&self, index: usize) -> Result<Sample> {
        self.as_ref().get(index)
    }

    #[inline]
    fn patient(&self, index: usize) -> Option<String> {
        self.as_ref().patient(index)
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
