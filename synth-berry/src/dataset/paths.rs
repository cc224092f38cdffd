//! 数据集路径解析与训练/验证集划分.
//!
//! 数据集根目录下每个子目录对应一个病人, 其中包含一个 MR 文件和一个 CT 文件:
//!
//! ```text
//! root/
//! ├── 1PA001/
//! │   ├── mr.nii.gz
//! │   └── ct.nii.gz
//! ├── 1PA004/
//! └── overview/      <- 名字含有排除标记, 被跳过
//! ```

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{EXCLUDED_MARKER, IMAGE_FILE_NAME, LABEL_FILE_NAME};
use crate::{DataError, Result};

/// 一个病人的 (MR, CT) 文件路径.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SamplePair {
    image_path: PathBuf,
    label_path: PathBuf,
}

impl SamplePair {
    /// 直接初始化.
    #[inline]
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(image_path: P, label_path: Q) -> Self {
        Self {
            image_path: image_path.into(),
            label_path: label_path.into(),
        }
    }

    /// MR 文件路径.
    #[inline]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// CT 文件路径.
    #[inline]
    pub fn label_path(&self) -> &Path {
        &self.label_path
    }

    /// 病人名, 即 MR 文件所在目录的名字. 无法获取时返回空串.
    pub fn patient_name(&self) -> String {
        self.image_path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// 病人目录内部的文件布局.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairLayout {
    /// MR 文件名.
    pub image_file: String,

    /// CT 文件名.
    pub label_file: String,

    /// 目录名包含该子串时跳过.
    pub excluded_marker: String,
}

impl Default for PairLayout {
    fn default() -> Self {
        Self {
            image_file: IMAGE_FILE_NAME.to_owned(),
            label_file: LABEL_FILE_NAME.to_owned(),
            excluded_marker: EXCLUDED_MARKER.to_owned(),
        }
    }
}

impl PairLayout {
    /// 病人目录 `dir` 对应的路径对.
    #[inline]
    pub fn pair_in(&self, dir: &Path) -> SamplePair {
        SamplePair::new(dir.join(&self.image_file), dir.join(&self.label_file))
    }

    /// 名为 `name` 的目录是否应被跳过?
    #[inline]
    pub fn is_excluded(&self, name: &str) -> bool {
        !self.excluded_marker.is_empty() && name.contains(&self.excluded_marker)
    }
}

/// 训练集与验证集大小之和超过样本总数时的处理方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitPolicy {
    /// 返回 [`DataError::SplitOverflow`].
    #[default]
    Strict,

    /// 允许两个集合重叠或被截断: 训练集取前 `n` 个, 验证集取后 `m` 个.
    AllowOverlap,
}

/// 列出 `root` 下所有病人的路径对, 按目录名排序.
///
/// 名字含有排除标记的目录和非目录项被跳过. 不检查 MR / CT 文件是否存在.
pub fn list_pairs<P: AsRef<Path>>(root: P, layout: &PairLayout) -> Result<Vec<SamplePair>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if layout.is_excluded(&name) {
            continue;
        }
        dirs.push((name, entry.path()));
    }
    dirs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    log::info!("all files in dataset: {}", dirs.len());

    Ok(dirs.iter().map(|(_, dir)| layout.pair_in(dir)).collect())
}

/// 划分训练集和验证集: 训练集取前 `train_number` 个, 验证集取后 `val_number` 个.
/// `pairs` 为空时两个集合都为空, 不论 `policy`.
pub fn split_pairs(
    pairs: Vec<SamplePair>,
    train_number: usize,
    val_number: usize,
    policy: SplitPolicy,
) -> Result<(Vec<SamplePair>, Vec<SamplePair>)> {
    let total = pairs.len();
    if total == 0 {
        log::warn!("no patients found, both sets are empty");
        return Ok((Vec::new(), Vec::new()));
    }
    let wanted = train_number.checked_add(val_number);
    if policy == SplitPolicy::Strict && wanted.map_or(true, |n| n > total) {
        return Err(DataError::SplitOverflow {
            train: train_number,
            val: val_number,
            total,
        });
    }
    let train = pairs[..train_number.min(total)].to_vec();
    let val = pairs[total - val_number.min(total)..].to_vec();
    log::info!("train set: {}, val set: {}", train.len(), val.len());
    Ok((train, val))
}

/// 列出 `root` 下所有病人并划分训练集和验证集.
pub fn resolve_pairs<P: AsRef<Path>>(
    root: P,
    train_number: usize,
    val_number: usize,
    layout: &PairLayout,
    policy: SplitPolicy,
) -> Result<(Vec<SamplePair>, Vec<SamplePair>)> {
    let pairs = list_pairs(root, layout)?;
    split_pairs(pairs, train_number, val_number, policy)
}
