//! CSV manifest: 每行一个病人, 没有表头.
//!
//! ```text
//! 1PA001,512x512x96
//! 1PA004,512x512x112
//! ```
//!
//! 只记录病人名时, 每行只有一列.

use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{TRAIN_MANIFEST, VAL_MANIFEST};
use crate::dataset::SamplePair;
use crate::Result;

/// manifest 中的一行.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShapeRecord {
    /// 病人名.
    pub patient: String,

    /// 体数据形状, 可选.
    pub shape: Option<Vec<usize>>,
}

impl ShapeRecord {
    /// 只有病人名的记录.
    #[inline]
    pub fn patient_only(patient: String) -> Self {
        Self {
            patient,
            shape: None,
        }
    }

    /// 带形状的记录.
    #[inline]
    pub fn with_shape(patient: String, shape: &[usize]) -> Self {
        Self {
            patient,
            shape: Some(shape.to_vec()),
        }
    }

    /// 形如 `512x512x96` 的形状文本.
    pub fn shape_text(&self) -> Option<String> {
        self.shape.as_ref().map(|s| itertools::join(s, "x"))
    }
}

/// 训练集和验证集 manifest 的保存路径.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManifestPaths {
    /// 训练集 manifest.
    pub train: PathBuf,

    /// 验证集 manifest.
    pub val: PathBuf,
}

impl Default for ManifestPaths {
    fn default() -> Self {
        Self {
            train: PathBuf::from(TRAIN_MANIFEST),
            val: PathBuf::from(VAL_MANIFEST),
        }
    }
}

impl ManifestPaths {
    /// 分别写出训练集和验证集 manifest.
    pub fn write(&self, train: &[ShapeRecord], val: &[ShapeRecord]) -> Result<()> {
        write_manifest(&self.train, train)?;
        write_manifest(&self.val, val)?;
        log::info!(
            "manifests saved: {} ({} rows), {} ({} rows)",
            self.train.display(),
            train.len(),
            self.val.display(),
            val.len()
        );
        Ok(())
    }
}

/// 将 `records` 写入 `path`. 已存在的文件被覆盖.
pub fn write_manifest<P: AsRef<Path>>(path: P, records: &[ShapeRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    for record in records {
        match record.shape_text() {
            Some(shape) => writer.write_record([record.patient.as_str(), shape.as_str()])?,
            None => writer.write_record([record.patient.as_str()])?,
        }
    }
    writer.flush()?;
    Ok(())
}

/// 每个路径对一条只有病人名的记录.
pub fn patient_records(pairs: &[SamplePair]) -> Vec<ShapeRecord> {
    pairs
        .iter()
        .map(|p| ShapeRecord::patient_only(p.patient_name()))
        .collect()
}
