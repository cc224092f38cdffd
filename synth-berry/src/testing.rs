//! 测试用的合成数据集.

use crate::consts::{IMAGE_FILE_NAME, LABEL_FILE_NAME};
use crate::dataset::Dataset;
use crate::{DataError, Idx3d, Result, Sample};
use ndarray::{Array3, Array4, ArrayD};
use nifti::writer::WriterOptions;
use std::fs;
use std::path::{Path, PathBuf};

/// 体素值等于其行优先序号的 (W, H, D) 体数据.
pub fn ramp_volume((w, h, d): Idx3d) -> Array3<f32> {
    Array3::from_shape_fn((w, h, d), |(i, j, k)| ((i * h + j) * d + k) as f32)
}

/// 将 `data` 写成 nifti 文件.
pub fn write_volume(path: &Path, data: &Array3<f32>) {
    WriterOptions::new(path).write_nifti(data).unwrap();
}

/// 在 `root` 下创建名为 `name` 的病人目录, 写入 MR 和 CT 两个体数据.
/// CT 取值为 MR 的两倍减 1000.
pub fn write_patient(root: &Path, name: &str, shape: Idx3d) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    let mr = ramp_volume(shape);
    let ct = mr.mapv(|v| v * 2.0 - 1000.0);
    write_volume(&dir.join(IMAGE_FILE_NAME), &mr);
    write_volume(&dir.join(LABEL_FILE_NAME), &ct);
    dir
}

/// 创建一个病人目录, 但 MR 文件是损坏的.
pub fn write_corrupt_patient(root: &Path, name: &str, shape: Idx3d) -> PathBuf {
    let dir = write_patient(root, name, shape);
    fs::write(dir.join(IMAGE_FILE_NAME), b"definitely not a nifti file").unwrap();
    dir
}

/// 测试时打开日志. 多次调用无副作用.
pub fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// 通道优先的 `[1, W, H, D]` 样本, label 为 image 的相反数.
pub fn ramp_sample(shape: Idx3d) -> Sample {
    let image: ArrayD<f32> = ramp_volume(shape).insert_axis(ndarray::Axis(0)).into_dyn();
    let label = image.mapv(|v| -v);
    Sample::new(image, label)
}

/// 常数样本 `[1, W, H, D]`.
pub fn const_sample(shape: Idx3d, value: f32) -> Sample {
    let (w, h, d) = shape;
    let image = Array4::from_elem((1, w, h, d), value).into_dyn();
    Sample::new(image.clone(), image)
}

/// 内存中的数据集. `None` 项在访问时返回错误.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    pub items: Vec<Option<Sample>>,
}

impl MemoryDataset {
    pub fn new<I: IntoIterator<Item = Sample>>(items: I) -> Self {
        Self {
            items: items.into_iter().map(Some).collect(),
        }
    }
}

impl Dataset for MemoryDataset {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        match self.items.get(index) {
            Some(Some(s)) => Ok(s.clone()),
            Some(None) => Err(DataError::InvalidArgument(format!("broken item {index}"))),
            None => Err(DataError::IndexOutOfRange {
                index,
                len: self.items.len(),
            }),
        }
    }

    fn patient(&self, index: usize) -> Option<String> {
        (index < self.items.len()).then(|| format!("m{index}"))
    }
}
