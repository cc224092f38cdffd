//! 2D 样本的预览图像.

use super::{IntensityWindow, Sample, SliceEntry};
use crate::{DataError, Result};
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use std::path::Path;

/// 表明一个可以保存为 **可视化友好** 预览图的 2D 样本.
///
/// 预览图左半部分为 image (MR), 右半部分为 label (CT), 两者各自用覆盖其取值范围的
/// [`IntensityWindow`] 映射为灰度. 图像横轴对应 W, 纵轴对应 H.
pub trait ImgWritePreview {
    /// 将预览图保存到 `path` 路径. 格式由扩展名决定.
    fn save_preview<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

/// 去掉前导的单例轴 (通道轴, batch 轴), 得到 2D 平面.
fn plane(data: ArrayViewD<'_, f32>) -> Result<ArrayView2<'_, f32>> {
    let mut v = data;
    while v.ndim() > 2 && v.shape()[0] == 1 {
        v = v.index_axis_move(Axis(0), 0);
    }
    Ok(v.into_dimensionality::<Ix2>()?)
}

fn save_side_by_side<'a>(
    image: ArrayView2<'a, f32>,
    label: ArrayView2<'a, f32>,
    path: &Path,
) -> Result<()> {
    if image.shape() != label.shape() {
        return Err(DataError::ShapeMismatch {
            left: image.shape().to_vec(),
            right: label.shape().to_vec(),
        });
    }
    let (width, height) = image.dim();
    let mut buf = image::GrayImage::new(2 * width as u32, height as u32);
    for (offset, data) in [(0, image), (width, label)] {
        let Some(window) = IntensityWindow::covering(data.iter()) else {
            // 全为无意义值, 保持黑色.
            continue;
        };
        for ((w, h), &v) in data.indexed_iter() {
            let gray = window.eval(v).unwrap_or(u8::MIN);
            buf.put_pixel((offset + w) as u32, h as u32, image::Luma([gray]));
        }
    }
    buf.save(path)?;
    Ok(())
}

impl ImgWritePreview for Sample {
    fn save_preview<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_side_by_side(
            plane(self.image.view())?,
            plane(self.label.view())?,
            path.as_ref(),
        )
    }
}

impl ImgWritePreview for SliceEntry {
    fn save_preview<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_side_by_side(self.image.view(), self.label.view(), path.as_ref())
    }
}
