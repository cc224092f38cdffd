//! 体数据与样本.

use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayViewD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::{DataError, Result};

pub mod preview;
pub mod slice;
pub mod window;

pub use preview::ImgWritePreview;
pub use slice::SliceEntry;
pub use window::IntensityWindow;

/// 通道轴在数组中的位置.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelLayout {
    /// 没有通道轴, 所有轴都是空间轴.
    None,

    /// 通道轴是最后一维 (nifti 4D 文件的第四维).
    Last,

    /// 通道轴是第一维.
    First,
}

/// 一个 nifti 体数据 (或 2D 切片) 及其通道布局. 体素值以 `f32` 保存.
///
/// 空间轴顺序与 nifti 文件一致, 为 (W, H, D).
#[derive(Debug, Clone)]
pub struct Volume {
    data: ArrayD<f32>,
    layout: ChannelLayout,
}

impl Volume {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayD<f32>, layout: ChannelLayout) -> Self {
        Self { data, layout }
    }

    /// 打开 nii / nii.gz 文件. `path` 为本地路径.
    ///
    /// 3D 文件视为无通道, 4D 文件视为通道在最后一维. 其他维数返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let data = obj.into_volume().into_ndarray::<f32>()?;

        // nifti 的数据区按列优先存储, 这里统一成行优先.
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        let layout = match data.ndim() {
            3 => ChannelLayout::None,
            4 => ChannelLayout::Last,
            n => {
                return Err(DataError::InvalidArgument(format!(
                    "只支持 3D 或 4D nifti, 但 `{}` 是 {n}D",
                    path.as_ref().display()
                )))
            }
        };
        Ok(Self { data, layout })
    }

    /// 打开 3D nii 文件, 按原样返回 (W, H, D) 数组, 不附加通道轴.
    pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
        let vol = Self::open(path)?;
        Ok(vol.data.into_dimensionality::<Ix3>()?)
    }

    /// 通道布局.
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// 是否已经是通道优先布局?
    #[inline]
    pub fn is_channel_first(&self) -> bool {
        matches!(self.layout, ChannelLayout::First)
    }

    /// 完整形状 (包含通道轴).
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 空间形状 (去掉通道轴).
    pub fn spatial_shape(&self) -> &[usize] {
        let shape = self.data.shape();
        match self.layout {
            ChannelLayout::None => shape,
            ChannelLayout::First => &shape[1..],
            ChannelLayout::Last => &shape[..shape.len() - 1],
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// 将数据转换为通道优先布局. 无通道时插入长度为 1 的通道轴,
    /// 通道在最后时将其移到最前.
    pub fn ensure_channel_first(self) -> Self {
        let data = match self.layout {
            ChannelLayout::First => self.data,
            ChannelLayout::None => self.data.insert_axis(Axis(0)),
            ChannelLayout::Last => {
                let n = self.data.ndim();
                let mut order: Vec<usize> = Vec::with_capacity(n);
                order.push(n - 1);
                order.extend(0..n - 1);
                let moved = self.data.permuted_axes(order);
                moved.as_standard_layout().into_owned()
            }
        };
        Self {
            data,
            layout: ChannelLayout::First,
        }
    }

    /// 用 `op` 替换底层数据, 保持布局不变.
    pub(crate) fn map_data<F>(self, op: F) -> Result<Self>
    where
        F: FnOnce(ArrayD<f32>) -> Result<ArrayD<f32>>,
    {
        Ok(Self {
            data: op(self.data)?,
            layout: self.layout,
        })
    }
}

/// 一对经过处理的 (image, label) 数组. 训练时 image 为 MR, label 为 CT.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// MR 数组.
    pub image: ArrayD<f32>,

    /// CT 数组.
    pub label: ArrayD<f32>,
}

impl Sample {
    /// 直接初始化.
    #[inline]
    pub fn new(image: ArrayD<f32>, label: ArrayD<f32>) -> Self {
        Self { image, label }
    }

    /// image 与 label 形状是否一致?
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.image.shape() == self.label.shape()
    }

    /// 若 image 与 label 形状不一致, 返回 `Err`.
    pub fn check_aligned(&self) -> Result<()> {
        if self.is_aligned() {
            Ok(())
        } else {
            Err(DataError::ShapeMismatch {
                left: self.image.shape().to_vec(),
                right: self.label.shape().to_vec(),
            })
        }
    }
}
