//! 体数据级别的预处理流水线.
//!
//! 流水线是一个有序、不可变的 [`Stage`] 序列. 它对 image 和 label
//! 分别、独立地执行同样的步骤, 不保存任何跨样本的状态, 因此可以被任意多个样本
//! (和任意多个 worker) 共享.

mod intensity;
pub(crate) mod spatial;

use std::fmt;
use std::str::FromStr;

use crate::consts::{ROTATE_QUARTERS, SLICE_DIVISOR};
use crate::data::{Sample, Volume};
use crate::dataset::SamplePair;
use crate::{DataError, Result};

/// 强度归一化模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Normalize {
    /// 逐通道 z-score.
    #[default]
    ZScore,

    /// 线性缩放到 `[-1, 1]`.
    MinMax,

    /// 不做归一化.
    None,
}

impl FromStr for Normalize {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zscore" => Ok(Self::ZScore),
            "minmax" => Ok(Self::MinMax),
            "none" => Ok(Self::None),
            other => Err(DataError::UnknownNormalize(other.to_owned())),
        }
    }
}

impl fmt::Display for Normalize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZScore => "zscore",
            Self::MinMax => "minmax",
            Self::None => "none",
        })
    }
}

/// 流水线中的单个步骤.
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// 从路径加载 nifti 文件. 只能作为流水线的第一步, 由 [`Pipeline::run_pair`] 执行.
    Load,

    /// 转换为通道优先布局.
    EnsureChannelFirst,

    /// 逐通道 z-score 归一化.
    NormalizeIntensity,

    /// 整体线性缩放到 `[minv, maxv]`.
    ScaleIntensity {
        /// 下界.
        minv: f32,
        /// 上界.
        maxv: f32,
    },

    /// 对称填充或居中裁剪到 `spatial_size`, `None` 保持原长度.
    ResizeWithPadOrCrop {
        /// 目标空间形状.
        spatial_size: Vec<Option<usize>>,
    },

    /// 在前两个空间轴构成的平面内旋转 `k` 个 90°.
    Rotate90 {
        /// 四分之一圈数.
        k: usize,
    },

    /// 对称填充到 `k` 的倍数, `None` 不填充.
    DivisiblePad {
        /// 各空间轴的整除因子.
        k: Vec<Option<usize>>,
    },

    /// 去掉长度为 1 的深度轴.
    SqueezeDepth,
}

impl Stage {
    /// 步骤名称, 用于日志.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "LoadImage",
            Self::EnsureChannelFirst => "EnsureChannelFirst",
            Self::NormalizeIntensity => "NormalizeIntensity",
            Self::ScaleIntensity { .. } => "ScaleIntensity",
            Self::ResizeWithPadOrCrop { .. } => "ResizeWithPadOrCrop",
            Self::Rotate90 { .. } => "Rotate90",
            Self::DivisiblePad { .. } => "DivisiblePad",
            Self::SqueezeDepth => "SqueezeDepth",
        }
    }

    /// 对单个体数据执行该步骤.
    pub fn apply(&self, volume: Volume) -> Result<Volume> {
        match self {
            Self::Load => Err(DataError::InvalidArgument(
                "`LoadImage` 只能作为流水线首步作用于路径".to_owned(),
            )),
            Self::EnsureChannelFirst => Ok(volume.ensure_channel_first()),
            _ if !volume.is_channel_first() => Err(DataError::Layout { stage: self.name() }),
            Self::NormalizeIntensity => {
                volume.map_data(|d| Ok(intensity::normalize_channel_wise(d)))
            }
            Self::ScaleIntensity { minv, maxv } => {
                volume.map_data(|d| Ok(intensity::scale_intensity(d, *minv, *maxv)))
            }
            Self::ResizeWithPadOrCrop { spatial_size } => {
                volume.map_data(|d| spatial::resize_with_pad_or_crop(d, spatial_size))
            }
            Self::Rotate90 { k } => volume.map_data(|d| spatial::rotate90(d, *k)),
            Self::DivisiblePad { k } => volume.map_data(|d| spatial::divisible_pad(d, k)),
            Self::SqueezeDepth => volume.map_data(spatial::squeeze_last),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleIntensity { minv, maxv } => write!(f, "{}({minv}, {maxv})", self.name()),
            Self::ResizeWithPadOrCrop { spatial_size } => {
                write!(f, "{}({spatial_size:?})", self.name())
            }
            Self::Rotate90 { k } => write!(f, "{}(k={k})", self.name()),
            Self::DivisiblePad { k } => write!(f, "{}({k:?})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// 有序、无状态的预处理流水线.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// 直接初始化.
    #[inline]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// 全部步骤.
    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// 各步骤的描述, 按执行顺序排列.
    pub fn describe(&self) -> Vec<String> {
        self.stages.iter().map(ToString::to_string).collect()
    }

    /// 依次对 `volume` 执行所有步骤.
    #[inline]
    pub fn apply(&self, volume: Volume) -> Result<Volume> {
        apply_stages(&self.stages, volume)
    }

    /// 分别对 image 和 label 执行所有步骤.
    #[inline]
    pub fn run_volumes(&self, image: Volume, label: Volume) -> Result<Sample> {
        run_stages(&self.stages, image, label)
    }

    /// 从 `pair` 的两个路径加载并处理. 流水线必须以 [`Stage::Load`] 开始.
    pub fn run_pair(&self, pair: &SamplePair) -> Result<Sample> {
        let Some((Stage::Load, rest)) = self.stages.split_first() else {
            return Err(DataError::InvalidArgument(
                "流水线没有以 `LoadImage` 开始, 无法从路径加载".to_owned(),
            ));
        };
        run_stages(
            rest,
            Volume::open(pair.image_path())?,
            Volume::open(pair.label_path())?,
        )
    }
}

fn apply_stages(stages: &[Stage], volume: Volume) -> Result<Volume> {
    stages.iter().try_fold(volume, |v, stage| stage.apply(v))
}

fn run_stages(stages: &[Stage], image: Volume, label: Volume) -> Result<Sample> {
    let image = apply_stages(stages, image)?.into_data();
    let label = apply_stages(stages, label)?.into_data();
    Ok(Sample::new(image, label))
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", itertools::join(&self.stages, " -> "))
    }
}

/// 构造体数据流水线:
/// 加载 -> 通道优先 -> 归一化 -> 填充/裁剪到 `resized_size` -> 旋转 270° -> 整除填充到 `div_size`.
pub fn volume_transforms(
    normalize: Normalize,
    resized_size: &[Option<usize>],
    div_size: &[Option<usize>],
) -> Pipeline {
    let mut stages = vec![Stage::Load, Stage::EnsureChannelFirst];
    match normalize {
        Normalize::ZScore => {
            stages.push(Stage::NormalizeIntensity);
            log::info!("zscore normalization");
        }
        Normalize::MinMax => {
            stages.push(Stage::ScaleIntensity {
                minv: -1.0,
                maxv: 1.0,
            });
            log::info!("minmax normalization");
        }
        Normalize::None => log::info!("no normalization"),
    }
    stages.extend([
        Stage::ResizeWithPadOrCrop {
            spatial_size: resized_size.to_vec(),
        },
        Stage::Rotate90 { k: ROTATE_QUARTERS },
        Stage::DivisiblePad {
            k: div_size.to_vec(),
        },
    ]);
    Pipeline::new(stages)
}

/// 构造 2D 切片流水线 (不含加载步骤):
/// 通道优先 -> z-score -> 填充/裁剪到 `resized_size` -> 旋转 270° -> 整除填充到 16.
pub fn slice_transforms(resized_size: &[Option<usize>]) -> Pipeline {
    Pipeline::new(vec![
        Stage::EnsureChannelFirst,
        Stage::NormalizeIntensity,
        Stage::ResizeWithPadOrCrop {
            spatial_size: resized_size.to_vec(),
        },
        Stage::Rotate90 { k: ROTATE_QUARTERS },
        Stage::DivisiblePad {
            k: vec![Some(SLICE_DIVISOR); resized_size.len().max(2)],
        },
    ])
}
