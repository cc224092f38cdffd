#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为 MR -> CT 图像翻译 (或分割) 模型准备成对的 nifti 体数据.
//!
//! 该 crate 目前仅提供 `safe` 接口. 所有 I/O 与结构性错误都以 [`DataError`]
//! 返回, 不会在库代码路径上 panic.
//!
//! # 数据流
//!
//! ```text
//! dataset::paths  ->  transforms  ->  dataset::volume  ->  loader::{DataLoader, PatchLoader}
//!                                                     \->  dataset::slices (eager) -> DataLoader
//! ```
//!
//! 1. [`dataset::paths`] 扫描数据集根目录, 每个病人子目录得到一对
//!    (MR, CT) 路径, 并划分训练集和验证集.
//! 2. [`transforms`] 构造体数据级别的预处理流水线: 加载, 通道优先,
//!    强度归一化, 填充/裁剪, 旋转 270°, 整除填充.
//! 3. [`dataset::volume::VolumeDataset`] 惰性地对每一对路径执行流水线.
//! 4. [`loader`] 提供三种批处理策略: 整体积 (验证), 沿 z 方向的 2D 切片块,
//!    固定深度的 3D 子体积.
//! 5. [`dataset::slices`] 提供另一条路径: 一次性加载全部体数据并展开成 2D 切片.
//!
//! 所有阶段的诊断工具位于 [`diagnostics`].
//!
//! # 坐标约定
//!
//! 与 nifti 文件保持一致, 空间轴顺序为 (W, H, D), 深度 (z) 为最后一维.
//! 通道优先后数组形状为 `[C, W, H, D]` (体数据) 或 `[C, W, H]` (切片).

/// 二维索引 / 形状 (W, H).
pub type Idx2d = (usize, usize);

/// 三维索引 / 形状 (W, H, D).
pub type Idx3d = (usize, usize, usize);

mod error;

pub mod assemble;
pub mod consts;
pub mod data;
pub mod dataset;
pub mod diagnostics;
pub mod loader;
pub mod prelude;
pub mod transforms;

pub use data::{ChannelLayout, IntensityWindow, Sample, SliceEntry, Volume};
pub use error::{DataError, Result};

#[cfg(test)]
pub(crate) mod testing;
