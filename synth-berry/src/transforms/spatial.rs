//! 空间变换: 填充, 裁剪, 旋转, 去除单例轴.
//!
//! 所有函数都作用于通道优先的数组, 第 0 轴为通道轴, 其余为空间轴.
//! 填充值取被填充的那条一维 lane 原有部分的最小值.

use ndarray::{s, Array, ArrayD, ArrayViewD, Axis, Dimension, IxDyn, Slice};

use crate::data::slice::round_up;
use crate::{DataError, Result};

/// (前, 后) 填充量.
pub(crate) type Pad = (usize, usize);

/// 对称填充: 多出的一个体素放在后面.
#[inline]
fn symmetric(total: usize) -> Pad {
    let before = total / 2;
    (before, total - before)
}

/// 各通道的最小值. 空通道取 0.
pub(crate) fn channel_minimums(data: &ArrayViewD<f32>) -> Vec<f32> {
    data.axis_iter(Axis(0))
        .map(|c| {
            let m = c.iter().copied().fold(f32::INFINITY, f32::min);
            if m.is_finite() {
                m
            } else {
                0.0
            }
        })
        .collect()
}

/// 把 `spatial_size` 展开为与空间维数相同的目标形状. `None` 或缺省项保持原长度.
fn target_shape(spatial: &[usize], spatial_size: &[Option<usize>]) -> Result<Vec<usize>> {
    if spatial_size.len() > spatial.len() {
        return Err(DataError::InvalidArgument(format!(
            "目标形状 {spatial_size:?} 的维数超过了空间维数 {}",
            spatial.len()
        )));
    }
    Ok(spatial
        .iter()
        .enumerate()
        .map(|(i, &len)| spatial_size.get(i).copied().flatten().unwrap_or(len))
        .collect())
}

/// 沿 `axis` 填充 `(前, 后)` 个元素. 每条沿 `axis` 的一维 lane 用它自身原有部分的最小值填充.
pub(crate) fn pad_axis_min<D: Dimension>(
    data: Array<f32, D>,
    axis: Axis,
    (before, after): Pad,
) -> Array<f32, D> {
    if before == 0 && after == 0 {
        return data;
    }
    let len = data.len_of(axis);
    let mut dim = data.raw_dim();
    dim[axis.index()] += before + after;

    let mut out = Array::<f32, D>::zeros(dim);
    out.slice_axis_mut(axis, Slice::from(before..before + len))
        .assign(&data);
    for mut lane in out.lanes_mut(axis) {
        let m = lane
            .slice(s![before..before + len])
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
        let m = if m.is_finite() { m } else { 0.0 };
        lane.slice_mut(s![..before]).fill(m);
        lane.slice_mut(s![before + len..]).fill(m);
    }
    out
}

/// 按 `pads[i]` 依次填充第 `i` 个空间轴, 每条 lane 取自身的最小值.
/// 靠后的轴在前面的轴填充完成后再计算最小值.
pub(crate) fn pad_min(data: ArrayD<f32>, pads: &[Pad]) -> ArrayD<f32> {
    debug_assert_eq!(pads.len() + 1, data.ndim());
    pads.iter()
        .enumerate()
        .fold(data, |acc, (i, &pad)| pad_axis_min(acc, Axis(i + 1), pad))
}

/// 按 `pads[i]` 填充第 `i` 个空间轴. 第 `c` 个通道的填充值为 `fills[c]`.
pub(crate) fn pad_with(data: ArrayD<f32>, pads: &[Pad], fills: &[f32]) -> ArrayD<f32> {
    debug_assert_eq!(pads.len() + 1, data.ndim());
    debug_assert_eq!(fills.len(), data.len_of(Axis(0)));
    if pads.iter().all(|&(b, a)| b == 0 && a == 0) {
        return data;
    }
    let mut shape = data.shape().to_vec();
    for (len, (b, a)) in shape[1..].iter_mut().zip(pads) {
        *len += b + a;
    }

    let mut out = ArrayD::<f32>::zeros(IxDyn(&shape));
    for (mut c, &m) in out.axis_iter_mut(Axis(0)).zip(fills) {
        c.fill(m);
    }
    out.slice_each_axis_mut(|ax| match ax.axis.index() {
        0 => Slice::from(..),
        i => {
            let before = pads[i - 1].0;
            Slice::from(before..before + data.shape()[i])
        }
    })
    .assign(&data);
    out
}

/// 以 `starts[i]` 为起点, 把第 `i` 个空间轴裁剪为 `lens[i]`.
fn crop(data: ArrayD<f32>, starts: &[usize], lens: &[usize]) -> ArrayD<f32> {
    if data
        .shape()
        .iter()
        .skip(1)
        .zip(starts.iter().zip(lens))
        .all(|(&len, (&s, &l))| s == 0 && l == len)
    {
        return data;
    }
    data.slice_each_axis(|ax| match ax.axis.index() {
        0 => Slice::from(..),
        i => Slice::from(starts[i - 1]..starts[i - 1] + lens[i - 1]),
    })
    .to_owned()
}

/// 对称填充或居中裁剪, 使空间形状变为 `spatial_size`.
///
/// `spatial_size` 中的 `None` (以及缺省的尾部维度) 保持原长度不变.
pub(crate) fn resize_with_pad_or_crop(
    data: ArrayD<f32>,
    spatial_size: &[Option<usize>],
) -> Result<ArrayD<f32>> {
    let spatial = data.shape()[1..].to_vec();
    let target = target_shape(&spatial, spatial_size)?;

    let pads: Vec<Pad> = spatial
        .iter()
        .zip(&target)
        .map(|(&len, &t)| if t > len { symmetric(t - len) } else { (0, 0) })
        .collect();
    let data = pad_min(data, &pads);

    // 居中裁剪: 起点 = 中心 - 目标长度的一半.
    let starts: Vec<usize> = data.shape()[1..]
        .iter()
        .zip(&target)
        .map(|(&len, &t)| (len / 2).saturating_sub(t / 2))
        .collect();
    Ok(crop(data, &starts, &target))
}

/// 对称填充, 使每个空间轴长度成为 `k[i]` 的倍数. `None` 或缺省项不填充.
pub(crate) fn divisible_pad(data: ArrayD<f32>, k: &[Option<usize>]) -> Result<ArrayD<f32>> {
    let spatial = data.shape()[1..].to_vec();
    if k.len() > spatial.len() {
        return Err(DataError::InvalidArgument(format!(
            "整除因子 {k:?} 的维数超过了空间维数 {}",
            spatial.len()
        )));
    }
    let pads: Vec<Pad> = spatial
        .iter()
        .enumerate()
        .map(|(i, &len)| match k.get(i).copied().flatten() {
            Some(m) if m > 1 => symmetric(round_up(len, m) - len),
            _ => (0, 0),
        })
        .collect();
    Ok(pad_min(data, &pads))
}

/// 在前两个空间轴 (数组的第 1, 2 轴) 构成的平面内旋转 `k` 个 90°.
///
/// 方向与 `numpy.rot90(x, k, axes=(1, 2))` 相同: 一次旋转等价于先翻转第 2 轴, 再交换第 1, 2 轴.
pub(crate) fn rotate90(data: ArrayD<f32>, k: usize) -> Result<ArrayD<f32>> {
    if data.ndim() < 3 {
        return Err(DataError::InvalidArgument(format!(
            "旋转需要至少两个空间轴, 但数组形状为 {:?}",
            data.shape()
        )));
    }
    let k = k % 4;
    if k == 0 {
        return Ok(data);
    }
    let mut v = data.view();
    for _ in 0..k {
        v.invert_axis(Axis(2));
        v.swap_axes(1, 2);
    }
    Ok(v.as_standard_layout().into_owned())
}

/// 去掉长度为 1 的最后一个轴 (深度轴).
pub(crate) fn squeeze_last(data: ArrayD<f32>) -> Result<ArrayD<f32>> {
    match data.shape().last() {
        Some(1) if data.ndim() > 1 => {
            let last = data.ndim() - 1;
            Ok(data.index_axis_move(Axis(last), 0))
        }
        _ => Err(DataError::InvalidArgument(format!(
            "只能去掉长度为 1 的最后一维, 但数组形状为 {:?}",
            data.shape()
        ))),
    }
}
