//! 强度归一化.
//!
//! 所有函数都作用于通道优先的数组, 第 0 轴为通道轴.

use ndarray::{ArrayD, Axis};

/// 逐通道 z-score 归一化: `(x - mean) / std`. 标准差为总体标准差;
/// 标准差为 0 的通道只减去均值.
pub(crate) fn normalize_channel_wise(mut data: ArrayD<f32>) -> ArrayD<f32> {
    for mut channel in data.axis_iter_mut(Axis(0)) {
        let n = channel.len();
        if n == 0 {
            continue;
        }
        let mean = channel.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let var = channel
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n as f64;
        let std = match var.sqrt() {
            s if s == 0.0 => 1.0,
            s => s,
        };
        channel.mapv_inplace(|v| ((v as f64 - mean) / std) as f32);
    }
    data
}

/// 将整个数组线性缩放到 `[minv, maxv]`.
///
/// 数组为常数时无法缩放, 结果为 `x * minv`.
pub(crate) fn scale_intensity(mut data: ArrayD<f32>, minv: f32, maxv: f32) -> ArrayD<f32> {
    if data.is_empty() {
        return data;
    }
    let (lo, hi) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if hi == lo {
        data.mapv_inplace(|v| v * minv);
        return data;
    }
    let scale = (maxv - minv) / (hi - lo);
    data.mapv_inplace(|v| (v - lo) * scale + minv);
    data
}
