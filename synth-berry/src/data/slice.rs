//! 原始体数据的 2D 切片展开.

use ndarray::{Array2, Array3, Axis};

use crate::transforms::spatial::pad_axis_min;
use crate::{DataError, Result};

/// 一个 2D 切片项: 原始 (未通道优先) 体数据在某个深度索引上的 (image, label) 截面.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceEntry {
    /// 所属病人.
    pub patient: String,

    /// 在 (填充后) 体数据中的深度索引.
    pub index: usize,

    /// MR 切片, 形状为 (W, H).
    pub image: Array2<f32>,

    /// CT 切片, 形状为 (W, H).
    pub label: Array2<f32>,
}

/// 不小于 `len` 的、`multiple` 的最小倍数. `multiple` 为 0 时原样返回.
#[inline]
pub const fn round_up(len: usize, multiple: usize) -> usize {
    if multiple == 0 {
        len
    } else {
        (len + multiple - 1) / multiple * multiple
    }
}

/// 将 (W, H, D) 体数据的深度轴对称地填充到 `multiple` 的倍数.
/// 每个 (w, h) 位置沿深度的填充值为该位置原有深度上的最小值. 深度已经是倍数时原样返回.
pub fn pad_depth_to_multiple(volume: Array3<f32>, multiple: usize) -> Array3<f32> {
    let d = volume.dim().2;
    let extra = round_up(d, multiple) - d;
    let before = extra / 2;
    pad_axis_min(volume, Axis(2), (before, extra - before))
}

/// 将一对 (W, H, D) 体数据按深度展开成切片项.
///
/// image 和 label 形状不一致时返回 `Err`.
pub fn slices_of(patient: &str, image: &Array3<f32>, label: &Array3<f32>) -> Result<Vec<SliceEntry>> {
    if image.shape() != label.shape() {
        return Err(DataError::ShapeMismatch {
            left: image.shape().to_vec(),
            right: label.shape().to_vec(),
        });
    }
    Ok(image
        .axis_iter(Axis(2))
        .zip(label.axis_iter(Axis(2)))
        .enumerate()
        .map(|(index, (i, l))| SliceEntry {
            patient: patient.to_owned(),
            index,
            image: i.to_owned(),
            label: l.to_owned(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{pad_depth_to_multiple, round_up, slices_of};
    use crate::testing::ramp_volume;
    use ndarray::{s, Array3, Axis};

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 8), 0);
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 8), 16);
        assert_eq!(round_up(7, 1), 7);
        assert_eq!(round_up(7, 0), 7);
    }

    /// 填充后深度是不小于原深度的最小倍数, 原数据位于中间.
    #[test]
    fn test_pad_depth() {
        for d in 1..=17 {
            for b in 1..=5 {
                let v = ramp_volume((2, 3, d));
                let padded = pad_depth_to_multiple(v.clone(), b);
                let target = padded.dim().2;
                assert_eq!(target % b, 0);
                assert!(target >= d && target < d + b);

                let before = (target - d) / 2;
                assert_eq!(padded.slice(s![.., .., before..before + d]), v);
                // ramp 沿深度递增, 每条 lane 的最小值是原第 0 片.
                let first = v.index_axis(Axis(2), 0);
                for k in (0..before).chain(before + d..target) {
                    assert_eq!(padded.index_axis(Axis(2), k), first);
                }
            }
        }
    }

    #[test]
    fn test_pad_depth_uses_minimum() {
        let mut v = Array3::from_elem((2, 2, 3), 5.0f32);
        v[[0, 0, 0]] = -7.0;
        v.slice_mut(s![1, 0, ..]).assign(&ndarray::arr1(&[10.0f32, 11.0, 12.0]));
        let padded = pad_depth_to_multiple(v, 4);
        assert_eq!(padded.dim(), (2, 2, 4));
        // 每个位置只取自己那一列的最小值.
        assert_eq!(padded[[0, 0, 3]], -7.0);
        assert_eq!(padded[[1, 1, 3]], 5.0);
        assert_eq!(padded.slice(s![1, 0, ..]), ndarray::arr1(&[10.0f32, 11.0, 12.0, 10.0]));
    }

    #[test]
    fn test_slices_of() {
        let image = ramp_volume((2, 3, 4));
        let label = image.mapv(|v| -v);
        let entries = slices_of("p1", &image, &label).unwrap();
        assert_eq!(entries.len(), 4);
        for (k, e) in entries.iter().enumerate() {
            assert_eq!(e.patient, "p1");
            assert_eq!(e.index, k);
            assert_eq!(e.image.dim(), (2, 3));
            assert_eq!(e.image, image.slice(s![.., .., k]));
            assert_eq!(e.label, label.slice(s![.., .., k]));
        }

        let bad = ramp_volume((2, 3, 5));
        assert!(slices_of("p1", &image, &bad).is_err());
    }
}
