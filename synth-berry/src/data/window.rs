//! 强度窗口.

/// 强度窗口, 包含窗位 (level) 和窗宽 (width). 用于把任意强度映射为 8-bit 灰度.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct IntensityWindow {
    level: f32,
    width: f32,
}

impl IntensityWindow {
    /// 构建窗口.
    ///
    /// `level` 必须有限, `width` 必须为正且有限, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<IntensityWindow> {
        if level.is_finite() && width.is_finite() && width > 0.0 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 构建恰好覆盖 `[lo, hi]` 的窗口.
    ///
    /// 区间退化 (`lo == hi`) 时窗宽取 1. 任一端点无意义时返回 `None`.
    pub fn from_range(lo: f32, hi: f32) -> Option<IntensityWindow> {
        if !lo.is_finite() || !hi.is_finite() || hi < lo {
            return None;
        }
        let width = if hi > lo { hi - lo } else { 1.0 };
        Self::new((lo + hi) / 2.0, width)
    }

    /// 构建覆盖 `data` 全部取值的窗口. 数据为空或全为无意义值时返回 `None`.
    pub fn covering<'a, I: IntoIterator<Item = &'a f32>>(data: I) -> Option<IntensityWindow> {
        let (lo, hi) = data
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        Self::from_range(lo, hi)
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255)
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if v <= lb {
            Some(u8::MIN)
        } else if v >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - lb) / self.width()) * 255.0) as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::IntensityWindow;

    #[test]
    fn test_window_invalid_input() {
        assert!(IntensityWindow::new(0.0, -1.0).is_none());
        assert!(IntensityWindow::new(0.0, 0.0).is_none());
        assert!(IntensityWindow::new(f32::NAN, 1.0).is_none());
        assert!(IntensityWindow::from_range(2.0, 1.0).is_none());
        assert!(IntensityWindow::covering(&[] as &[f32]).is_none());
    }

    #[test]
    fn test_window_generic() {
        // [60, 100]
        let w = IntensityWindow::new(80.0, 40.0).unwrap();
        assert_eq!(w.eval(f32::NAN), None);
        assert_eq!(w.eval(f32::MIN), Some(0));
        assert_eq!(w.eval(f32::MAX), Some(255));
        assert_eq!(w.eval(60.0), Some(0));
        assert_eq!(w.eval(70.0).unwrap(), (255.0 * 0.25) as u8);
        assert_eq!(w.eval(80.0).unwrap(), (255.0 * 0.5) as u8);
        assert_eq!(w.eval(99.999), Some(254));
        assert_eq!(w.eval(100.0), Some(u8::MAX));
    }

    #[test]
    fn test_window_covering() {
        let w = IntensityWindow::covering(&[-1000.0, 0.0, f32::NAN, 1000.0]).unwrap();
        assert_eq!(w.lower_bound(), -1000.0);
        assert_eq!(w.upper_bound(), 1000.0);

        // 常数数据: 窗宽为 1, 不会除零.
        let w = IntensityWindow::covering(&[3.0, 3.0]).unwrap();
        assert_eq!(w.width(), 1.0);
        assert_eq!(w.eval(3.0), Some(127));
    }
}
