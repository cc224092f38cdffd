//! 运行时错误.

use thiserror::Error;

/// 数据加载与预处理的运行时错误.
#[derive(Debug, Error)]
pub enum DataError {
    /// 底层 I/O 错误, 例如数据集根目录不存在.
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// nifti 文件读写错误.
    #[error("nifti 读写错误: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// manifest 写入错误.
    #[error("manifest 写入错误: {0}")]
    Csv(#[from] csv::Error),

    /// 预览图像写入错误.
    #[error("预览图像写入错误: {0}")]
    Image(#[from] image::ImageError),

    /// ndarray 形状错误.
    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// worker 线程池创建失败.
    #[cfg(feature = "rayon")]
    #[error("worker 线程池创建失败: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// 训练集与验证集个数之和超出了可用样本数.
    #[error("划分越界: 训练集 {train} + 验证集 {val} > 样本总数 {total}")]
    SplitOverflow {
        /// 期望的训练集大小.
        train: usize,
        /// 期望的验证集大小.
        val: usize,
        /// 实际样本总数.
        total: usize,
    },

    /// 无法识别的归一化模式.
    #[error("未知的归一化模式 `{0}`, 只支持 zscore, minmax, none")]
    UnknownNormalize(String),

    /// 该步骤要求通道优先的数据布局.
    #[error("`{stage}` 要求通道优先的数据布局")]
    Layout {
        /// 出错的流水线步骤.
        stage: &'static str,
    },

    /// 两个数组形状不一致 (例如 image 和 label, 或同一批次内的样本).
    #[error("形状不一致: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// 第一个形状.
        left: Vec<usize>,
        /// 第二个形状.
        right: Vec<usize>,
    },

    /// 数据集索引越界.
    #[error("索引 {index} 越界, 数据集长度为 {len}")]
    IndexOutOfRange {
        /// 请求的索引.
        index: usize,
        /// 数据集长度.
        len: usize,
    },

    /// 参数不合法.
    #[error("参数不合法: {0}")]
    InvalidArgument(String),
}

/// 数据加载与预处理结果.
pub type Result<T> = std::result::Result<T, DataError>;
