//! 通用常量.

/// 病人目录下 MR 扫描 (作为 `image`) 的默认文件名.
pub const IMAGE_FILE_NAME: &str = "mr.nii.gz";

/// 病人目录下 CT 扫描 (作为 `label`) 的默认文件名.
pub const LABEL_FILE_NAME: &str = "ct.nii.gz";

/// 名称中包含该子串的目录不是病人目录 (例如数据集自带的概览目录).
pub const EXCLUDED_MARKER: &str = "overview";

/// 3D 子体积策略的固定深度.
pub const SUBVOLUME_DEPTH: usize = 32;

/// 2D 切片流水线最后一步的整除因子.
pub const SLICE_DIVISOR: usize = 16;

/// 旋转步骤的四分之一圈数. 3 即 270°.
pub const ROTATE_QUARTERS: usize = 3;

/// 训练 loader 默认的 worker 个数.
pub const TRAIN_WORKERS: usize = 2;

/// 验证 loader 默认的 worker 个数.
pub const VAL_WORKERS: usize = 1;

/// 默认训练集 shape manifest 路径.
pub const TRAIN_MANIFEST: &str = "./train_ds_2d.csv";

/// 默认验证集 shape manifest 路径.
pub const VAL_MANIFEST: &str = "./val_ds_2d.csv";
