//! 对 `synth-berry::assemble` 的更一层封装. 从环境变量读取加载器配置.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use synth_berry::assemble::LoaderConfig;
use synth_berry::consts::TRAIN_WORKERS;
use synth_berry::transforms::Normalize;
use synth_berry::{DataError, Result};

/// 获取数据集根目录.
///
/// 1. 若环境变量 `$SYNTH_PELVIS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/pelvis`.
pub fn root_from_env_or_home() -> PathBuf {
    match env::var("SYNTH_PELVIS_DIR") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => synth_berry::dataset::home_dataset_dir_with(["pelvis"])
            .unwrap_or_else(|| PathBuf::from("pelvis")),
    }
}

/// 读取环境变量 `key` 并解析. 未设置时返回 `None`.
fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DataError::InvalidArgument(format!("无法解析 `${key}` = `{v}`"))),
        Err(_) => Ok(None),
    }
}

/// 以 [`root_from_env_or_home`] 为根目录构造默认配置, 并用下列环境变量覆盖:
///
/// | 变量 | 字段 |
/// | --- | --- |
/// | `SYNTH_TRAIN_NUMBER` | `train_number` |
/// | `SYNTH_VAL_NUMBER` | `val_number` |
/// | `SYNTH_BATCH_SIZE` | `train_batch_size` |
/// | `SYNTH_VAL_BATCH_SIZE` | `val_batch_size` |
/// | `SYNTH_NORMALIZE` | `normalize` (`zscore`, `minmax`, `none`) |
/// | `SYNTH_SLICE_SIZE` | `slice_resized_size` (两个轴相同) |
/// | `SYNTH_WORKERS` | `workers`, 默认不超过可用核心数 |
pub fn config_from_env() -> Result<LoaderConfig> {
    let mut cfg = LoaderConfig::new(root_from_env_or_home());
    if let Some(n) = parse_env("SYNTH_TRAIN_NUMBER")? {
        cfg.train_number = n;
    }
    if let Some(n) = parse_env("SYNTH_VAL_NUMBER")? {
        cfg.val_number = n;
    }
    if let Some(n) = parse_env("SYNTH_BATCH_SIZE")? {
        cfg.train_batch_size = n;
    }
    if let Some(n) = parse_env("SYNTH_VAL_BATCH_SIZE")? {
        cfg.val_batch_size = n;
    }
    if let Ok(s) = env::var("SYNTH_NORMALIZE") {
        cfg.normalize = Normalize::from_str(s.trim())?;
    }
    if let Some(n) = parse_env::<usize>("SYNTH_SLICE_SIZE")? {
        cfg.slice_resized_size = vec![Some(n), Some(n)];
    }
    cfg.workers = parse_env("SYNTH_WORKERS")?.unwrap_or_else(|| TRAIN_WORKERS.min(crate::cpus()));
    Ok(cfg)
}
