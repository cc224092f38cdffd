//! 程序运行函数.

use std::env;
use std::path::PathBuf;

use crate::report::{InspectReport, PathSummary};
use synth_berry::assemble::{eager_slices_loader, slice_batch_count, slices_loader, LoaderConfig};
use synth_berry::dataset::Dataset;
use synth_berry::diagnostics::check_batches;
use synth_berry::loader::Batch;
use synth_berry::prelude::ImgWritePreview;
use synth_berry::{DataError, Result};
use utils::loader;

/// 取迭代器的第一个批次的形状.
fn first_shapes<I>(it: I) -> Result<Option<(Vec<usize>, Vec<usize>)>>
where
    I: IntoIterator<Item = Result<Batch>>,
{
    match it.into_iter().next() {
        Some(b) => {
            let b = b?;
            Ok(Some((b.image.shape().to_vec(), b.label.shape().to_vec())))
        }
        None => Ok(None),
    }
}

fn eager(cfg: &LoaderConfig) -> Result<PathSummary> {
    println!("Loading eager 2D slices...");
    let bundle = eager_slices_loader(cfg)?;

    // `$SYNTH_PREVIEW` 非空时保存第一个训练切片的预览图.
    if let Ok(p) = env::var("SYNTH_PREVIEW") {
        if !bundle.train_loader.dataset().is_empty() {
            bundle.train_loader.dataset().get(0)?.save_preview(PathBuf::from(&p))?;
            log::info!("preview saved to {p}");
        }
    }

    Ok(PathSummary {
        name: "eager slices",
        pipeline: bundle.pipeline.describe(),
        train_batches: bundle.train_loader.len(),
        val_batches: bundle.val_loader.len(),
        train_first: first_shapes(&bundle.train_loader)?,
        val_first: first_shapes(&bundle.val_loader)?,
        failures: 0,
        slices: Some((bundle.train_slices, bundle.val_slices)),
    })
}

fn lazy(cfg: &LoaderConfig) -> Result<PathSummary> {
    println!("Loading lazy volumes with 2D patches...");
    let bundle = slices_loader(cfg)?;
    let report = check_batches("val", &bundle.val_loader);

    Ok(PathSummary {
        name: "lazy 2d patches",
        pipeline: bundle.pipeline.describe(),
        train_batches: slice_batch_count(&bundle.train_volumes, cfg.train_batch_size)?,
        val_batches: bundle.val_loader.len(),
        train_first: first_shapes(&bundle.train_loader)?,
        val_first: first_shapes(&bundle.val_loader)?,
        failures: report.failures.len(),
        slices: None,
    })
}

/// 实际运行.
pub fn run() -> Result<InspectReport> {
    let cfg = loader::config_from_env()?;
    if !cfg.root.is_dir() {
        return Err(DataError::InvalidArgument(format!(
            "数据集根目录 `{}` 不存在",
            cfg.root.display()
        )));
    }
    log::info!("dataset root: {}", cfg.root.display());

    Ok(InspectReport::from_iter([eager(&cfg)?, lazy(&cfg)?]))
}
