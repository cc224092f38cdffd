//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};
pub use crate::{DataError, Result};

pub use crate::data::{ChannelLayout, ImgWritePreview, IntensityWindow, Sample, SliceEntry, Volume};

pub use crate::consts::{IMAGE_FILE_NAME, LABEL_FILE_NAME, SUBVOLUME_DEPTH};

pub use crate::dataset::manifest::{ManifestPaths, ShapeRecord};
pub use crate::dataset::{self, home_dataset_dir_with};
pub use crate::dataset::{Dataset, PairLayout, SamplePair, SliceDataset, SplitPolicy, VolumeDataset};

pub use crate::transforms::{slice_transforms, volume_transforms, Normalize, Pipeline, Stage};

pub use crate::loader::{Batch, DataLoader, EdgePolicy, LoaderOptions, PatchLoader, PatchSpec};

pub use crate::assemble::{
    eager_slices_loader, slices_loader, subvolume_loader, LoaderConfig,
};

pub use crate::diagnostics::{check_dataset, validate_dataset, CheckReport};
