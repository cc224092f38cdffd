//! 检查结果.

use std::io::{self, Write};

/// 单条加载路径的概况.
pub struct PathSummary {
    pub name: &'static str,
    pub pipeline: Vec<String>,
    pub train_batches: usize,
    pub val_batches: usize,
    pub train_first: Option<(Vec<usize>, Vec<usize>)>,
    pub val_first: Option<(Vec<usize>, Vec<usize>)>,
    pub failures: usize,
    pub slices: Option<(usize, usize)>,
}

/// 将 `p` 的概况写进 `w` 中.
fn describe_into<W: Write>(p: &PathSummary, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn shapes_to_display(s: &Option<(Vec<usize>, Vec<usize>)>) -> String {
        match s {
            Some((image, label)) => format!("image {image:?}, label {label:?}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Path `{}`:", p.name)?;
    writeln!(w, "{S4}Transforms: {}", p.pipeline.join(" -> "))?;
    writeln!(w, "{S4}Train batches: {}", p.train_batches)?;
    writeln!(w, "{S4}Val batches: {}", p.val_batches)?;
    writeln!(w, "{S4}First train batch: {}", shapes_to_display(&p.train_first))?;
    writeln!(w, "{S4}First val batch: {}", shapes_to_display(&p.val_first))?;
    if let Some((train, val)) = p.slices {
        writeln!(w, "{S4}Slices: {train} train, {val} val")?;
    }
    write!(w, "{S4}Failed checks: {}", p.failures)?;
    Ok(())
}

/// 所有加载路径的概况.
pub struct InspectReport {
    data: Vec<PathSummary>,
}

impl InspectReport {
    pub fn from_iter<I: IntoIterator<Item = PathSummary>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 打印概况.
    pub fn analyze(&self) {
        utils::sep();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for summary in self.data.iter() {
            if let Err(e) = describe_into(summary, &mut out).and_then(|()| writeln!(out)) {
                log::error!("cannot write report: {e}");
                return;
            }
            let _ = utils::sep_to(&mut out);
        }
    }
}
