//! Progress bar for a run.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a bar counting completed jobs out of `total`.
///
/// Draws to stderr; returns a hidden bar when `visible` is false.
pub fn job_progress(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        let pb = ProgressBar::hidden();
        pb.set_length(total);
        return pb;
    }

    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => tracing::debug!("Falling back to default progress style: {}", e),
    }
    pb
}
