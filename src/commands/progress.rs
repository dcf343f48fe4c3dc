//! Progress bars for page-oriented NVM operations

use indicatif::{ProgressBar, ProgressStyle};
use updiprog_core::device::MemoryKind;
use updiprog_core::progress::{NvmOperation, PageProgress};

/// Create a page progress bar with a phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} pages ({{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
///
/// The bar length is the number of pages that hold data and it only moves
/// on those, so mostly empty images do not stall and then jump.
pub struct IndicatifProgress {
    quiet: bool,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    /// Create a reporter; `quiet` suppresses all bars
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            current_bar: None,
        }
    }
}

impl PageProgress for IndicatifProgress {
    fn begin(&mut self, op: NvmOperation, kind: MemoryKind, total_pages: usize, data_pages: usize) {
        if self.quiet {
            return;
        }
        // Reads touch every page
        let total = match op {
            NvmOperation::Read => total_pages,
            NvmOperation::Write | NvmOperation::Verify => data_pages,
        };
        let phase = format!("{} {}", op.verb(), kind);
        let pb = create_progress_bar_with_phase(total as u64, &phase)
            .unwrap_or_else(|_| ProgressBar::new(total as u64));
        self.current_bar = Some(pb);
    }

    fn page(&mut self, _index: usize, has_data: bool) {
        if !has_data {
            return;
        }
        if let Some(pb) = &self.current_bar {
            pb.inc(1);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
    }
}
