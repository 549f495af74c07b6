//! Terminal rendering of conversion progress.

use convertkit_core::outcome::ConversionOutcome;

/// Render a fixed-width progress bar, e.g. `[#####-----]  50.0%`.
pub fn progress_bar(percent: f32, width: usize) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f32).round() as usize;
    format!(
        "[{}{}] {:>5.1}%",
        "#".repeat(filled),
        "-".repeat(width - filled.min(width)),
        clamped
    )
}

/// One status line for an outcome.
pub fn status_line(outcome: &ConversionOutcome, width: usize) -> String {
    match outcome {
        ConversionOutcome::Pending { percent } => format!("Converting {}", progress_bar(*percent, width)),
        ConversionOutcome::Succeeded { download_location } => {
            format!("Done {} {download_location}", progress_bar(100.0, width))
        }
        ConversionOutcome::Failed { message, .. } => format!("Failed: {message}"),
    }
}

/// Control sequence that returns to column 0 and erases the whole line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// `line` prefixed so it replaces whatever the previous redraw left,
/// including the tail of a longer line.
pub fn redraw(line: &str) -> String {
    format!("{CLEAR_LINE}{line}")
}
