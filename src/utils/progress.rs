use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar that draws nothing unless `visible`.
pub fn bar(len: u64, visible: bool, message: &'static str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    ProgressBar::new(len).with_style(style).with_message(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_still_counts() {
        let progress = bar(4, false, "scoring screenshots");
        progress.inc(3);
        assert_eq!(progress.position(), 3);
        assert!(progress.is_hidden());
    }
}
