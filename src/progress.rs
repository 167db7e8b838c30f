//! Progress indicators for the fwsync CLI.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar over `len` steps, labelled with `msg` until the first step.
pub fn bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb
}
