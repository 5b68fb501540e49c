use indicatif::{ProgressBar, ProgressStyle};

pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{bar:30.cyan/dim}] {percent}% ({pos}/{len}) {elapsed_precise} - {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█░░");
    pb.set_style(style);
    pb
}

/// Adapts a bar to the engines' `(current, total, message)` callback.
pub fn progress_callback(pb: ProgressBar) -> impl Fn(usize, usize, &str) + Send + Sync {
    move |current, total, msg| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
        let display = if msg.len() > 40 {
            let mut end = 40;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            &msg[..end]
        } else {
            msg
        };
        pb.set_message(display.to_string());
    }
}
