use std::time::Duration;

/// Render `duration` as `mm:ss`, or `h:mm:ss` from one hour up.
/// Fractions of a second are dropped.
pub(crate) fn format_elapsed(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
