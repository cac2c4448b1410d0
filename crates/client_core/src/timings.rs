use std::time::Duration;

/// Client-side transition windows. These mirror the stylesheet's
/// transition durations; they are not part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub close_transition: Duration,
    pub notice_dismiss: Duration,
    pub row_highlight: Duration,
    pub row_delete_delay: Duration,
    pub row_fade: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            close_transition: Duration::from_millis(300),
            notice_dismiss: Duration::from_secs(5),
            row_highlight: Duration::from_secs(2),
            row_delete_delay: Duration::from_millis(300),
            row_fade: Duration::from_millis(400),
        }
    }
}
