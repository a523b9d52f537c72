//! Offset pagination shared by the search, worklog and comment endpoints.

/// Returns the `startAt` of the following page, or `None` once `total` is reached or a page came back empty.
pub fn next_start(start_at: u32, received: usize, total: u32) -> Option<u32> {
    if received == 0 {
        return None;
    }
    let next = start_at.saturating_add(received as u32);
    (next < total).then_some(next)
}
