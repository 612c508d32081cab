//! Worktree ID and port allocation
//!
//! Pure functions over discovered state. Nothing is reserved: two
//! concurrent `add` runs can compute the same ID, and git refusing to
//! create an existing `task-<id>` directory is the only backstop.

/// Next free worktree ID
///
/// One past the larger of the highest live ID and the recorded
/// high-water mark, so IDs of removed worktrees are never handed out
/// again. `1` for a fresh project.
pub fn next_worktree_id(existing_ids: impl IntoIterator<Item = u32>, high_water: u32) -> u32 {
    existing_ids
        .into_iter()
        .max()
        .unwrap_or(0)
        .max(high_water)
        .saturating_add(1)
}

/// Port for worktree `id`: `main_port + id`, or `None` past 65535
pub fn port_for(main_port: u16, id: u32) -> Option<u16> {
    u32::from(main_port)
        .checked_add(id)
        .and_then(|port| u16::try_from(port).ok())
}
