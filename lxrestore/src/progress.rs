//! Download progress accounting
//!
//! [`ProgressState`] counts bytes copied from the object stream. The fetcher
//! passes it to a [`TransferProgress`] after every chunk; renderers live outside
//! this crate (the `lxrestore` binary draws an indicatif bar).

/// Byte counters for one transfer.
///
/// `transferred` never decreases and never exceeds `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    total: u64,
    transferred: u64,
}

/// Returned by [`ProgressState::advance`] when a chunk would exceed the total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrun {
    pub total: u64,
    pub attempted: u64,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            transferred: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.transferred
    }

    pub fn is_complete(&self) -> bool {
        self.transferred == self.total
    }

    /// Records `n` more bytes. Leaves the state unchanged if the total would be exceeded.
    pub fn advance(&mut self, n: u64) -> Result<(), Overrun> {
        let attempted = self.transferred.saturating_add(n);
        if attempted > self.total {
            return Err(Overrun {
                total: self.total,
                attempted,
            });
        }
        self.transferred = attempted;
        Ok(())
    }
}

/// Receives progress updates from the fetcher.
///
/// Implementations are called on the copy loop, once per chunk, and must return quickly.
pub trait TransferProgress {
    /// Called once, after the object size is known and before the first chunk.
    fn begin(&mut self, total: u64);

    /// Called after each chunk is written to the local archive.
    fn advance(&mut self, state: &ProgressState);

    /// Called once when the copy ends. `completed` is false if the copy failed.
    fn finish(&mut self, completed: bool);
}

/// Progress sink that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn begin(&mut self, _total: u64) {}

    fn advance(&mut self, _state: &ProgressState) {}

    fn finish(&mut self, _completed: bool) {}
}

impl<T: TransferProgress + ?Sized> TransferProgress for &mut T {
    fn begin(&mut self, total: u64) {
        (**self).begin(total);
    }

    fn advance(&mut self, state: &ProgressState) {
        (**self).advance(state);
    }

    fn finish(&mut self, completed: bool) {
        (**self).finish(completed);
    }
}

/// Formats a byte count with binary units, e.g. "1.5 MiB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut state = ProgressState::new(10);
        state.advance(4).unwrap();
        state.advance(0).unwrap();
        state.advance(6).unwrap();
        assert_eq!(state.transferred(), 10);
        assert!(state.is_complete());
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn advance_past_total_is_rejected() {
        let mut state = ProgressState::new(10);
        state.advance(8).unwrap();
        let err = state.advance(3).unwrap_err();
        assert_eq!(
            err,
            Overrun {
                total: 10,
                attempted: 11
            }
        );
        assert_eq!(state.transferred(), 8, "state unchanged after overrun");
    }

    #[test]
    fn empty_object_is_complete() {
        let state = ProgressState::new(0);
        assert!(state.is_complete());
    }

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(1_048_576), "1.0 MiB");
        assert_eq!(format_bytes(1_610_612_736), "1.5 GiB");
    }
}
