//! Shared stderr between indicatif bars and tracing output.
//!
//! While a bar is drawn it is registered in [`ActiveBar`]. [`SuspendingWriter`]
//! writes each log event inside `ProgressBar::suspend` of that bar, so the bar
//! is cleared before the line is written and redrawn after.

use std::{io, sync::Arc};

use indicatif::ProgressBar;
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// The bar currently drawn on stderr, if any. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct ActiveBar {
    slot: Arc<Mutex<Option<ProgressBar>>>,
}

impl ActiveBar {
    pub fn set(&self, bar: &ProgressBar) {
        *self.slot.lock() = Some(bar.clone());
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Runs `f` with the active bar hidden.
    pub fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        // the lock is released before drawing
        let bar = self.slot.lock().clone();
        match bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }
}

/// `MakeWriter` for the fmt layer that writes around the active bar.
pub struct SuspendingWriter<W> {
    active: ActiveBar,
    inner: W,
}

impl<W> SuspendingWriter<W> {
    pub fn new(active: ActiveBar, inner: W) -> Self {
        Self { active, inner }
    }
}

impl<'a, W: MakeWriter<'a>> MakeWriter<'a> for SuspendingWriter<W> {
    type Writer = SuspendedWrite<W::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedWrite {
            active: self.active.clone(),
            inner: self.inner.make_writer(),
        }
    }
}

pub struct SuspendedWrite<W> {
    active: ActiveBar,
    inner: W,
}

impl<W: io::Write> io::Write for SuspendedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        self.active.suspend(|| inner.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let inner = &mut self.inner;
        self.active.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use lxrestore::prelude::*;

    use super::*;
    use crate::cli::render::SpinnerStatus;

    /// Records each log write with whether a bar was registered at the time.
    #[derive(Clone, Default)]
    struct CapturedLog {
        active: ActiveBar,
        writes: Arc<Mutex<Vec<(bool, String)>>>,
    }

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.lock().push((
                self.active.is_active(),
                String::from_utf8_lossy(buf).into_owned(),
            ));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn subscriber(
        active: &ActiveBar,
        log: &CapturedLog,
    ) -> impl tracing::Subscriber + Send + Sync + 'static {
        let sink = log.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(SuspendingWriter::new(active.clone(), move || sink.clone()))
            .finish()
    }

    #[test]
    fn logs_while_spinner_runs_are_written_around_it() {
        let active = ActiveBar::default();
        let log = CapturedLog {
            active: active.clone(),
            ..CapturedLog::default()
        };
        let mut status = SpinnerStatus::new(false, active.clone());

        tracing::subscriber::with_default(subscriber(&active, &log), || {
            status.start("Launching instance (u2)");
            tracing::info!(archive = "/stage/b.tar.gz", "imported archive");
            status.tick();
            status.stop(&UiOutcome::Succeeded);
            tracing::info!("restore finished");
        });

        let writes = log.writes.lock().clone();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].0, "spinner registered while running");
        assert!(writes[0].1.contains("imported archive"), "{}", writes[0].1);
        assert!(!writes[1].0, "spinner released after stop");
        assert!(!active.is_active());
    }

    #[test]
    fn suspend_without_bar_runs_directly() {
        let active = ActiveBar::default();
        assert_eq!(active.suspend(|| 7), 7);

        let bar = ProgressBar::hidden();
        active.set(&bar);
        assert!(active.is_active());
        assert_eq!(active.suspend(|| 8), 8);
        active.clear();
        assert!(!active.is_active());
    }
}
