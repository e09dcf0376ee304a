//! Scene export handoff between the session thread and the owner thread.
//!
//! The session thread files a request and blocks; the owner thread notices
//! the request (by polling or through the signal channel), runs the export on
//! its own thread and publishes the result, which wakes the session.
//!
//! ```text
//!   session thread                     owner thread
//!   ──────────────                     ────────────
//!   request(kind) ──┐
//!     Idle → Requested ── signal ──▶  service(scene)
//!     wait ...                          Requested → Exporting
//!                                       scene.export(kind)
//!     ◀──────────── notify ───────────  Exporting → Published
//!   Published → Idle, return export
//! ```
//!
//! Only one request is outstanding at a time: a second requester waits for
//! the slot to return to `Idle`.

use crate::error::{Error, Result};
use crate::scene::{ExportKind, Scene, SceneExport};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use std::mem;

#[derive(Debug)]
enum Slot {
    Idle,
    Requested(ExportKind),
    Exporting,
    Published(SceneExport),
}

#[derive(Debug)]
struct HandoffState {
    slot: Slot,
    closed: bool,
}

/// One-shot request/response rendezvous for scene exports
#[derive(Debug)]
pub struct ExportHandoff {
    state: Mutex<HandoffState>,
    changed: Condvar,
    signal_tx: Sender<ExportKind>,
    signal_rx: Receiver<ExportKind>,
}

impl Default for ExportHandoff {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportHandoff {
    pub fn new() -> Self {
        // One slot: at most one request is outstanding
        let (signal_tx, signal_rx) = crossbeam_channel::bounded(1);
        Self {
            state: Mutex::new(HandoffState {
                slot: Slot::Idle,
                closed: false,
            }),
            changed: Condvar::new(),
            signal_tx,
            signal_rx,
        }
    }

    /// Request an export and block until the owner thread publishes it.
    ///
    /// Called from the session thread. Fails with [`Error::HandoffClosed`]
    /// once [`close`](Self::close) has been called.
    pub fn request(&self, kind: ExportKind) -> Result<SceneExport> {
        let mut state = self.state.lock();

        while !state.closed && !matches!(state.slot, Slot::Idle) {
            self.changed.wait(&mut state);
        }
        if state.closed {
            return Err(Error::HandoffClosed);
        }

        state.slot = Slot::Requested(kind);
        self.signal(kind);
        self.changed.notify_all();
        debug!("Export of {:?} requested from owner thread", kind);

        loop {
            if state.closed {
                state.slot = Slot::Idle;
                self.changed.notify_all();
                return Err(Error::HandoffClosed);
            }
            if matches!(state.slot, Slot::Published(_))
                && let Slot::Published(export) = mem::replace(&mut state.slot, Slot::Idle)
            {
                self.changed.notify_all();
                return Ok(export);
            }
            self.changed.wait(&mut state);
        }
    }

    /// Kind of the request waiting for the owner thread, if any.
    pub fn pending(&self) -> Option<ExportKind> {
        match self.state.lock().slot {
            Slot::Requested(kind) => Some(kind),
            _ => None,
        }
    }

    /// Run a pending export on the calling (owner) thread and publish it.
    ///
    /// Returns false when nothing was requested.
    pub fn service<S: Scene + ?Sized>(&self, scene: &mut S) -> bool {
        let kind = {
            let mut state = self.state.lock();
            match state.slot {
                Slot::Requested(kind) => {
                    state.slot = Slot::Exporting;
                    kind
                }
                _ => return false,
            }
        };

        // Lock released while the scene exports
        let export = scene.export(kind);
        trace!("Owner thread exported {:?} ({} bytes)", kind, export.byte_len());

        let mut state = self.state.lock();
        state.slot = Slot::Published(export);
        self.changed.notify_all();
        true
    }

    /// Receiver that yields one item per request, for owner loops that
    /// `select!` on it instead of polling [`pending`](Self::pending).
    pub fn signals(&self) -> Receiver<ExportKind> {
        self.signal_rx.clone()
    }

    /// Wake every waiter with [`Error::HandoffClosed`] and refuse new
    /// requests.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn signal(&self, kind: ExportKind) {
        // Full means an earlier signal is still undrained; the owner
        // services the slot, not the signal payload.
        if let Err(TrySendError::Full(_)) = self.signal_tx.try_send(kind) {
            trace!("Export signal already queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingScene {
        exports: usize,
    }

    impl Scene for CountingScene {
        fn export_metadata(&mut self) -> Vec<u8> {
            self.exports += 1;
            format!("export-{}", self.exports).into_bytes()
        }

        fn export_objects(&mut self) -> Vec<Vec<u8>> {
            self.exports += 1;
            vec![vec![self.exports as u8; 4]]
        }

        fn apply_camera_state(&mut self, _state: &CameraState) {}

        fn request_redraw(&mut self) {}
    }

    /// Service requests on the current thread until `done` reaches `target`.
    fn serve_until(
        handoff: &ExportHandoff,
        scene: &mut CountingScene,
        done: &AtomicUsize,
        target: usize,
    ) {
        while done.load(Ordering::SeqCst) < target {
            if !handoff.service(scene) {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[test]
    fn test_service_without_request_is_noop() {
        let handoff = ExportHandoff::new();
        let mut scene = CountingScene::default();
        assert!(handoff.pending().is_none());
        assert!(!handoff.service(&mut scene));
        assert_eq!(scene.exports, 0);
    }

    #[test]
    fn test_request_blocks_until_published() {
        let handoff = Arc::new(ExportHandoff::new());
        let done = Arc::new(AtomicUsize::new(0));

        let requester = {
            let handoff = Arc::clone(&handoff);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let export = handoff.request(ExportKind::Metadata).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
                export
            })
        };

        while handoff.pending().is_none() {
            thread::sleep(Duration::from_millis(1));
        }
        // The requester cannot finish before the owner services the slot
        thread::sleep(Duration::from_millis(20));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(handoff.pending(), Some(ExportKind::Metadata));
        assert_eq!(handoff.signals().try_recv().unwrap(), ExportKind::Metadata);

        let mut scene = CountingScene::default();
        serve_until(&handoff, &mut scene, &done, 1);

        let export = requester.join().unwrap();
        assert_eq!(export, SceneExport::Metadata(b"export-1".to_vec()));
        assert!(handoff.pending().is_none());
    }

    #[test]
    fn test_each_request_gets_fresh_export() {
        let handoff = Arc::new(ExportHandoff::new());
        let done = Arc::new(AtomicUsize::new(0));

        let requester = {
            let handoff = Arc::clone(&handoff);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let first = handoff.request(ExportKind::Metadata).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
                let second = handoff.request(ExportKind::Objects).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
                (first, second)
            })
        };

        let mut scene = CountingScene::default();
        serve_until(&handoff, &mut scene, &done, 2);

        let (first, second) = requester.join().unwrap();
        assert_eq!(first, SceneExport::Metadata(b"export-1".to_vec()));
        assert_eq!(second, SceneExport::Objects(vec![vec![2; 4]]));
        assert_eq!(scene.exports, 2);
    }

    #[test]
    fn test_concurrent_requests_are_serialized() {
        let handoff = Arc::new(ExportHandoff::new());
        let done = Arc::new(AtomicUsize::new(0));

        let requesters: Vec<_> = (0..4)
            .map(|_| {
                let handoff = Arc::clone(&handoff);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let export = handoff.request(ExportKind::Metadata).unwrap();
                    done.fetch_add(1, Ordering::SeqCst);
                    export
                })
            })
            .collect();

        let mut scene = CountingScene::default();
        serve_until(&handoff, &mut scene, &done, 4);

        let mut seen: Vec<Vec<u8>> = requesters
            .into_iter()
            .map(|h| match h.join().unwrap() {
                SceneExport::Metadata(bytes) => bytes,
                other => panic!("unexpected export {:?}", other),
            })
            .collect();
        seen.sort();
        seen.dedup();

        // Every requester received its own export
        assert_eq!(seen.len(), 4);
        assert_eq!(scene.exports, 4);
    }

    #[test]
    fn test_close_wakes_blocked_requester() {
        let handoff = Arc::new(ExportHandoff::new());

        let requester = {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || handoff.request(ExportKind::Objects))
        };

        while handoff.pending().is_none() {
            thread::sleep(Duration::from_millis(1));
        }
        handoff.close();

        assert!(matches!(
            requester.join().unwrap(),
            Err(Error::HandoffClosed)
        ));
        assert!(handoff.is_closed());
        assert!(matches!(
            handoff.request(ExportKind::Metadata),
            Err(Error::HandoffClosed)
        ));
    }
}
