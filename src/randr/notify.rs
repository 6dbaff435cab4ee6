//! RandR change notifications
//!
//! Each registration opens its own connection and runs a watcher thread that
//! turns RandR events into `ChangeFlags`. The thread is woken for shutdown by
//! a ClientMessage sent to a private InputOnly window.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt, NotifyMask};
use x11rb::protocol::xproto::{
    Atom, ClientMessageData, ClientMessageEvent, ConnectionExt as XprotoExt, CreateWindowAux,
    EventMask, Window, WindowClass, CLIENT_MESSAGE_EVENT,
};
use x11rb::rust_connection::RustConnection;

use crate::constants::x11;
use crate::error::PlatformError;
use crate::platform::{ChangeFlags, ChangeNotifier, PlatformResult, ReconfigurationCallback};
use crate::types::DisplayId;

const WAKE_ATOM: &[u8] = b"_RESOLUTION_CHANGE_WAKE";

/// Reported for screen-wide changes when no output is known
const SCREEN_WIDE: DisplayId = DisplayId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputState {
    connected: bool,
    crtc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CrtcState {
    x: i16,
    y: i16,
    mode: u32,
}

/// Last known output and CRTC state, used to classify incoming changes
#[derive(Debug, Default)]
struct ChangeTracker {
    outputs: HashMap<u32, OutputState>,
    crtcs: HashMap<u32, CrtcState>,
}

impl ChangeTracker {
    fn output_change(&mut self, output: u32, connected: bool, crtc: u32) -> ChangeFlags {
        let previous = self.outputs.insert(output, OutputState { connected, crtc });
        let mut flags = ChangeFlags::NONE;
        let (was_connected, had_crtc) = match previous {
            Some(state) => (state.connected, state.crtc != x11rb::NONE),
            None => (false, false),
        };
        if connected && !was_connected {
            flags |= ChangeFlags::ADD;
        }
        if !connected && was_connected {
            flags |= ChangeFlags::REMOVE;
        }
        let has_crtc = crtc != x11rb::NONE;
        if has_crtc && !had_crtc {
            flags |= ChangeFlags::ENABLED;
        }
        if !has_crtc && had_crtc {
            flags |= ChangeFlags::DISABLED;
        }
        flags
    }

    fn crtc_change(&mut self, crtc: u32, x: i16, y: i16, mode: u32) -> ChangeFlags {
        let previous = self.crtcs.insert(crtc, CrtcState { x, y, mode });
        match previous {
            None => ChangeFlags::SET_MODE,
            Some(state) => {
                let mut flags = ChangeFlags::NONE;
                if state.mode != mode {
                    flags |= ChangeFlags::SET_MODE;
                }
                if (state.x, state.y) != (x, y) {
                    flags |= ChangeFlags::MOVED;
                }
                flags
            }
        }
    }

    /// Outputs driven by `crtc`, or the screen-wide id if none are known
    fn displays_on_crtc(&self, crtc: u32) -> Vec<DisplayId> {
        let mut displays: Vec<DisplayId> = self
            .outputs
            .iter()
            .filter(|(_, state)| state.connected && state.crtc == crtc)
            .map(|(&output, _)| DisplayId(output))
            .collect();
        displays.sort();
        if displays.is_empty() {
            displays.push(SCREEN_WIDE);
        }
        displays
    }

    fn connected_displays(&self) -> Vec<DisplayId> {
        let mut displays: Vec<DisplayId> = self
            .outputs
            .iter()
            .filter(|(_, state)| state.connected)
            .map(|(&output, _)| DisplayId(output))
            .collect();
        displays.sort();
        if displays.is_empty() {
            displays.push(SCREEN_WIDE);
        }
        displays
    }

    fn translate(&mut self, event: &Event) -> Vec<(DisplayId, ChangeFlags)> {
        match event {
            Event::RandrScreenChangeNotify(_) => {
                let flags = ChangeFlags::BEGIN_CONFIGURATION | ChangeFlags::DESKTOP_SHAPE_CHANGED;
                self.connected_displays()
                    .into_iter()
                    .map(|display| (display, flags))
                    .collect()
            }
            Event::RandrNotify(notify) if notify.sub_code == randr::Notify::OUTPUT_CHANGE => {
                let change = notify.u.as_oc();
                let connected = change.connection == randr::Connection::CONNECTED;
                let flags = self.output_change(change.output, connected, change.crtc);
                if flags.is_empty() {
                    return Vec::new();
                }
                vec![(DisplayId(change.output), flags)]
            }
            Event::RandrNotify(notify) if notify.sub_code == randr::Notify::CRTC_CHANGE => {
                let change = notify.u.as_cc();
                let flags = self.crtc_change(change.crtc, change.x, change.y, change.mode);
                if flags.is_empty() {
                    return Vec::new();
                }
                self.displays_on_crtc(change.crtc)
                    .into_iter()
                    .map(|display| (display, flags))
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Record the current outputs and CRTCs so the first events classify correctly
fn seed_tracker(conn: &RustConnection, root: Window) -> ChangeTracker {
    let mut tracker = ChangeTracker::default();
    let resources = match conn
        .randr_get_screen_resources_current(root)
        .map_err(anyhow::Error::from)
        .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from))
    {
        Ok(resources) => resources,
        Err(e) => {
            warn!(error = %e, "Failed to read initial RandR state");
            return tracker;
        }
    };
    for &output in &resources.outputs {
        if let Ok(cookie) = conn.randr_get_output_info(output, resources.config_timestamp)
            && let Ok(info) = cookie.reply()
        {
            tracker.output_change(
                output,
                info.connection == randr::Connection::CONNECTED,
                info.crtc,
            );
        }
    }
    for &crtc in &resources.crtcs {
        if let Ok(cookie) = conn.randr_get_crtc_info(crtc, resources.config_timestamp)
            && let Ok(info) = cookie.reply()
        {
            tracker.crtc_change(crtc, info.x, info.y, info.mode);
        }
    }
    debug!(
        outputs = tracker.outputs.len(),
        crtcs = tracker.crtcs.len(),
        "Seeded RandR change tracker"
    );
    tracker
}

struct Watcher {
    context: u64,
    conn: Arc<RustConnection>,
    window: Window,
    wake_atom: Atom,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Watcher {
    fn start(
        display_name: Option<&str>,
        callback: ReconfigurationCallback,
        context: u64,
    ) -> anyhow::Result<Self> {
        let (conn, screen_num) = x11rb::connect(display_name)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow::anyhow!("X server has no screen {screen_num}"))?
            .root;
        conn.randr_query_version(x11::RANDR_MAJOR, x11::RANDR_MINOR)?
            .reply()?;

        let window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?
        .check()?;
        let wake_atom = conn.intern_atom(false, WAKE_ATOM)?.reply()?.atom;
        conn.randr_select_input(
            root,
            NotifyMask::SCREEN_CHANGE | NotifyMask::CRTC_CHANGE | NotifyMask::OUTPUT_CHANGE,
        )?
        .check()?;

        let mut tracker = seed_tracker(&conn, root);
        conn.flush()?;

        let conn = Arc::new(conn);
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let conn = conn.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                info!(context, "RandR watcher started");
                loop {
                    let event = match conn.wait_for_event() {
                        Ok(event) => event,
                        Err(e) => {
                            if !stop.load(Ordering::SeqCst) {
                                error!(error = %e, "RandR watcher connection failed");
                            }
                            break;
                        }
                    };
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    for (display, flags) in tracker.translate(&event) {
                        callback(display, flags, context);
                    }
                }
                info!(context, "RandR watcher stopped");
            })
        };

        Ok(Self {
            context,
            conn,
            window,
            wake_atom,
            stop,
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.window,
            type_: self.wake_atom,
            data: ClientMessageData::from([0u32; 5]),
        };
        let woken = self
            .conn
            .send_event(false, self.window, EventMask::NO_EVENT, event)
            .map_err(anyhow::Error::from)
            .and_then(|_| self.conn.flush().map_err(anyhow::Error::from));
        report_step(self.context, "wake RandR watcher", woken);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!(context = self.context, "RandR watcher thread panicked");
        }
        let destroyed = self
            .conn
            .destroy_window(self.window)
            .map_err(anyhow::Error::from)
            .and_then(|_| self.conn.flush().map_err(anyhow::Error::from));
        report_step(self.context, "destroy RandR watcher window", destroyed);
    }
}

/// Log a failed shutdown step; shutdown carries on either way
fn report_step(context: u64, step: &str, result: anyhow::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(context, step, error = %e, "RandR watcher shutdown step failed");
            false
        }
    }
}

/// RandR-backed `ChangeNotifier`
pub struct RandrNotifier {
    display_name: Option<String>,
    watchers: Vec<Watcher>,
}

impl RandrNotifier {
    pub fn new(display_name: Option<String>) -> Self {
        Self {
            display_name,
            watchers: Vec::new(),
        }
    }
}

impl ChangeNotifier for RandrNotifier {
    fn register(&mut self, callback: ReconfigurationCallback, context: u64) -> PlatformResult<()> {
        let watcher = Watcher::start(self.display_name.as_deref(), callback, context)
            .map_err(|e| PlatformError::Connection(format!("{e:#}")))?;
        self.watchers.push(watcher);
        Ok(())
    }

    fn unregister(&mut self, _callback: ReconfigurationCallback, context: u64) {
        let (mut stopping, keep): (Vec<Watcher>, Vec<Watcher>) = self
            .watchers
            .drain(..)
            .partition(|watcher| watcher.context == context);
        self.watchers = keep;
        for watcher in &mut stopping {
            watcher.stop();
        }
    }
}

impl Drop for RandrNotifier {
    fn drop(&mut self) {
        for watcher in &mut self.watchers {
            watcher.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_step() {
        assert!(report_step(1, "destroy RandR watcher window", Ok(())));
        assert!(!report_step(
            1,
            "destroy RandR watcher window",
            Err(anyhow::anyhow!("connection closed"))
        ));
    }

    #[test]
    fn test_output_connect_and_disconnect() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.output_change(70, true, 0), ChangeFlags::ADD);
        assert_eq!(tracker.output_change(70, true, 0), ChangeFlags::NONE);
        assert_eq!(tracker.output_change(70, false, 0), ChangeFlags::REMOVE);
    }

    #[test]
    fn test_output_enable_disable() {
        let mut tracker = ChangeTracker::default();
        tracker.output_change(70, true, 0);
        assert_eq!(tracker.output_change(70, true, 63), ChangeFlags::ENABLED);
        assert_eq!(
            tracker.output_change(70, false, 0),
            ChangeFlags::REMOVE | ChangeFlags::DISABLED
        );
    }

    #[test]
    fn test_new_output_connected_with_crtc() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(
            tracker.output_change(71, true, 64),
            ChangeFlags::ADD | ChangeFlags::ENABLED
        );
        assert!(tracker.output_change(72, false, 0).is_empty());
    }

    #[test]
    fn test_crtc_mode_and_position() {
        let mut tracker = ChangeTracker::default();
        tracker.crtc_change(63, 0, 0, 0x4a);
        assert_eq!(tracker.crtc_change(63, 0, 0, 0x4b), ChangeFlags::SET_MODE);
        assert_eq!(tracker.crtc_change(63, 1920, 0, 0x4b), ChangeFlags::MOVED);
        assert_eq!(tracker.crtc_change(63, 1920, 0, 0x4b), ChangeFlags::NONE);
        // Mode-only changes never request a refresh on their own
        assert!(!ChangeFlags::SET_MODE.requests_refresh());
        assert!(!ChangeFlags::MOVED.requests_refresh());
    }

    #[test]
    fn test_unknown_crtc_reports_set_mode() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.crtc_change(99, 0, 0, 1), ChangeFlags::SET_MODE);
    }

    #[test]
    fn test_displays_on_crtc() {
        let mut tracker = ChangeTracker::default();
        tracker.output_change(70, true, 63);
        tracker.output_change(71, true, 63);
        tracker.output_change(72, true, 64);
        tracker.output_change(73, false, 63);
        assert_eq!(tracker.displays_on_crtc(63), vec![DisplayId(70), DisplayId(71)]);
        assert_eq!(tracker.displays_on_crtc(99), vec![SCREEN_WIDE]);
    }

    #[test]
    fn test_connected_displays() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.connected_displays(), vec![SCREEN_WIDE]);
        tracker.output_change(72, true, 0);
        tracker.output_change(70, true, 63);
        tracker.output_change(71, false, 0);
        assert_eq!(tracker.connected_displays(), vec![DisplayId(70), DisplayId(72)]);
    }

    #[test]
    fn test_screen_change_reports_every_connected_display() {
        let mut tracker = ChangeTracker::default();
        tracker.output_change(71, true, 64);
        tracker.output_change(70, true, 63);
        let event = Event::RandrScreenChangeNotify(randr::ScreenChangeNotifyEvent::default());
        let flags = ChangeFlags::BEGIN_CONFIGURATION | ChangeFlags::DESKTOP_SHAPE_CHANGED;
        assert_eq!(
            tracker.translate(&event),
            vec![(DisplayId(70), flags), (DisplayId(71), flags)]
        );
    }

    #[test]
    fn test_crtc_notify_fans_out_to_outputs() {
        let mut tracker = ChangeTracker::default();
        tracker.output_change(70, true, 63);
        tracker.crtc_change(63, 0, 0, 0x4a);
        let change = randr::CrtcChange {
            crtc: 63,
            mode: 0x4b,
            ..randr::CrtcChange::default()
        };
        let event = Event::RandrNotify(randr::NotifyEvent {
            response_type: 1,
            sub_code: randr::Notify::CRTC_CHANGE,
            sequence: 0,
            u: randr::NotifyData::from(change),
        });
        assert_eq!(
            tracker.translate(&event),
            vec![(DisplayId(70), ChangeFlags::SET_MODE)]
        );
        // Same state again is not a change
        assert!(tracker.translate(&event).is_empty());
    }
}
