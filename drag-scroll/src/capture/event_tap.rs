//! Quartz Event Tap Handler
//!
//! Listen-only CGEventTap on a dedicated CFRunLoop thread. Flag changes are
//! reduced to trigger key transitions and pointer motion (plain or while a
//! button is held) to absolute positions, stamped with the event's own
//! mach timestamp.
//!
//! # Permissions
//!
//! Requires Accessibility permissions in System Settings > Privacy & Security.

use super::event_queue::EventProducer;
use super::source::EventSource;
use super::types::{InputEvent, TriggerKey};
use crate::time::{Timebase, Timestamp};
use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
use core_foundation::runloop::kCFRunLoopCommonModes;
use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

type CGEventRef = CFTypeRef;
type CGEventTapProxy = *const c_void;
type CGEventMask = u64;

#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code)]
enum CGEventTapLocation {
    Hid = 0,
    Session = 1,
}

#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code)]
enum CGEventTapPlacement {
    HeadInsert = 0,
    TailAppend = 1,
}

#[repr(u32)]
#[derive(Copy, Clone)]
#[allow(dead_code)]
enum CGEventTapOptions {
    Default = 0,
    ListenOnly = 1,
}

const CG_EVENT_MOUSE_MOVED: u32 = 5;
const CG_EVENT_LEFT_MOUSE_DRAGGED: u32 = 6;
const CG_EVENT_RIGHT_MOUSE_DRAGGED: u32 = 7;
const CG_EVENT_FLAGS_CHANGED: u32 = 12;
const CG_EVENT_OTHER_MOUSE_DRAGGED: u32 = 27;
const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const START_TIMEOUT: Duration = Duration::from_secs(2);

fn create_event_mask() -> CGEventMask {
    (1 << CG_EVENT_MOUSE_MOVED)
        | (1 << CG_EVENT_LEFT_MOUSE_DRAGGED)
        | (1 << CG_EVENT_RIGHT_MOUSE_DRAGGED)
        | (1 << CG_EVENT_OTHER_MOUSE_DRAGGED)
        | (1 << CG_EVENT_FLAGS_CHANGED)
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef,
        user_info: *mut c_void,
    ) -> CFTypeRef;

    fn CGEventTapEnable(tap: CFTypeRef, enable: bool);
    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
    fn CGEventGetFlags(event: CGEventRef) -> u64;
    fn CGEventGetTimestamp(event: CGEventRef) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFTypeRef,
        port: CFTypeRef,
        order: i64,
    ) -> CFTypeRef;

    fn CFRunLoopGetCurrent() -> CFTypeRef;
    fn CFRunLoopAddSource(rl: CFTypeRef, source: CFTypeRef, mode: CFTypeRef);
    fn CFRunLoopRun();
    fn CFRunLoopStop(rl: CFTypeRef);
}

extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFTypeRef) -> bool;
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct CGPoint {
    x: f64,
    y: f64,
}

/// State shared with the C callback.
///
/// Safety: `producer` is only touched from the callback, which runs on the
/// single CFRunLoop thread. Creation and destruction happen on the owning
/// thread while the run loop is not running.
struct EventTapContext {
    producer: UnsafeCell<EventProducer>,
    running: Arc<AtomicBool>,
    trigger: TriggerKey,
    trigger_down: AtomicBool,
    event_count: AtomicU64,
    reenable_count: AtomicU64,
}

unsafe impl Sync for EventTapContext {}

static CONTEXT_PTR: AtomicPtr<EventTapContext> = AtomicPtr::new(ptr::null_mut());
static RUN_LOOP_PTR: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static TAP_PTR: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

/// Quartz event tap feeding the gesture engine.
pub struct EventTap {
    trigger: TriggerKey,
    thread_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl EventTap {
    pub fn new(trigger: TriggerKey) -> crate::Result<Self> {
        Timebase::init();
        Ok(Self {
            trigger,
            thread_handle: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn trigger(&self) -> TriggerKey {
        self.trigger
    }

    /// Events delivered to the queue so far.
    pub fn event_count(&self) -> u64 {
        let ctx = CONTEXT_PTR.load(Ordering::SeqCst);
        if ctx.is_null() {
            0
        } else {
            unsafe { (*ctx).event_count.load(Ordering::Relaxed) }
        }
    }

    fn release_context() -> Option<Box<EventTapContext>> {
        let ctx = CONTEXT_PTR.swap(ptr::null_mut(), Ordering::SeqCst);
        if ctx.is_null() {
            None
        } else {
            Some(unsafe { Box::from_raw(ctx) })
        }
    }
}

impl EventSource for EventTap {
    fn start(&mut self, producer: EventProducer) -> crate::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(crate::Error::Capture("Event tap already running".into()));
        }
        if !CONTEXT_PTR.load(Ordering::SeqCst).is_null() {
            self.running.store(false, Ordering::SeqCst);
            return Err(crate::Error::Capture(
                "Another event tap is active in this process".into(),
            ));
        }

        if !check_accessibility_permissions() {
            self.running.store(false, Ordering::SeqCst);
            return Err(crate::Error::PermissionDenied(
                "Accessibility access not granted. Enable it in System Settings > Privacy & Security > Accessibility".into(),
            ));
        }

        let context = Box::new(EventTapContext {
            producer: UnsafeCell::new(producer),
            running: Arc::clone(&self.running),
            trigger: self.trigger,
            trigger_down: AtomicBool::new(false),
            event_count: AtomicU64::new(0),
            reenable_count: AtomicU64::new(0),
        });
        CONTEXT_PTR.store(Box::into_raw(context), Ordering::SeqCst);

        let (ready_tx, ready_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("event-tap".into())
            .spawn(move || {
                if let Err(e) = run_event_tap_loop(ready_tx) {
                    error!("Event tap error: {}", e);
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                Self::release_context();
                self.running.store(false, Ordering::SeqCst);
                return Err(crate::Error::Capture(format!(
                    "Failed to spawn event tap thread: {}",
                    e
                )));
            }
        };
        self.thread_handle = Some(handle);

        let startup = ready_rx
            .recv_timeout(START_TIMEOUT)
            .unwrap_or_else(|_| Err(crate::Error::Capture("Event tap did not start".into())));
        if let Err(e) = startup {
            self.stop();
            return Err(e);
        }

        info!(trigger = %self.trigger, "Event tap started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) && self.thread_handle.is_none() {
            return;
        }

        let run_loop = RUN_LOOP_PTR.swap(ptr::null_mut(), Ordering::SeqCst);
        if !run_loop.is_null() {
            unsafe {
                CFRunLoopStop(run_loop as _);
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        match Self::release_context() {
            Some(ctx) => info!(
                events = ctx.event_count.load(Ordering::Relaxed),
                reenabled = ctx.reenable_count.load(Ordering::Relaxed),
                "Event tap stopped"
            ),
            None => info!("Event tap stopped"),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "quartz-event-tap"
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.stop();
    }
}

extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    _user_info: *mut c_void,
) -> CGEventRef {
    let ctx = CONTEXT_PTR.load(Ordering::SeqCst);
    if ctx.is_null() {
        return event;
    }
    let context = unsafe { &*ctx };
    if !context.running.load(Ordering::Relaxed) {
        return event;
    }

    match event_type {
        CG_EVENT_TAP_DISABLED_BY_TIMEOUT | CG_EVENT_TAP_DISABLED_BY_USER_INPUT => {
            let tap = TAP_PTR.load(Ordering::SeqCst);
            if !tap.is_null() {
                unsafe { CGEventTapEnable(tap as CFTypeRef, true) };
                context.reenable_count.fetch_add(1, Ordering::Relaxed);
                warn!(event_type, "Event tap was disabled by the system; re-enabled");
            }
        }
        CG_EVENT_FLAGS_CHANGED => {
            let flags = unsafe { CGEventGetFlags(event) };
            let timestamp = Timestamp::from_mach_ticks(unsafe { CGEventGetTimestamp(event) });
            sync_trigger(context, flags, timestamp);
        }
        CG_EVENT_MOUSE_MOVED
        | CG_EVENT_LEFT_MOUSE_DRAGGED
        | CG_EVENT_RIGHT_MOUSE_DRAGGED
        | CG_EVENT_OTHER_MOUSE_DRAGGED => {
            let flags = unsafe { CGEventGetFlags(event) };
            let timestamp = Timestamp::from_mach_ticks(unsafe { CGEventGetTimestamp(event) });
            // Pointer events carry modifier state too; a lost flags-changed
            // event is repaired before the motion is delivered
            sync_trigger(context, flags, timestamp);
            let location = unsafe { CGEventGetLocation(event) };
            deliver(context, InputEvent::pointer(location.x, location.y, timestamp));
        }
        _ => {}
    }

    event
}

fn sync_trigger(context: &EventTapContext, flags: u64, timestamp: Timestamp) {
    let held = context.trigger.is_held_in(flags);
    if context.trigger_down.swap(held, Ordering::Relaxed) != held {
        trace!(held, "Trigger key transition");
        deliver(context, InputEvent::Trigger {
            down: held,
            timestamp,
        });
    }
}

fn deliver(context: &EventTapContext, event: InputEvent) {
    // Safety: only the run loop thread reaches this point
    let producer = unsafe { &mut *context.producer.get() };
    if producer.push(event) {
        context.event_count.fetch_add(1, Ordering::Relaxed);
    } else {
        trace!("Event queue full, dropping event");
    }
}

/// Disables and releases the tap on drop.
struct EventTapGuard(CFTypeRef);

impl Drop for EventTapGuard {
    fn drop(&mut self) {
        TAP_PTR.store(ptr::null_mut(), Ordering::SeqCst);
        unsafe {
            CGEventTapEnable(self.0, false);
            CFRelease(self.0);
        }
    }
}

/// Releases a CFRunLoopSource on drop.
struct RunLoopSourceGuard(CFTypeRef);

impl Drop for RunLoopSourceGuard {
    fn drop(&mut self) {
        unsafe {
            CFRelease(self.0);
        }
    }
}

/// Clears RUN_LOOP_PTR on drop.
struct RunLoopPtrGuard;

impl Drop for RunLoopPtrGuard {
    fn drop(&mut self) {
        RUN_LOOP_PTR.store(ptr::null_mut(), Ordering::SeqCst);
    }
}

fn run_event_tap_loop(ready: mpsc::Sender<crate::Result<()>>) -> crate::Result<()> {
    debug!("Event tap loop starting");

    let tap = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsert,
            CGEventTapOptions::ListenOnly,
            create_event_mask(),
            event_tap_callback,
            ptr::null_mut(),
        )
    };
    if tap.is_null() {
        let message =
            "Failed to create event tap. Ensure accessibility permissions are granted.".to_string();
        let _ = ready.send(Err(crate::Error::Capture(message.clone())));
        return Err(crate::Error::Capture(message));
    }
    let _tap_guard = EventTapGuard(tap);
    TAP_PTR.store(tap as *mut c_void, Ordering::SeqCst);

    let run_loop_source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
    if run_loop_source.is_null() {
        let message = "Failed to create run loop source".to_string();
        let _ = ready.send(Err(crate::Error::Capture(message.clone())));
        return Err(crate::Error::Capture(message));
    }
    let _source_guard = RunLoopSourceGuard(run_loop_source);

    let run_loop = unsafe { CFRunLoopGetCurrent() };
    RUN_LOOP_PTR.store(run_loop as *mut c_void, Ordering::SeqCst);
    let _ptr_guard = RunLoopPtrGuard;

    unsafe {
        CFRunLoopAddSource(
            run_loop,
            run_loop_source,
            kCFRunLoopCommonModes as CFTypeRef,
        );
        CGEventTapEnable(tap, true);
    }

    let _ = ready.send(Ok(()));
    debug!("Event tap loop running");

    // Returns once CFRunLoopStop is called from stop()
    unsafe {
        CFRunLoopRun();
    }

    debug!("Event tap loop stopped");
    Ok(())
}

/// Check if accessibility permissions are granted
pub fn check_accessibility_permissions() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Request accessibility permissions (shows system dialog)
pub fn request_accessibility_permissions() -> bool {
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::string::CFString;

    let key = CFString::new("AXTrustedCheckOptionPrompt");
    let value = core_foundation::boolean::CFBoolean::true_value();
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef() as CFTypeRef) }
}
