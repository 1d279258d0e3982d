use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

fn request_frame(window: Option<&web_sys::Window>, cb: &Closure<dyn FnMut(f64)>) -> Option<i32> {
    window?.request_animation_frame(cb.as_ref().unchecked_ref()).ok()
}

/// Batches requests via `requestAnimationFrame`.
///
/// Call `request()` whenever state changes. The callback fires at most once
/// per vsync, coalescing all requests made in between. When it returns
/// `true`, another frame is scheduled automatically.
pub struct FrameBatcher {
    inner: Rc<BatchInner>,
}

struct BatchInner {
    window: Option<web_sys::Window>,
    dirty: Cell<bool>,
    scheduled: Cell<bool>,
    raf_id: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl BatchInner {
    fn schedule(&self) {
        if self.scheduled.get() {
            return;
        }
        let cb_ref = self.callback.borrow();
        let Some(cb) = cb_ref.as_ref() else {
            return;
        };
        match request_frame(self.window.as_ref(), cb) {
            Some(id) => {
                self.scheduled.set(true);
                self.raf_id.set(Some(id));
            }
            None => self.scheduled.set(false),
        }
    }
}

impl FrameBatcher {
    pub fn new(on_frame: impl Fn(f64) -> bool + 'static) -> Self {
        let inner = Rc::new(BatchInner {
            window: web_sys::window(),
            dirty: Cell::new(false),
            scheduled: Cell::new(false),
            raf_id: Cell::new(None),
            callback: RefCell::new(None),
        });

        let inner_cb = inner.clone();
        let cb = Closure::<dyn FnMut(f64)>::new(move |ts: f64| {
            inner_cb.scheduled.set(false);
            inner_cb.raf_id.set(None);
            if !inner_cb.dirty.replace(false) {
                return;
            }
            if on_frame(ts) {
                inner_cb.dirty.set(true);
                inner_cb.schedule();
            }
        });
        *inner.callback.borrow_mut() = Some(cb);

        Self { inner }
    }

    /// Cheap: sets a flag and schedules one frame if none is pending.
    pub fn request(&self) {
        self.inner.dirty.set(true);
        self.inner.schedule();
    }
}

impl Drop for FrameBatcher {
    fn drop(&mut self) {
        if let Some(raf_id) = self.inner.raf_id.replace(None)
            && let Some(window) = self.inner.window.as_ref()
        {
            let _ = window.cancel_animation_frame(raf_id);
        }
        self.inner.scheduled.set(false);
        self.inner.dirty.set(false);
        // Break the callback->inner reference cycle on teardown.
        self.inner.callback.borrow_mut().take();
    }
}

/// Continuous `requestAnimationFrame` loop with explicit start/stop.
///
/// `stop()` cancels the pending frame handle, so no orphaned loop survives a
/// stop or a drop.
pub struct AnimationLoop {
    inner: Rc<LoopInner>,
}

struct LoopInner {
    window: Option<web_sys::Window>,
    running: Cell<bool>,
    raf_id: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl LoopInner {
    fn schedule(&self) {
        let cb_ref = self.callback.borrow();
        let Some(cb) = cb_ref.as_ref() else {
            return;
        };
        match request_frame(self.window.as_ref(), cb) {
            Some(id) => self.raf_id.set(Some(id)),
            None => self.running.set(false),
        }
    }

    fn cancel(&self) {
        if let Some(raf_id) = self.raf_id.replace(None)
            && let Some(window) = self.window.as_ref()
        {
            let _ = window.cancel_animation_frame(raf_id);
        }
    }
}

impl AnimationLoop {
    /// `on_frame` receives the rAF timestamp (ms, same clock as `performance.now()`).
    pub fn new(on_frame: impl Fn(f64) + 'static) -> Self {
        let inner = Rc::new(LoopInner {
            window: web_sys::window(),
            running: Cell::new(false),
            raf_id: Cell::new(None),
            callback: RefCell::new(None),
        });

        let inner_cb = inner.clone();
        let cb = Closure::<dyn FnMut(f64)>::new(move |ts: f64| {
            inner_cb.raf_id.set(None);
            if !inner_cb.running.get() {
                return;
            }
            on_frame(ts);
            // on_frame may have stopped the loop.
            if inner_cb.running.get() {
                inner_cb.schedule();
            }
        });
        *inner.callback.borrow_mut() = Some(cb);

        Self { inner }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    pub fn start(&self) {
        if self.inner.running.replace(true) {
            return;
        }
        self.inner.schedule();
    }

    pub fn stop(&self) {
        self.inner.running.set(false);
        self.inner.cancel();
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.stop();
        self.inner.callback.borrow_mut().take();
    }
}
