//! Triage for GPU errors raised outside an explicit error scope.
//!
//! wgpu panics on uncaptured errors by default. The renderer installs a
//! handler that reports into a [`GpuFaultSlot`] instead; the frame loop
//! drains the slot and hands the fault to the map's error boundary.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Driver chatter that surfaces as an error but leaves the frame intact.
const NOISY_GPU_MESSAGES: &[&str] = &[
    "Alpha-premult and y-flip are deprecated",
    "GPU stall due to ReadPixels",
    "Texture has not been initialized prior to a partial upload",
    "Drawing without vertex attrib 0 array enabled",
    "Performance warning",
];

pub fn is_noisy_gpu_message(message: &str) -> bool {
    NOISY_GPU_MESSAGES.iter().any(|pattern| message.contains(pattern))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuFault {
    pub message: String,
}

impl GpuFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for GpuFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPU error: {}", self.message)
    }
}

impl std::error::Error for GpuFault {}

/// First non-noisy uncaptured error since the last [`GpuFaultSlot::take`].
#[derive(Debug, Clone, Default)]
pub struct GpuFaultSlot(Arc<Mutex<Option<GpuFault>>>);

impl GpuFaultSlot {
    /// Record an error message. Returns false when it was filtered as noise.
    pub fn report(&self, message: &str) -> bool {
        if is_noisy_gpu_message(message) {
            return false;
        }
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert_with(|| GpuFault::new(message));
        }
        true
    }

    pub fn take(&self) -> Option<GpuFault> {
        self.0.lock().ok()?.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_noise_is_dropped() {
        let slot = GpuFaultSlot::default();
        assert!(!slot.report("WebGL warning: texImage: Alpha-premult and y-flip are deprecated for non-DOM-Element uploads."));
        assert!(!slot.report("WebGL warning: readPixels: GPU stall due to ReadPixels"));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn first_real_error_is_kept_until_taken() {
        let slot = GpuFaultSlot::default();
        assert!(slot.report("Validation Error: shader module invalid"));
        assert!(slot.report("Validation Error: pipeline invalid"));
        let fault = slot.take().unwrap();
        assert_eq!(fault.message, "Validation Error: shader module invalid");
        assert_eq!(fault.to_string(), "GPU error: Validation Error: shader module invalid");
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn clones_share_one_slot() {
        let slot = GpuFaultSlot::default();
        let handler_side = slot.clone();
        handler_side.report("Out of memory");
        assert_eq!(slot.take(), Some(GpuFault::new("Out of memory")));
    }
}
