mod animation;
mod app;
mod battle;
mod color_cache;
mod data;
#[cfg(target_arch = "wasm32")]
mod gpu;
mod gpu_error;
mod location;
mod map;
mod render_loop;
mod renderer;
mod shader;
mod spatial;
mod viewport;

#[cfg(not(target_arch = "wasm32"))]
mod gpu {
    use crate::gpu_error::GpuFault;
    use crate::renderer::{FrameMetrics, FrameUniforms, LayerList};

    pub struct FrameInput<'a> {
        pub layers: &'a LayerList,
        pub view_proj: [[f32; 4]; 4],
        pub world_size: f32,
        pub uniforms: &'a FrameUniforms,
        pub clear_color: [f64; 3],
    }

    pub struct GpuRenderer;

    impl GpuRenderer {
        pub async fn init(_canvas: web_sys::HtmlCanvasElement) -> Result<Self, String> {
            Err("not wasm".into())
        }
        pub fn resize(&mut self, _w: u32, _h: u32) {}
        pub fn render(&mut self, frame: FrameInput<'_>) -> Option<FrameMetrics> {
            let _ = (
                frame.layers,
                frame.view_proj,
                frame.world_size,
                frame.uniforms,
                frame.clear_color,
            );
            None
        }
        pub fn take_fault(&self) -> Option<GpuFault> {
            None
        }
    }
}

use leptos::mount::mount_to;
use std::any::Any;
use std::cell::RefCell;
use wasm_bindgen::JsCast;

thread_local! {
    static APP_MOUNT_HANDLE: RefCell<Option<Box<dyn Any>>> = RefCell::new(None);
}

fn main() {
    console_error_panic_hook::set_once();
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let mount_target = document
        .get_element_by_id("app")
        .and_then(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
        .or_else(|| document.body());
    let Some(target) = mount_target else {
        return;
    };

    APP_MOUNT_HANDLE.with(move |slot| {
        // Drop any previous mount so its effects and timers stop before the new one starts.
        let _old = slot.borrow_mut().take();
        let handle = mount_to(target, app::App);
        *slot.borrow_mut() = Some(Box::new(handle));
    });
}
