use bytemuck::{Pod, Zeroable};

/// Shape selector read by `overlay.wgsl`.
pub const SHAPE_SOLID: f32 = 0.0;
pub const SHAPE_DISC: f32 = 1.0;
pub const SHAPE_RING: f32 = 2.0;

/// Per-frame overlay vertex (battle lines, arrows, pings). `uv` spans -1..1
/// across disc and ring quads.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct OverlayVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    /// kind, inner radius ratio, feather (uv units), unused.
    pub shape: [f32; 4],
}

fn vertex(p: [f64; 2], uv: [f32; 2], color: [f32; 4], shape: [f32; 4]) -> OverlayVertex {
    OverlayVertex {
        position: [p[0] as f32, p[1] as f32],
        uv,
        color,
        shape,
    }
}

pub fn push_triangle(out: &mut Vec<OverlayVertex>, points: [[f64; 2]; 3], color: [f32; 4]) {
    let shape = [SHAPE_SOLID, 0.0, 0.0, 0.0];
    out.extend(points.map(|p| vertex(p, [0.0, 0.0], color, shape)));
}

/// Quad of total width `width` (same units as the points) from `a` to `b`.
pub fn push_line(out: &mut Vec<OverlayVertex>, a: [f64; 2], b: [f64; 2], width: f64, color: [f32; 4]) {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = dx.hypot(dy);
    if len <= f64::EPSILON || !len.is_finite() {
        return;
    }
    let (nx, ny) = (-dy / len * width * 0.5, dx / len * width * 0.5);
    let a0 = [a[0] + nx, a[1] + ny];
    let a1 = [a[0] - nx, a[1] - ny];
    let b0 = [b[0] + nx, b[1] + ny];
    let b1 = [b[0] - nx, b[1] - ny];
    push_triangle(out, [a0, a1, b0], color);
    push_triangle(out, [b0, a1, b1], color);
}

fn push_quad(out: &mut Vec<OverlayVertex>, center: [f64; 2], radius: f64, color: [f32; 4], shape: [f32; 4]) {
    let corner = |sx: f64, sy: f64| {
        vertex(
            [center[0] + sx * radius, center[1] + sy * radius],
            [sx as f32, sy as f32],
            color,
            shape,
        )
    };
    out.extend([
        corner(-1.0, -1.0),
        corner(1.0, -1.0),
        corner(-1.0, 1.0),
        corner(-1.0, 1.0),
        corner(1.0, -1.0),
        corner(1.0, 1.0),
    ]);
}

pub fn push_disc(out: &mut Vec<OverlayVertex>, center: [f64; 2], radius: f64, color: [f32; 4], feather: f32) {
    if radius > 0.0 {
        push_quad(out, center, radius, color, [SHAPE_DISC, 0.0, feather, 0.0]);
    }
}

/// Ring whose inner edge sits at `inner_ratio` of `radius`.
pub fn push_ring(
    out: &mut Vec<OverlayVertex>,
    center: [f64; 2],
    radius: f64,
    inner_ratio: f32,
    color: [f32; 4],
    feather: f32,
) {
    if radius > 0.0 {
        push_quad(out, center, radius, color, [SHAPE_RING, inner_ratio, feather, 0.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_quad_has_requested_width() {
        let mut out = Vec::new();
        push_line(&mut out, [0.0, 0.0], [10.0, 0.0], 2.0, [1.0; 4]);
        assert_eq!(out.len(), 6);
        let ys: Vec<f32> = out.iter().map(|v| v.position[1]).collect();
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -1.0);
    }

    #[test]
    fn degenerate_shapes_emit_nothing() {
        let mut out = Vec::new();
        push_line(&mut out, [3.0, 3.0], [3.0, 3.0], 1.0, [1.0; 4]);
        push_disc(&mut out, [0.0, 0.0], 0.0, [1.0; 4], 0.1);
        push_ring(&mut out, [0.0, 0.0], -1.0, 0.5, [1.0; 4], 0.1);
        assert!(out.is_empty());
    }

    #[test]
    fn ring_quad_carries_shape_params() {
        let mut out = Vec::new();
        push_ring(&mut out, [1.0, 1.0], 0.5, 0.8, [1.0; 4], 0.05);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|v| v.shape == [SHAPE_RING, 0.8, 0.05, 0.0]));
        assert_eq!(out[0].position, [0.5, 0.5]);
        assert_eq!(out[5].uv, [1.0, 1.0]);
    }
}
