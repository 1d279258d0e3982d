/// Deterministic community color via CRC32 hash of the community id.
/// Returns (r, g, b) from first 3 bytes of hash. Used when no explicit color is set.
pub fn faction_color(id: &str) -> (u8, u8, u8) {
    let hash = crc32fast::hash(id.as_bytes());
    let bytes = hash.to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// Parse `#rrggbb`, `#rgb` or the same without the leading `#`.
pub fn parse_hex_color(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some((
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some((nibble(0)?, nibble(1)?, nibble(2)?))
        }
        _ => None,
    }
}

/// Linear blend between two colors, `t` clamped to 0..1.
pub fn mix_rgb(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Normalize a color to 0..1. Inputs whose largest channel exceeds 1 are
/// treated as 0..255.
pub fn normalize_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    if max > 1.0 {
        rgb.map(|c| (c / 255.0).clamp(0.0, 1.0))
    } else {
        rgb.map(|c| c.clamp(0.0, 1.0))
    }
}

/// Normalize an alpha in 0..1 or 0..255 to 0..1.
pub fn normalize_alpha(alpha: f32) -> f32 {
    if alpha > 1.0 {
        (alpha / 255.0).clamp(0.0, 1.0)
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

/// Raise HSL lightness by `amount` (0..1), keeping hue and saturation.
pub fn lighten(rgb: (u8, u8, u8), amount: f64) -> (u8, u8, u8) {
    let (h, s, l) = rgb_to_hsl(rgb.0, rgb.1, rgb.2);
    hsl_to_rgb(h, s, (l + amount).clamp(0.0, 1.0))
}

/// Convert RGB to HSL. Returns (h: 0..360, s: 0..1, l: 0..1).
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        let mut h = (g - b) / d;
        if g < b {
            h += 6.0;
        }
        h
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert HSL to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s.abs() < f64::EPSILON {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    let h = h / 360.0;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-9,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn parse_hex_color_formats() {
        assert_eq!(parse_hex_color("#ff0000"), Some((255, 0, 0)));
        assert_eq!(parse_hex_color("00FF7f"), Some((0, 255, 127)));
        assert_eq!(parse_hex_color("#0f0"), Some((0, 255, 0)));
        assert_eq!(parse_hex_color("#ff00"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(parse_hex_color(""), None);
    }

    #[test]
    fn normalize_rgb_detects_byte_range() {
        assert_eq!(normalize_rgb([255.0, 0.0, 51.0]), [1.0, 0.0, 0.2]);
        assert_eq!(normalize_rgb([0.5, 0.25, 1.0]), [0.5, 0.25, 1.0]);
        assert_eq!(normalize_alpha(255.0), 1.0);
        assert_eq!(normalize_alpha(0.4), 0.4);
    }

    #[test]
    fn mix_rgb_endpoints_and_clamp() {
        let a = [0.0, 10.0, 20.0];
        let b = [100.0, 110.0, 120.0];
        assert_eq!(mix_rgb(a, b, 0.0), a);
        assert_eq!(mix_rgb(a, b, 1.0), b);
        assert_eq!(mix_rgb(a, b, 2.0), b);
        let mid = mix_rgb(a, b, 0.5);
        assert_close(mid[0], 50.0);
    }

    #[test]
    fn roundtrip_rgb_through_hsl_is_identity() {
        let samples = [
            (0, 0, 0),
            (255, 255, 255),
            (128, 128, 128),
            (255, 0, 0),
            (37, 91, 201),
            (250, 180, 20),
        ];

        for (r, g, b) in samples {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            assert_eq!(hsl_to_rgb(h, s, l), (r, g, b));
        }
    }

    #[test]
    fn lighten_raises_lightness() {
        let (_, _, l0) = rgb_to_hsl(120, 20, 20);
        let lighter = lighten((120, 20, 20), 0.2);
        let (_, _, l1) = rgb_to_hsl(lighter.0, lighter.1, lighter.2);
        assert!(l1 > l0);
    }

    #[test]
    fn faction_color_is_deterministic() {
        assert_eq!(faction_color("north"), faction_color("north"));
        assert_ne!(faction_color("north"), faction_color("south"));
    }
}
