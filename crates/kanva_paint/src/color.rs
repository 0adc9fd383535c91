//! CSS color string parsing to premultiplied RGBA.

use crate::error::PaintError;

/// Parse a CSS color into premultiplied `[r, g, b, a]` in `0.0..=1.0`.
///
/// Supported forms are `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, and
/// functional `rgb()` / `rgba()` with numeric or percentage components.
/// The color channels come back already multiplied by the alpha channel,
/// which is the form every render target here blends in.
pub fn parse_color(style: &str) -> Result<[f32; 4], PaintError> {
    let style = style.trim();
    let unpremultiplied = if let Some(hex) = style.strip_prefix('#') {
        parse_hex(hex)
    } else if style.starts_with("rgb") {
        parse_rgb_func(style)
    } else {
        None
    };
    let [r, g, b, a] =
        unpremultiplied.ok_or_else(|| PaintError::BadColor(style.to_owned()))?;
    Ok([r * a, g * a, b * a, a])
}

fn parse_hex(hex: &str) -> Option<[f32; 4]> {
    let nibble = |c: u8| char::from(c).to_digit(16).map(|d| d as u32);
    let bytes = hex.as_bytes();
    match bytes.len() {
        // Short forms replicate each digit: "#1af" reads as "#11aaff".
        3 | 4 => {
            let mut out = [1.0f32; 4];
            for (i, &c) in bytes.iter().enumerate() {
                let d = nibble(c)?;
                out[i] = (d * 17) as f32 / 255.0;
            }
            Some(out)
        }
        6 | 8 => {
            let mut out = [1.0f32; 4];
            for (i, pair) in bytes.chunks_exact(2).enumerate() {
                let hi = nibble(pair[0])?;
                let lo = nibble(pair[1])?;
                out[i] = (hi * 16 + lo) as f32 / 255.0;
            }
            Some(out)
        }
        _ => None,
    }
}

fn parse_rgb_func(style: &str) -> Option<[f32; 4]> {
    let open = style.find('(')?;
    let close = style.rfind(')')?;
    let head = &style[..open];
    if head != "rgb" && head != "rgba" {
        return None;
    }
    let args: Vec<&str> = style[open + 1..close].split(',').map(str::trim).collect();
    if args.len() != 3 && args.len() != 4 {
        return None;
    }
    let mut out = [1.0f32; 4];
    for (i, arg) in args.iter().take(3).enumerate() {
        out[i] = if let Some(pct) = arg.strip_suffix('%') {
            (pct.trim().parse::<f32>().ok()? / 100.0).clamp(0.0, 1.0)
        } else {
            (arg.parse::<f32>().ok()? / 255.0).clamp(0.0, 1.0)
        };
    }
    if let Some(alpha) = args.get(3) {
        out[3] = alpha.parse::<f32>().ok()?.clamp(0.0, 1.0);
    }
    Some(out)
}
