//! WGSL programs for the raster pipeline.
//!
//! All three programs draw 4-vertex triangle strips, one strip per
//! instance, and normalize device pixels to clip space in the vertex
//! stage (origin top-left, so Y is flipped). Geometry arrives already
//! transformed; only the stroke program carries the transform, which it
//! needs to build line quads with user-space width and caps.
//!
//! Fragments write at a constant depth of 0.5 so a single draw under a
//! less-than depth test covers each pixel at most once.

use crate::device::{ProgramDesc, UniformDecl, UniformKind};

/// Solid fill of pre-transformed quads. Instance: four corners in
/// triangle-strip order, 8 floats.
pub const RECT_SHADER: &str = r#"
struct Uniforms {
    canvas_size: vec2<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> ub: Uniforms;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
};

fn to_clip(p: vec2<f32>) -> vec4<f32> {
    let ndc = p / ub.canvas_size * 2.0 - 1.0;
    return vec4<f32>(ndc.x, -ndc.y, 0.5, 1.0);
}

@vertex
fn vs_main(
    @builtin(vertex_index) vi: u32,
    @location(0) c01: vec4<f32>,
    @location(1) c23: vec4<f32>,
) -> VsOut {
    var corner: vec2<f32>;
    switch vi {
        case 0u: { corner = c01.xy; }
        case 1u: { corner = c01.zw; }
        case 2u: { corner = c23.xy; }
        default: { corner = c23.zw; }
    }
    var out: VsOut;
    out.pos = to_clip(corner);
    return out;
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return ub.color;
}
"#;

/// Stroked line segments. Instance: one segment (x0, y0, x1, y1).
///
/// Endpoints are device-space; the quad is built around the user-space
/// segment so width, caps, and dash distance follow the transform, then
/// mapped back to device space.
pub const LINE_SHADER: &str = r#"
struct Uniforms {
    transform: mat3x3<f32>,
    canvas_size: vec2<f32>,
    color: vec4<f32>,
    // x: line width, y: cap (0 butt, 1 round, 2 square),
    // z: dash period (0 disables dashing), w: dash offset
    line_info: vec4<f32>,
};

@group(0) @binding(0) var<uniform> ub: Uniforms;
@group(0) @binding(1) var dash_table: texture_2d<f32>;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) along: f32,
    @location(1) offset: f32,
    @location(2) len: f32,
};

fn to_clip(p: vec2<f32>) -> vec4<f32> {
    let ndc = p / ub.canvas_size * 2.0 - 1.0;
    return vec4<f32>(ndc.x, -ndc.y, 0.5, 1.0);
}

@vertex
fn vs_main(
    @builtin(vertex_index) vi: u32,
    @location(0) seg: vec4<f32>,
) -> VsOut {
    let lin = mat2x2<f32>(ub.transform[0].xy, ub.transform[1].xy);
    let origin = ub.transform[2].xy;
    let det = lin[0].x * lin[1].y - lin[1].x * lin[0].y;

    var inv = mat2x2<f32>(vec2<f32>(1.0, 0.0), vec2<f32>(0.0, 1.0));
    if (abs(det) > 1e-12) {
        inv = mat2x2<f32>(
            vec2<f32>(lin[1].y, -lin[0].y) / det,
            vec2<f32>(-lin[1].x, lin[0].x) / det,
        );
    }

    let p0 = inv * (seg.xy - origin);
    let p1 = inv * (seg.zw - origin);

    let delta = p1 - p0;
    let len = length(delta);
    var dir = vec2<f32>(1.0, 0.0);
    if (len > 0.0) {
        dir = delta / len;
    }
    let normal = vec2<f32>(-dir.y, dir.x);

    let half_w = ub.line_info.x * 0.5;
    // Round and square caps extend the quad past both endpoints.
    var ext = 0.0;
    if (ub.line_info.y > 0.5) {
        ext = half_w;
    }

    var along = -ext;
    if (vi >= 2u) {
        along = len + ext;
    }
    var offset = -half_w;
    if (vi == 1u || vi == 3u) {
        offset = half_w;
    }

    let user = p0 + dir * along + normal * offset;
    let device = lin * user + origin;

    var out: VsOut;
    out.pos = to_clip(device);
    out.along = along;
    out.offset = offset;
    out.len = len;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let half_w = ub.line_info.x * 0.5;
    let cap = ub.line_info.y;

    if (in.along < 0.0 || in.along > in.len) {
        if (cap < 0.5) {
            discard;
        }
        if (cap < 1.5) {
            // Round cap: clip to a half-disc around the endpoint.
            var dx = -in.along;
            if (in.along > in.len) {
                dx = in.along - in.len;
            }
            if (dx * dx + in.offset * in.offset > half_w * half_w) {
                discard;
            }
        }
    }

    let period = ub.line_info.z;
    if (period > 0.5) {
        var pos = (in.along + ub.line_info.w) % period;
        if (pos < 0.0) {
            pos += period;
        }
        let width = i32(textureDimensions(dash_table).x);
        let cell = clamp(i32(floor(pos)), 0, width - 1);
        if (textureLoad(dash_table, vec2<i32>(cell, 0), 0).r > 0.0) {
            discard;
        }
    }

    return ub.color;
}
"#;

/// Textured quads for image, text, and pixel-upload blits. Instance:
/// four device-space corners in the same strip order as the fill program.
/// `src_rect` selects the sampled sub-rectangle in normalized texels and
/// `tint` multiplies the premultiplied sample.
pub const IMAGE_SHADER: &str = r#"
struct Uniforms {
    canvas_size: vec2<f32>,
    src_rect: vec4<f32>,
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> ub: Uniforms;
@group(0) @binding(1) var src: texture_2d<f32>;
@group(0) @binding(2) var src_sampler: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

fn to_clip(p: vec2<f32>) -> vec4<f32> {
    let ndc = p / ub.canvas_size * 2.0 - 1.0;
    return vec4<f32>(ndc.x, -ndc.y, 0.5, 1.0);
}

@vertex
fn vs_main(
    @builtin(vertex_index) vi: u32,
    @location(0) c01: vec4<f32>,
    @location(1) c23: vec4<f32>,
) -> VsOut {
    var corner: vec2<f32>;
    var uv: vec2<f32>;
    switch vi {
        case 0u: { corner = c01.xy; uv = ub.src_rect.xy; }
        case 1u: { corner = c01.zw; uv = ub.src_rect.zy; }
        case 2u: { corner = c23.xy; uv = ub.src_rect.xw; }
        default: { corner = c23.zw; uv = ub.src_rect.zw; }
    }
    var out: VsOut;
    out.pos = to_clip(corner);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(src, src_sampler, in.uv) * ub.tint;
}
"#;

pub const RECT_PROGRAM: ProgramDesc = ProgramDesc {
    label: "rect",
    shader: RECT_SHADER,
    uniforms: &[
        UniformDecl {
            name: "canvas_size",
            kind: UniformKind::Vec2,
        },
        UniformDecl {
            name: "color",
            kind: UniformKind::Vec4,
        },
    ],
    floats_per_instance: 8,
    texture_slots: 0,
    texture_filtering: false,
};

pub const LINE_PROGRAM: ProgramDesc = ProgramDesc {
    label: "line",
    shader: LINE_SHADER,
    uniforms: &[
        UniformDecl {
            name: "transform",
            kind: UniformKind::Mat3,
        },
        UniformDecl {
            name: "canvas_size",
            kind: UniformKind::Vec2,
        },
        UniformDecl {
            name: "color",
            kind: UniformKind::Vec4,
        },
        UniformDecl {
            name: "line_info",
            kind: UniformKind::Vec4,
        },
    ],
    floats_per_instance: 4,
    texture_slots: 1,
    texture_filtering: false,
};

pub const IMAGE_PROGRAM: ProgramDesc = ProgramDesc {
    label: "image",
    shader: IMAGE_SHADER,
    uniforms: &[
        UniformDecl {
            name: "canvas_size",
            kind: UniformKind::Vec2,
        },
        UniformDecl {
            name: "src_rect",
            kind: UniformKind::Vec4,
        },
        UniformDecl {
            name: "tint",
            kind: UniformKind::Vec4,
        },
    ],
    floats_per_instance: 8,
    texture_slots: 1,
    texture_filtering: true,
};
