// ============================================================================
// GPU SHADERS: WGSL for the wgpu backend, kept inline
// ============================================================================
//
// One module, three draw kinds sharing the `DrawUniforms` block at group 0:
//   vs_quad + fs_quad   full-target textured quad (group 1 = texture unit)
//   vs_quad + fs_fill   solid colour, clipped to a rect by the scissor
//   vs_stamp + fs_stamp instanced round brush stamps
//
// Everything is premultiplied; hardware blending does the rest.

pub const ENGINE_SHADER: &str = r#"
struct DrawUniforms {
    color: vec4<f32>,        // premultiplied fill colour
    canvas_size: vec2<f32>,  // target size in pixels
    opacity: f32,            // quad opacity
    hardness: f32,           // stamp falloff start, 0..1
};

@group(0) @binding(0) var<uniform> u: DrawUniforms;
@group(1) @binding(0) var src_tex: texture_2d<f32>;
@group(1) @binding(1) var src_samp: sampler;

fn unit_quad(vi: u32) -> vec2<f32> {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );
    return positions[vi];
}

fn to_ndc(px: vec2<f32>) -> vec4<f32> {
    return vec4<f32>(
        (px.x / u.canvas_size.x) * 2.0 - 1.0,
        1.0 - (px.y / u.canvas_size.y) * 2.0,
        0.0,
        1.0
    );
}

struct QuadOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_quad(@builtin(vertex_index) vi: u32) -> QuadOut {
    let p = unit_quad(vi);
    var out: QuadOut;
    out.position = vec4<f32>(p.x * 2.0 - 1.0, 1.0 - p.y * 2.0, 0.0, 1.0);
    out.uv = p;
    return out;
}

@fragment
fn fs_quad(in: QuadOut) -> @location(0) vec4<f32> {
    return textureSample(src_tex, src_samp, in.uv) * u.opacity;
}

@fragment
fn fs_fill(in: QuadOut) -> @location(0) vec4<f32> {
    return u.color;
}

struct StampIn {
    @location(0) center: vec2<f32>,
    @location(1) radius: f32,
    @location(2) rotation: f32,
    @location(3) color: vec4<f32>,  // premultiplied by stamp alpha
};

struct StampOut {
    @builtin(position) position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_stamp(@builtin(vertex_index) vi: u32, s: StampIn) -> StampOut {
    let corner = unit_quad(vi) * 2.0 - vec2<f32>(1.0, 1.0);
    let c = cos(s.rotation);
    let sn = sin(s.rotation);
    let rotated = vec2<f32>(corner.x * c - corner.y * sn, corner.x * sn + corner.y * c);

    var out: StampOut;
    out.position = to_ndc(s.center + rotated * s.radius);
    out.local = corner;
    out.color = s.color;
    return out;
}

@fragment
fn fs_stamp(in: StampOut) -> @location(0) vec4<f32> {
    let d = length(in.local);
    if (d >= 1.0) {
        discard;
    }
    var coverage = 1.0;
    if (d > u.hardness) {
        coverage = (1.0 - d) / max(1.0 - u.hardness, 1e-6);
    }
    return in.color * coverage;
}
"#;
