//! GL-style blend function constants.
//!
//! Code ported from GL-era batchers expresses blending as
//! `glBlendFunc(GL_SRC_ALPHA, GL_ONE_MINUS_SRC_ALPHA)`. These helpers map
//! those constants to `wgpu::BlendFactor` and back.

use wgpu::BlendFactor;

pub const GL_ZERO: u32 = 0;
pub const GL_ONE: u32 = 1;
pub const GL_SRC_COLOR: u32 = 0x0300;
pub const GL_ONE_MINUS_SRC_COLOR: u32 = 0x0301;
pub const GL_SRC_ALPHA: u32 = 0x0302;
pub const GL_ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
pub const GL_DST_ALPHA: u32 = 0x0304;
pub const GL_ONE_MINUS_DST_ALPHA: u32 = 0x0305;
pub const GL_DST_COLOR: u32 = 0x0306;
pub const GL_ONE_MINUS_DST_COLOR: u32 = 0x0307;
pub const GL_SRC_ALPHA_SATURATE: u32 = 0x0308;

const GL_BLEND_TABLE: [(u32, BlendFactor); 11] = [
    (GL_ZERO, BlendFactor::Zero),
    (GL_ONE, BlendFactor::One),
    (GL_SRC_COLOR, BlendFactor::Src),
    (GL_ONE_MINUS_SRC_COLOR, BlendFactor::OneMinusSrc),
    (GL_SRC_ALPHA, BlendFactor::SrcAlpha),
    (GL_ONE_MINUS_SRC_ALPHA, BlendFactor::OneMinusSrcAlpha),
    (GL_DST_ALPHA, BlendFactor::DstAlpha),
    (GL_ONE_MINUS_DST_ALPHA, BlendFactor::OneMinusDstAlpha),
    (GL_DST_COLOR, BlendFactor::Dst),
    (GL_ONE_MINUS_DST_COLOR, BlendFactor::OneMinusDst),
    (GL_SRC_ALPHA_SATURATE, BlendFactor::SrcAlphaSaturated),
];

/// Maps a GL blend function constant to a wgpu blend factor.
#[must_use]
pub fn from_gl(gl_function: u32) -> Option<BlendFactor> {
    GL_BLEND_TABLE
        .iter()
        .find(|(gl, _)| *gl == gl_function)
        .map(|&(_, factor)| factor)
}

/// Maps a wgpu blend factor back to its GL constant, when one exists.
#[must_use]
pub fn to_gl(factor: BlendFactor) -> Option<u32> {
    GL_BLEND_TABLE
        .iter()
        .find(|(_, f)| *f == factor)
        .map(|&(gl, _)| gl)
}
