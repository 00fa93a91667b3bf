//! Draw commands issued by stereo layers and the backend seam that consumes
//! them.

use bitflags::bitflags;
use tracing::trace;

use crate::layout::Eye;
use crate::selector::{DrawPlan, TexCoord};

bitflags! {
    /// Colour channels written by subsequent draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const RED = 0x1;
        const GREEN = 0x2;
        const BLUE = 0x4;
        const ALPHA = 0x8;

        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
        const ANAGLYPH_LEFT = Self::RED.bits() | Self::ALPHA.bits();
        const ANAGLYPH_RIGHT = Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexEnvMode {
    Replace,
    Modulate,
}

/// Source factor of the blend equation. The destination factor is always
/// one minus source alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    SrcAlpha,
}

/// Colour, texture environment and blend setup for one layer draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub color: [f32; 4],
    pub tex_env: TexEnvMode,
    pub blend: Option<BlendFactor>,
}

/// Blend setup for a layer of plane alpha `alpha`.
///
/// Translucent layers modulate by a constant colour; opaque ones replace and
/// only blend when their buffer carries alpha.
pub fn blend_state(alpha: u8, premultiplied: bool, opaque: bool) -> BlendState {
    if alpha < 0xFF {
        let a = f32::from(alpha) / 255.0;
        let (color, src) = if premultiplied {
            ([a, a, a, a], BlendFactor::One)
        } else {
            ([1.0, 1.0, 1.0, a], BlendFactor::SrcAlpha)
        };
        BlendState {
            color,
            tex_env: TexEnvMode::Modulate,
            blend: Some(src),
        }
    } else {
        let src = if premultiplied {
            BlendFactor::One
        } else {
            BlendFactor::SrcAlpha
        };
        BlendState {
            color: [1.0; 4],
            tex_env: TexEnvMode::Replace,
            blend: (!opaque).then_some(src),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Texture name to sample; layers use their buffer id.
    BindTexture(u64),
    SetTextureFilter(TextureFilter),
    SetColor([f32; 4]),
    EnableBlend { src: BlendFactor },
    DisableBlend,
    SetTexEnv(TexEnvMode),
    SetColorMask(ColorMask),
    EnableStencil,
    DisableStencil,
    DrawTriangleFan {
        view: Eye,
        vertex_count: u32,
        tex_coords: [TexCoord; 4],
    },
}

/// Receives the draw commands of a composition pass.
pub trait RenderBackend {
    fn execute(&mut self, command: &DrawCommand);
}

/// Backend that keeps every command, for inspection.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of triangle fans recorded.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawTriangleFan { .. }))
            .count()
    }
}

impl RenderBackend for CommandRecorder {
    fn execute(&mut self, command: &DrawCommand) {
        self.commands.push(command.clone());
    }
}

/// Issues a draw plan sampling `texture`, wrapped in `blend`. Blending is
/// disabled afterwards, and a stereo plan always leaves the colour mask at
/// [`ColorMask::ALL`] with stenciling off.
pub fn execute_plan(
    plan: &DrawPlan,
    texture: u64,
    blend: &BlendState,
    vertex_count: u32,
    backend: &mut dyn RenderBackend,
) {
    backend.execute(&DrawCommand::BindTexture(texture));
    backend.execute(&DrawCommand::SetColor(blend.color));
    backend.execute(&DrawCommand::SetTexEnv(blend.tex_env));
    if let Some(src) = blend.blend {
        backend.execute(&DrawCommand::EnableBlend { src });
    }

    match plan {
        DrawPlan::Baseline { rect } => {
            backend.execute(&DrawCommand::DrawTriangleFan {
                view: Eye::Left,
                vertex_count,
                tex_coords: rect.fan_coords(),
            });
        }
        DrawPlan::Stereo {
            linear_filter,
            stencil,
            draws,
        } => {
            if *linear_filter {
                backend.execute(&DrawCommand::SetTextureFilter(TextureFilter::Linear));
            }
            if *stencil {
                backend.execute(&DrawCommand::EnableStencil);
            }
            for draw in draws {
                if let Some(mask) = draw.color_mask {
                    backend.execute(&DrawCommand::SetColorMask(mask));
                }
                trace!("Drawing {:?} view {:?}", draw.view, draw.rect);
                backend.execute(&DrawCommand::DrawTriangleFan {
                    view: draw.view,
                    vertex_count,
                    tex_coords: draw.rect.fan_coords(),
                });
            }
            backend.execute(&DrawCommand::SetColorMask(ColorMask::ALL));
            backend.execute(&DrawCommand::DisableStencil);
        }
    }

    backend.execute(&DrawCommand::DisableBlend);
}
