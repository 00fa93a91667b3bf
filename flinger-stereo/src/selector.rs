//! Decides, per layer and per eye pass, which part of the buffer to sample
//! and how many draws to issue. Pure functions; no rendering happens here.

use flinger_gui::Rect;

use crate::layer_set::RenderMode;
use crate::layout::{DrawPass, Eye, LayerRenderMode, LayoutType, StereoLayoutDescriptor};
use crate::render::ColorMask;

/// Normalized texture rectangle, before the vertical flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoord {
    pub u: f32,
    pub v: f32,
}

impl TexRect {
    pub const FULL: TexRect = TexRect {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    /// Crop normalized against the active buffer size. An empty crop means
    /// the whole buffer.
    pub fn from_crop(crop: Rect, active_width: u32, active_height: u32) -> TexRect {
        if active_width == 0 || active_height == 0 {
            return TexRect::FULL;
        }
        let crop = if crop.is_empty() {
            Rect::from_size(active_width, active_height)
        } else {
            crop
        };
        let w = active_width as f32;
        let h = active_height as f32;
        TexRect {
            left: crop.left as f32 / w,
            top: crop.top as f32 / h,
            right: crop.right as f32 / w,
            bottom: crop.bottom as f32 / h,
        }
    }

    /// The first or second half of this rectangle for a split layout.
    /// Interleaved and mono layouts are returned unchanged.
    pub fn half(self, layout_type: LayoutType, first_half: bool) -> TexRect {
        let (scale, offset) = if first_half { (0.5, 0.0) } else { (0.5, 0.5) };
        match layout_type {
            LayoutType::TopBottom => TexRect {
                top: self.top * scale + offset,
                bottom: self.bottom * scale + offset,
                ..self
            },
            LayoutType::SideBySide => TexRect {
                left: self.left * scale + offset,
                right: self.right * scale + offset,
                ..self
            },
            LayoutType::Mono | LayoutType::RowInterleaved | LayoutType::ColInterleaved => self,
        }
    }

    /// Triangle-fan coordinates (l,t) (l,b) (r,b) (r,t) with `v -> 1 - v`.
    pub fn fan_coords(&self) -> [TexCoord; 4] {
        [
            TexCoord {
                u: self.left,
                v: 1.0 - self.top,
            },
            TexCoord {
                u: self.left,
                v: 1.0 - self.bottom,
            },
            TexCoord {
                u: self.right,
                v: 1.0 - self.bottom,
            },
            TexCoord {
                u: self.right,
                v: 1.0 - self.top,
            },
        ]
    }
}

/// One draw call of a stereo plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeDraw {
    /// View whose image is sampled.
    pub view: Eye,
    /// Colour mask to set before this draw; `None` leaves it alone.
    pub color_mask: Option<ColorMask>,
    pub rect: TexRect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawPlan {
    /// Ordinary composition: one draw of `rect`, no filter, mask or stencil changes.
    Baseline { rect: TexRect },
    /// Stereo-aware composition. After the draws the colour mask is reset to
    /// all channels and the stencil test disabled.
    Stereo {
        linear_filter: bool,
        stencil: bool,
        draws: Vec<EyeDraw>,
    },
}

impl DrawPlan {
    pub fn draw_count(&self) -> usize {
        match self {
            DrawPlan::Baseline { .. } => 1,
            DrawPlan::Stereo { draws, .. } => draws.len(),
        }
    }
}

/// What the selector needs to know about a layer's buffer geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerGeometry {
    pub active_width: u32,
    pub active_height: u32,
    pub crop: Rect,
}

/// The view a layer samples during `pass`.
///
/// A layer pinned to one eye overrides the pass eye, but only in
/// frame-packing and mono output.
pub fn view_to_render(descriptor: &StereoLayoutDescriptor, pass: DrawPass, mode: RenderMode) -> Eye {
    let view = pass.eye;
    match descriptor.render_mode.pinned_eye() {
        Some(pinned)
            if descriptor.is_stereo()
                && pinned != view
                && matches!(mode, RenderMode::FramePacking | RenderMode::Mono) =>
        {
            pinned
        }
        _ => view,
    }
}

fn stereo_rect(descriptor: &StereoLayoutDescriptor, base: TexRect, view: Eye) -> TexRect {
    if descriptor.is_stereo() {
        base.half(descriptor.layout_type, descriptor.draws_first_half(view))
    } else {
        base
    }
}

/// Plans the draws of a layer for one eye pass.
pub fn plan_layer_draw(
    descriptor: &StereoLayoutDescriptor,
    pass: DrawPass,
    mode: RenderMode,
    geometry: &LayerGeometry,
) -> DrawPlan {
    let base = TexRect::from_crop(geometry.crop, geometry.active_width, geometry.active_height);
    let stereo = descriptor.is_stereo();
    if mode == RenderMode::Default || (!stereo && mode != RenderMode::FramePacking) {
        return DrawPlan::Baseline { rect: base };
    }

    let both_views = stereo && descriptor.render_mode == LayerRenderMode::Stereo;
    let stencil = both_views && mode == RenderMode::Interleaved;
    let anaglyph = both_views && mode == RenderMode::Anaglyph;

    let view = view_to_render(descriptor, pass, mode);
    let mut draws = vec![EyeDraw {
        view,
        color_mask: anaglyph.then_some(ColorMask::ANAGLYPH_LEFT),
        rect: stereo_rect(descriptor, base, view),
    }];
    if both_views && !matches!(mode, RenderMode::FramePacking | RenderMode::Mono) {
        draws.push(EyeDraw {
            view: Eye::Right,
            color_mask: anaglyph.then_some(ColorMask::ANAGLYPH_RIGHT),
            rect: stereo_rect(descriptor, base, Eye::Right),
        });
    }

    DrawPlan::Stereo {
        linear_filter: true,
        stencil,
        draws,
    }
}

/// Plans the draws of a screenshot layer. `extent` is the captured texture's
/// used area `(u, v)`; a stereo screenshot is always side by side with the
/// left view first.
pub fn plan_screenshot_draw(stereo: bool, pass: DrawPass, mode: RenderMode, extent: (f32, f32)) -> DrawPlan {
    let (u, v) = extent;
    let full = TexRect {
        left: 0.0,
        top: 1.0 - v,
        right: u,
        bottom: 1.0,
    };
    if mode == RenderMode::Default || (!stereo && mode != RenderMode::FramePacking) {
        return DrawPlan::Baseline { rect: full };
    }

    let eye_rect = |eye: Eye| -> TexRect {
        if !stereo {
            return full;
        }
        match eye {
            Eye::Left => TexRect { right: 0.5 * u, ..full },
            Eye::Right => TexRect { left: 0.5 * u, ..full },
        }
    };
    let anaglyph = stereo && mode == RenderMode::Anaglyph;

    let mut draws = vec![EyeDraw {
        view: pass.eye,
        color_mask: anaglyph.then_some(ColorMask::ANAGLYPH_LEFT),
        rect: eye_rect(pass.eye),
    }];
    if stereo && !matches!(mode, RenderMode::FramePacking | RenderMode::Mono) {
        draws.push(EyeDraw {
            view: Eye::Right,
            color_mask: anaglyph.then_some(ColorMask::ANAGLYPH_RIGHT),
            rect: eye_rect(Eye::Right),
        });
    }

    DrawPlan::Stereo {
        linear_filter: false,
        stencil: stereo && mode == RenderMode::Interleaved,
        draws,
    }
}
