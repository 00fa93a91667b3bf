//! # Stereo composition
//!
//! Everything the compositor needs to show stereoscopic content:
//! - [`layout`]: the per-layer layout descriptor, decoded from the producer's
//!   layout word and mirrored into hardware composer flags.
//! - [`layer_set`]: the shared set of stereo layers and the global render mode.
//! - [`selector`]: pure per-eye selection of sampling rectangles and draw plans.
//! - [`render`]: the draw command stream and the [`RenderBackend`] seam.
//! - [`layer`] and [`screenshot`]: layers that put the pieces together.
//!
//! Operations that touch the stereo layer set take the locked
//! [`StereoLayers`] explicitly; the caller holds [`StereoLayerSet::lock`] for
//! as long as it needs a consistent view.

pub mod error;
pub mod layer;
pub mod layer_set;
pub mod layout;
pub mod render;
pub mod screenshot;
pub mod selector;

pub use error::StereoError;
pub use layer::{Layer, LayerState, StereoExtension};
pub use layer_set::{LayerId, RenderMode, StereoLayerSet, StereoLayers, StereoLayersGuard};
pub use layout::{
    layout_word, DrawPass, Eye, EyeOrder, LayerRenderMode, LayoutDecode, LayoutType, StereoLayoutDescriptor,
};
pub use render::{ColorMask, CommandRecorder, DrawCommand, RenderBackend};
pub use screenshot::ScreenshotLayer;
pub use selector::{plan_layer_draw, plan_screenshot_draw, view_to_render, DrawPlan, EyeDraw, LayerGeometry, TexRect};
