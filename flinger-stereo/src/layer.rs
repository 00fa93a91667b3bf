//! Composition layer with an optional stereo extension.

use tracing::{debug, trace};

use flinger_gui::{LatchedFrame, Rect};

use crate::layer_set::{LayerId, StereoLayers};
use crate::layout::{DrawPass, LayerRenderMode, LayoutDecode, StereoLayoutDescriptor};
use crate::render::{blend_state, execute_plan, RenderBackend};
use crate::selector::{plan_layer_draw, DrawPlan, LayerGeometry, TexRect};

/// Vertices of the layer quad.
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Drawing state set by the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerState {
    /// Plane alpha, 0xFF is fully opaque.
    pub alpha: u8,
    pub premultiplied: bool,
    /// The buffer has no alpha channel worth blending.
    pub opaque: bool,
    pub visible: bool,
}

impl Default for LayerState {
    fn default() -> Self {
        LayerState {
            alpha: 0xFF,
            premultiplied: true,
            opaque: false,
            visible: true,
        }
    }
}

/// Stereo-specific state of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoExtension {
    pub descriptor: StereoLayoutDescriptor,
}

#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    name: String,
    state: LayerState,
    geometry: LayerGeometry,
    stereo: Option<StereoExtension>,
    current: Option<LatchedFrame>,
}

impl Layer {
    /// A layer without stereo handling. It always draws the baseline path.
    pub fn new(name: impl Into<String>) -> Self {
        Layer {
            id: LayerId::new_unique(),
            name: name.into(),
            state: LayerState::default(),
            geometry: LayerGeometry::default(),
            stereo: None,
            current: None,
        }
    }

    /// A layer that decodes the layout word of every latched frame.
    pub fn with_stereo(name: impl Into<String>) -> Self {
        Layer {
            stereo: Some(StereoExtension::default()),
            ..Layer::new(name)
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub fn geometry(&self) -> &LayerGeometry {
        &self.geometry
    }

    pub fn descriptor(&self) -> Option<&StereoLayoutDescriptor> {
        self.stereo.as_ref().map(|ext| &ext.descriptor)
    }

    pub fn current_frame(&self) -> Option<&LatchedFrame> {
        self.current.as_ref()
    }

    pub fn set_alpha(&mut self, alpha: u8) {
        self.state.alpha = alpha;
    }

    pub fn set_opaque(&mut self, opaque: bool) {
        self.state.opaque = opaque;
    }

    pub fn set_premultiplied(&mut self, premultiplied: bool) {
        self.state.premultiplied = premultiplied;
    }

    /// Pins the layer to one eye, or back to both. No effect on layers
    /// without the stereo extension.
    pub fn set_stereo_render_mode(&mut self, render_mode: LayerRenderMode) {
        if let Some(ext) = self.stereo.as_mut() {
            ext.descriptor.render_mode = render_mode;
        }
    }

    /// Replaces type, order and render mode at once. A stereo layout joins
    /// the stereo layer set, a mono one leaves it. Returns false for layers
    /// without the stereo extension.
    pub fn set_stereo_config(&mut self, layers: &mut StereoLayers, descriptor: StereoLayoutDescriptor) -> bool {
        let Some(ext) = self.stereo.as_mut() else {
            return false;
        };
        ext.descriptor = descriptor;
        if descriptor.is_stereo() {
            layers.register(self.id, self.state.visible);
        } else {
            layers.unregister(self.id);
        }
        debug!("Layer '{}' configured as {:?}", self.name, descriptor);
        true
    }

    pub fn set_visible(&mut self, layers: &mut StereoLayers, visible: bool) {
        self.state.visible = visible;
        layers.set_visible(self.id, visible);
    }

    /// Takes a latched frame as the layer's content and applies its layout word.
    pub fn lock_page_flip(&mut self, layers: &mut StereoLayers, frame: LatchedFrame) {
        self.geometry = LayerGeometry {
            active_width: frame.buffer.width,
            active_height: frame.buffer.height,
            crop: frame.input.crop,
        };

        if let Some(ext) = self.stereo.as_mut() {
            match ext.descriptor.apply_layout_word(frame.layout) {
                LayoutDecode::Applied { newly_stereo: true } => {
                    debug!(
                        "Layer '{}' switched to {:?} ({:?})",
                        self.name, ext.descriptor.layout_type, ext.descriptor.order
                    );
                    layers.register(self.id, self.state.visible);
                }
                LayoutDecode::Applied { newly_stereo: false } => {}
                LayoutDecode::Rejected => {
                    trace!("Layer '{}' ignored layout word {:#010x}", self.name, frame.layout);
                }
            }
        }

        self.current = Some(frame);
    }

    /// Overrides the crop of the current content.
    pub fn set_crop(&mut self, crop: Rect) {
        self.geometry.crop = crop;
    }

    /// Writes the stereo fields into the hardware composer flags.
    pub fn set_geometry(&self, flags: &mut u32) {
        if let Some(ext) = &self.stereo {
            *flags = ext.descriptor.encode_hwc_flags(*flags);
        }
    }

    pub fn on_removed(&mut self, layers: &mut StereoLayers) {
        layers.unregister(self.id);
    }

    /// The plan this layer would draw for `pass` under the current render mode.
    pub fn plan(&self, layers: &StereoLayers, pass: DrawPass) -> DrawPlan {
        match &self.stereo {
            Some(ext) => plan_layer_draw(&ext.descriptor, pass, layers.render_mode(), &self.geometry),
            None => DrawPlan::Baseline {
                rect: TexRect::from_crop(self.geometry.crop, self.geometry.active_width, self.geometry.active_height),
            },
        }
    }

    pub fn draw(&self, layers: &StereoLayers, pass: DrawPass, backend: &mut dyn RenderBackend) {
        let Some(frame) = self.current.as_ref().filter(|_| self.state.visible) else {
            return;
        };
        let plan = self.plan(layers, pass);
        let blend = blend_state(self.state.alpha, self.state.premultiplied, self.state.opaque);
        execute_plan(&plan, frame.buffer.id.as_raw(), &blend, QUAD_VERTEX_COUNT, backend);
    }
}
