//! Freeze layer showing a captured screen while the display reconfigures.

use tracing::debug;

use crate::layer::QUAD_VERTEX_COUNT;
use crate::layer_set::{LayerId, StereoLayers};
use crate::layout::{DrawPass, LayoutType};
use crate::render::{blend_state, execute_plan, RenderBackend};
use crate::selector::{plan_screenshot_draw, DrawPlan};

#[derive(Debug)]
pub struct ScreenshotLayer {
    id: LayerId,
    /// Texture holding the capture.
    texture: u64,
    alpha: u8,
    /// Used area of the capture texture, as fractions of its size.
    extent: (f32, f32),
    hidden: bool,
    pending_hidden: bool,
    layout_type: LayoutType,
}

impl ScreenshotLayer {
    /// A hidden screenshot layer for a capture filling `extent` of `texture`.
    pub fn new(texture: u64, extent: (f32, f32)) -> Self {
        ScreenshotLayer {
            id: LayerId::new_unique(),
            texture,
            alpha: 0xFF,
            extent,
            hidden: true,
            pending_hidden: true,
            layout_type: LayoutType::Mono,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn layout_type(&self) -> LayoutType {
        self.layout_type
    }

    pub fn is_stereo(&self) -> bool {
        self.layout_type != LayoutType::Mono
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_alpha(&mut self, alpha: u8) {
        self.alpha = alpha;
    }

    /// Stages a visibility change; applied by [`Self::do_transaction`].
    pub fn set_hidden(&mut self, hidden: bool) {
        self.pending_hidden = hidden;
    }

    /// Commits staged state. On becoming visible the capture is taken to be
    /// side by side exactly when some stereo layer is on screen.
    pub fn do_transaction(&mut self, layers: &mut StereoLayers) {
        let was_hidden = self.hidden;
        self.hidden = self.pending_hidden;

        if was_hidden && !self.hidden {
            if layers.any_stereo_layer_visible() {
                self.layout_type = LayoutType::SideBySide;
                layers.register(self.id, true);
            } else {
                self.layout_type = LayoutType::Mono;
                layers.unregister(self.id);
            }
            debug!("Screenshot layer {:?} shown as {:?}", self.id, self.layout_type);
        } else if !was_hidden && self.hidden {
            layers.set_visible(self.id, false);
        }
    }

    pub fn on_removed(&mut self, layers: &mut StereoLayers) {
        layers.unregister(self.id);
    }

    pub fn plan(&self, layers: &StereoLayers, pass: DrawPass) -> DrawPlan {
        plan_screenshot_draw(self.is_stereo(), pass, layers.render_mode(), self.extent)
    }

    pub fn draw(&self, layers: &StereoLayers, pass: DrawPass, backend: &mut dyn RenderBackend) {
        if self.hidden {
            return;
        }
        let blend = blend_state(self.alpha, true, true);
        execute_plan(&self.plan(layers, pass), self.texture, &blend, QUAD_VERTEX_COUNT, backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer_set::{RenderMode, StereoLayerSet};
    use crate::render::{CommandRecorder, DrawCommand};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shown_over_stereo_content_becomes_side_by_side() {
        let set = StereoLayerSet::new(RenderMode::Anaglyph);
        let mut layers = set.lock();
        let video = LayerId::new_unique();
        layers.register(video, true);

        let mut shot = ScreenshotLayer::new(1, (1.0, 1.0));
        shot.set_hidden(false);
        assert!(shot.is_hidden());
        shot.do_transaction(&mut layers);
        assert!(!shot.is_hidden());
        assert_eq!(shot.layout_type(), LayoutType::SideBySide);
        assert!(layers.is_registered(shot.id()));

        let mut recorder = CommandRecorder::new();
        shot.draw(&layers, DrawPass::LEFT, &mut recorder);
        assert_eq!(recorder.draw_count(), 2);

        shot.on_removed(&mut layers);
        assert!(!layers.is_registered(shot.id()));
    }

    #[test]
    fn test_shown_over_mono_content_stays_mono() {
        let set = StereoLayerSet::new(RenderMode::Interleaved);
        let mut layers = set.lock();
        let mut shot = ScreenshotLayer::new(1, (0.5, 0.5));
        shot.set_hidden(false);
        shot.do_transaction(&mut layers);
        assert_eq!(shot.layout_type(), LayoutType::Mono);
        assert!(layers.is_empty());

        let mut recorder = CommandRecorder::new();
        shot.draw(&layers, DrawPass::RIGHT, &mut recorder);
        assert_eq!(recorder.draw_count(), 1);
        assert!(!recorder.commands().contains(&DrawCommand::EnableStencil));
    }

    #[test]
    fn test_layout_only_changes_on_hidden_to_visible() {
        let set = StereoLayerSet::new(RenderMode::FramePacking);
        let mut layers = set.lock();
        let mut shot = ScreenshotLayer::new(1, (1.0, 1.0));
        shot.set_hidden(false);
        shot.do_transaction(&mut layers);
        assert_eq!(shot.layout_type(), LayoutType::Mono);

        // Stereo content appearing later does not convert an already visible capture.
        layers.register(LayerId::new_unique(), true);
        shot.do_transaction(&mut layers);
        assert_eq!(shot.layout_type(), LayoutType::Mono);

        shot.set_hidden(true);
        shot.do_transaction(&mut layers);
        shot.set_hidden(false);
        shot.do_transaction(&mut layers);
        assert_eq!(shot.layout_type(), LayoutType::SideBySide);
    }

    #[test]
    fn test_hidden_screenshot_draws_nothing() {
        let set = StereoLayerSet::new(RenderMode::FramePacking);
        let layers = set.lock();
        let shot = ScreenshotLayer::new(1, (1.0, 1.0));
        let mut recorder = CommandRecorder::new();
        shot.draw(&layers, DrawPass::LEFT, &mut recorder);
        assert!(recorder.commands().is_empty());
    }
}
