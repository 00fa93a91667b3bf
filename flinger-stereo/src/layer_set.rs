//! The compositor's set of stereo layers and its global output mode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use flinger_core::config::StereoConfig;

use crate::error::StereoError;

/// Global stereo output mode of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Plain composition, no stereo handling at all.
    #[default]
    Default,
    /// Each eye composed separately into one half of the output frame.
    FramePacking,
    /// Red/cyan filtered stereo.
    Anaglyph,
    /// Row or column interleaving through the stencil buffer.
    Interleaved,
    /// One view only.
    Mono,
}

impl RenderMode {
    /// Name as written in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Default => "default",
            RenderMode::FramePacking => "frame-packing",
            RenderMode::Anaglyph => "anaglyph",
            RenderMode::Interleaved => "interleaved",
            RenderMode::Mono => "mono",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = StereoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(RenderMode::Default),
            "frame-packing" => Ok(RenderMode::FramePacking),
            "anaglyph" => Ok(RenderMode::Anaglyph),
            "interleaved" => Ok(RenderMode::Interleaved),
            "mono" => Ok(RenderMode::Mono),
            other => Err(StereoError::UnknownRenderMode(other.to_string())),
        }
    }
}

/// Identifies a layer in the stereo layer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        LayerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// State guarded by [`StereoLayerSet`]'s lock. Layer operations that touch
/// the set take `&mut StereoLayers` (or `&StereoLayers`), so holding the
/// lock is part of their signature.
#[derive(Debug, Default)]
pub struct StereoLayers {
    render_mode: RenderMode,
    /// Registered layers and whether each is currently visible.
    layers: BTreeMap<LayerId, bool>,
}

impl StereoLayers {
    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if self.render_mode != mode {
            info!("Stereo render mode {} -> {}", self.render_mode, mode);
        }
        self.render_mode = mode;
    }

    /// Adds a layer; registering twice only refreshes its visibility.
    pub fn register(&mut self, id: LayerId, visible: bool) {
        if self.layers.insert(id, visible).is_none() {
            debug!("Stereo layer {:?} registered", id);
        }
    }

    pub fn unregister(&mut self, id: LayerId) {
        if self.layers.remove(&id).is_some() {
            debug!("Stereo layer {:?} unregistered", id);
        }
    }

    pub fn is_registered(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    /// Updates visibility of a registered layer. Unregistered ids are ignored.
    pub fn set_visible(&mut self, id: LayerId, visible: bool) {
        if let Some(entry) = self.layers.get_mut(&id) {
            *entry = visible;
        }
    }

    pub fn any_stereo_layer_visible(&self) -> bool {
        self.layers.values().any(|&visible| visible)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

pub type StereoLayersGuard<'a> = MutexGuard<'a, StereoLayers>;

/// The single lock domain for stereo layer registration and descriptor
/// updates, shared with the draw thread.
#[derive(Debug, Default)]
pub struct StereoLayerSet {
    inner: Mutex<StereoLayers>,
}

impl StereoLayerSet {
    pub fn new(render_mode: RenderMode) -> Self {
        StereoLayerSet {
            inner: Mutex::new(StereoLayers {
                render_mode,
                layers: BTreeMap::new(),
            }),
        }
    }

    pub fn from_config(config: &StereoConfig) -> Result<Self, StereoError> {
        Ok(Self::new(config.render_mode.parse()?))
    }

    pub fn lock(&self) -> StereoLayersGuard<'_> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("default", RenderMode::Default)]
    #[case("frame-packing", RenderMode::FramePacking)]
    #[case("Anaglyph", RenderMode::Anaglyph)]
    #[case("interleaved", RenderMode::Interleaved)]
    #[case("MONO", RenderMode::Mono)]
    fn test_render_mode_parse(#[case] text: &str, #[case] mode: RenderMode) {
        assert_eq!(text.parse::<RenderMode>().unwrap(), mode);
        assert_eq!(mode.as_str().parse::<RenderMode>().unwrap(), mode);
    }

    #[test]
    fn test_render_mode_parse_unknown() {
        assert_matches!("checkerboard".parse::<RenderMode>(), Err(StereoError::UnknownRenderMode(_)));
    }

    #[test]
    fn test_from_config() {
        let config = StereoConfig {
            render_mode: "anaglyph".to_string(),
        };
        let set = StereoLayerSet::from_config(&config).unwrap();
        assert_eq!(set.lock().render_mode(), RenderMode::Anaglyph);
    }

    #[test]
    fn test_visibility_tracking() {
        let set = StereoLayerSet::default();
        let mut layers = set.lock();
        let a = LayerId::new_unique();
        let b = LayerId::new_unique();
        assert!(!layers.any_stereo_layer_visible());

        layers.register(a, false);
        layers.register(b, false);
        assert!(!layers.any_stereo_layer_visible());
        layers.set_visible(b, true);
        assert!(layers.any_stereo_layer_visible());

        layers.unregister(b);
        assert!(!layers.any_stereo_layer_visible());
        assert_eq!(layers.len(), 1);
        layers.unregister(b);
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn test_set_visible_ignores_unregistered() {
        let set = StereoLayerSet::default();
        let mut layers = set.lock();
        let id = LayerId::new_unique();
        layers.set_visible(id, true);
        assert!(!layers.is_registered(id));
        assert!(layers.is_empty());
    }
}
