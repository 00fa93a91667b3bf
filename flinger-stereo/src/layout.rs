//! Stereo layout descriptor: decoding the producer's layout word and the
//! hardware composer flag fields.

/// How the two views are packed into one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutType {
    #[default]
    Mono = 0,
    SideBySide = 1,
    TopBottom = 2,
    RowInterleaved = 3,
    ColInterleaved = 4,
}

impl LayoutType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LayoutType::Mono),
            1 => Some(LayoutType::SideBySide),
            2 => Some(LayoutType::TopBottom),
            3 => Some(LayoutType::RowInterleaved),
            4 => Some(LayoutType::ColInterleaved),
            _ => None,
        }
    }
}

/// Which view occupies the first half of a split layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EyeOrder {
    #[default]
    LeftFirst = 0,
    RightFirst = 1,
}

impl EyeOrder {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(EyeOrder::LeftFirst),
            1 => Some(EyeOrder::RightFirst),
            _ => None,
        }
    }
}

/// Per-layer view selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerRenderMode {
    #[default]
    Stereo = 0,
    LeftOnly = 1,
    RightOnly = 2,
}

impl LayerRenderMode {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LayerRenderMode::Stereo),
            1 => Some(LayerRenderMode::LeftOnly),
            2 => Some(LayerRenderMode::RightOnly),
            _ => None,
        }
    }

    /// The eye this mode pins, if any.
    pub fn pinned_eye(self) -> Option<Eye> {
        match self {
            LayerRenderMode::Stereo => None,
            LayerRenderMode::LeftOnly => Some(Eye::Left),
            LayerRenderMode::RightOnly => Some(Eye::Right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

/// The eye the compositor is composing for. Passed to every draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawPass {
    pub eye: Eye,
}

impl DrawPass {
    pub const LEFT: DrawPass = DrawPass { eye: Eye::Left };
    pub const RIGHT: DrawPass = DrawPass { eye: Eye::Right };
}

pub const LAYOUT_TYPE_SHIFT: u32 = 16;
pub const LAYOUT_ORDER_SHIFT: u32 = 24;

/// Hardware composer flag fields.
pub const HWC_TYPE_SHIFT: u32 = 16;
pub const HWC_TYPE_MASK: u32 = 0xFF << HWC_TYPE_SHIFT;
pub const HWC_ORDER_SHIFT: u32 = 24;
pub const HWC_ORDER_MASK: u32 = 0x0F << HWC_ORDER_SHIFT;
pub const HWC_RENDER_MODE_SHIFT: u32 = 28;
pub const HWC_RENDER_MODE_MASK: u32 = 0x0F << HWC_RENDER_MODE_SHIFT;

/// Result of feeding a layout word to a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutDecode {
    /// The type byte was not a stereo layout; nothing changed.
    Rejected,
    /// Type and order were applied. `newly_stereo` is set when the type
    /// changed, which means the layer must join the stereo layer set.
    Applied { newly_stereo: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StereoLayoutDescriptor {
    pub layout_type: LayoutType,
    pub order: EyeOrder,
    pub render_mode: LayerRenderMode,
}

impl StereoLayoutDescriptor {
    pub fn new(layout_type: LayoutType, order: EyeOrder, render_mode: LayerRenderMode) -> Self {
        StereoLayoutDescriptor {
            layout_type,
            order,
            render_mode,
        }
    }

    pub fn is_stereo(&self) -> bool {
        self.layout_type != LayoutType::Mono
    }

    /// Applies a layout word: type in bits 16..24, order in bits 24..32.
    ///
    /// An unknown or mono type leaves the descriptor untouched; an unknown
    /// order falls back to [`EyeOrder::LeftFirst`].
    pub fn apply_layout_word(&mut self, word: u32) -> LayoutDecode {
        let type_byte = (word >> LAYOUT_TYPE_SHIFT) & 0xFF;
        let order_byte = (word >> LAYOUT_ORDER_SHIFT) & 0xFF;

        let layout_type = match LayoutType::from_raw(type_byte) {
            Some(LayoutType::Mono) | None => return LayoutDecode::Rejected,
            Some(layout_type) => layout_type,
        };
        let previous = self.layout_type;
        self.layout_type = layout_type;
        self.order = EyeOrder::from_raw(order_byte).unwrap_or_default();
        LayoutDecode::Applied {
            newly_stereo: layout_type != previous,
        }
    }

    /// Whether `view` samples the first half of a split layout.
    pub fn draws_first_half(&self, view: Eye) -> bool {
        (view == Eye::Left) == (self.order == EyeOrder::LeftFirst)
    }

    /// Writes type, order and render mode into `flags`, leaving other bits alone.
    pub fn encode_hwc_flags(&self, flags: u32) -> u32 {
        let cleared = flags & !(HWC_TYPE_MASK | HWC_ORDER_MASK | HWC_RENDER_MODE_MASK);
        cleared
            | ((self.layout_type as u32) << HWC_TYPE_SHIFT)
            | ((self.order as u32) << HWC_ORDER_SHIFT)
            | ((self.render_mode as u32) << HWC_RENDER_MODE_SHIFT)
    }

    /// Reads the descriptor back from hardware composer flags.
    pub fn decode_hwc_flags(flags: u32) -> Option<Self> {
        Some(StereoLayoutDescriptor {
            layout_type: LayoutType::from_raw((flags & HWC_TYPE_MASK) >> HWC_TYPE_SHIFT)?,
            order: EyeOrder::from_raw((flags & HWC_ORDER_MASK) >> HWC_ORDER_SHIFT)?,
            render_mode: LayerRenderMode::from_raw((flags & HWC_RENDER_MODE_MASK) >> HWC_RENDER_MODE_SHIFT)?,
        })
    }
}

/// Builds a layout word as a producer would send it.
pub fn layout_word(layout_type: LayoutType, order: EyeOrder) -> u32 {
    ((layout_type as u32) << LAYOUT_TYPE_SHIFT) | ((order as u32) << LAYOUT_ORDER_SHIFT)
}
