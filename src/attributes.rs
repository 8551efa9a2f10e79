// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Pen, window and color attributes shared by the CEA-608 and CEA-708 decoders

/// The maximum number of windows
pub const MAX_WINDOWS: usize = 8;

macro_rules! attribute_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $mask:expr, {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Parse from the bits of a command byte.  Reserved values map to the default.
            pub fn from_bits(bits: u8) -> Self {
                Self::try_from((bits & $mask) as u32).unwrap_or_default()
            }

            /// The on-wire value
            pub fn to_bits(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u32> for $name {
            type Error = u32;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                $(
                    if value == $value {
                        return Ok(Self::$variant);
                    }
                )+
                Err(value)
            }
        }
    };
}

attribute_enum!(
    /// Text justification within a window
    WindowJustify, 0x03, {
        #[default]
        Left = 0,
        Right = 1,
        Center = 2,
        Full = 3,
    }
);

attribute_enum!(
    /// The direction text is printed in
    PrintDirection, 0x03, {
        #[default]
        LeftRight = 0,
        RightLeft = 1,
        TopBottom = 2,
        BottomTop = 3,
    }
);

impl PrintDirection {
    /// Whether text advances horizontally
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }
}

attribute_enum!(
    /// The direction text scrolls in on a carriage return
    ScrollDirection, 0x03, {
        LeftRight = 0,
        RightLeft = 1,
        TopBottom = 2,
        #[default]
        BottomTop = 3,
    }
);

attribute_enum!(
    /// The effect used when a window is displayed or hidden
    DisplayEffect, 0x03, {
        #[default]
        Snap = 0,
        Fade = 1,
        Wipe = 2,
    }
);

attribute_enum!(
    /// The direction of a fade or wipe [`DisplayEffect`]
    EffectDirection, 0x03, {
        #[default]
        LeftRight = 0,
        RightLeft = 1,
        TopBottom = 2,
        BottomTop = 3,
    }
);

attribute_enum!(
    /// The type of border drawn around a window
    WindowBorder, 0x07, {
        #[default]
        None = 0,
        Raised = 1,
        Depressed = 2,
        Uniform = 3,
        ShadowLeft = 4,
        ShadowRight = 5,
    }
);

attribute_enum!(
    /// The size of the pen
    PenSize, 0x03, {
        Small = 0,
        #[default]
        Standard = 1,
        Large = 2,
        ExtraLarge = 3,
    }
);

attribute_enum!(
    /// The font style of the pen
    PenFontStyle, 0x07, {
        #[default]
        Default = 0,
        MonospacedWithSerifs = 1,
        ProportionallySpacedWithSerifs = 2,
        MonospacedWithoutSerifs = 3,
        ProportionallySpacedWithoutSerifs = 4,
        Casual = 5,
        Cursive = 6,
        SmallCapitals = 7,
    }
);

attribute_enum!(
    /// The type of text written by the pen
    PenTextTag, 0x0F, {
        Dialog = 0,
        SourceOrSpeakerId = 1,
        ElectronicVoice = 2,
        ForeignLanguage = 3,
        Voiceover = 4,
        AudibleTranslation = 5,
        SubtitleTranslation = 6,
        VoiceQualityDescription = 7,
        SongLyrics = 8,
        SoundEffectDescription = 9,
        MusicalScoreDescription = 10,
        Expletive = 11,
        #[default]
        Undefined0 = 12,
        Undefined1 = 13,
        Undefined2 = 14,
        NotToBeDisplayed = 15,
    }
);

attribute_enum!(
    /// The vertical offset of the pen
    PenOffset, 0x03, {
        Subscript = 0,
        #[default]
        Normal = 1,
        Superscript = 2,
    }
);

attribute_enum!(
    /// The edge drawn around glyphs
    PenEdge, 0x07, {
        #[default]
        None = 0,
        Raised = 1,
        Depressed = 2,
        Uniform = 3,
        LeftDropShadow = 4,
        RightDropShadow = 5,
    }
);

attribute_enum!(
    /// The point of a window its anchor position refers to
    AnchorPoint, 0x0F, {
        #[default]
        TopLeft = 0,
        TopCenter = 1,
        TopRight = 2,
        MiddleLeft = 3,
        MiddleCenter = 4,
        MiddleRight = 5,
        BottomLeft = 6,
        BottomCenter = 7,
        BottomRight = 8,
    }
);

attribute_enum!(
    /// The opacity of a color
    Opacity, 0x03, {
        #[default]
        Solid = 0,
        Flash = 1,
        Translucent = 2,
        Transparent = 3,
    }
);

impl Opacity {
    /// The alpha value for this opacity
    pub fn alpha(&self) -> u8 {
        match self {
            Self::Solid => 255,
            Self::Flash => 250,
            Self::Translucent => 100,
            Self::Transparent => 0,
        }
    }
}

/// The current phase of flashing text
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FlashControl {
    /// Flashing text is visible
    #[default]
    Show,
    /// Flashing text is hidden
    Hide,
}

impl FlashControl {
    /// The other phase
    pub fn toggled(self) -> Self {
        match self {
            Self::Show => Self::Hide,
            Self::Hide => Self::Show,
        }
    }
}

/// CEA-708 white in the 6-bit color space
pub const COLOR_WHITE: u8 = 0x3F;
/// CEA-708 black in the 6-bit color space
pub const COLOR_BLACK: u8 = 0x00;

/// Replace the alpha of an ARGB `color` with the alpha for the 2-bit `opacity` code
///
/// # Examples
/// ```
/// # use cea_caption_decoder::attributes::set_opacity;
/// assert_eq!(set_opacity(0x12345678, 0), 0xFF345678);
/// assert_eq!(set_opacity(0xFF345678, 3), 0x00345678);
/// ```
pub fn set_opacity(color: u32, opacity: u8) -> u32 {
    let alpha = Opacity::from_bits(opacity).alpha() as u32;
    (color & 0x00FF_FFFF) | (alpha << 24)
}

/// Convert a CEA-708 6-bit `rgb` color and 2-bit `opacity` code into a packed ARGB value
///
/// Each 2-bit color component maps to 0, 85, 170 or 255.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::attributes::decode_color;
/// assert_eq!(decode_color(0x3F, 0), 0xFFFFFFFF);
/// assert_eq!(decode_color(0x30, 2), 0x64FF0000);
/// assert_eq!(decode_color(0x15, 3), 0x00555555);
/// ```
pub fn decode_color(rgb: u8, opacity: u8) -> u32 {
    let component = |shift: u8| ((rgb >> shift) & 0x03) as u32 * 85;
    let color = (component(4) << 16) | (component(2) << 8) | component(0);
    set_opacity(color, opacity)
}

/// The colors used by the pen
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PenColor {
    /// Foreground ARGB color
    pub fg_color: u32,
    /// Background ARGB color
    pub bg_color: u32,
    /// Edge ARGB color
    pub edge_color: u32,
}

impl Default for PenColor {
    fn default() -> Self {
        Self {
            fg_color: decode_color(COLOR_WHITE, 0),
            bg_color: decode_color(COLOR_BLACK, 0),
            edge_color: decode_color(COLOR_WHITE, 0),
        }
    }
}

impl PenColor {
    /// Decode the 3 argument bytes of a SetPenColor command.  The edge opacity is inherited
    /// from the foreground opacity.
    pub fn from_command(data: [u8; 3]) -> Self {
        Self {
            fg_color: decode_color(data[0] & 0x3F, data[0] >> 6),
            bg_color: decode_color(data[1] & 0x3F, data[1] >> 6),
            edge_color: decode_color(data[2] & 0x3F, data[0] >> 6),
        }
    }
}

/// The style of the pen
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PenAttributes {
    /// The pen size
    pub pen_size: PenSize,
    /// Sub/superscript offset
    pub offset: PenOffset,
    /// The type of text
    pub text_tag: PenTextTag,
    /// The font style
    pub font_tag: PenFontStyle,
    /// The glyph edge
    pub edge_type: PenEdge,
    /// Underlined text
    pub underline: bool,
    /// Italic text
    pub italics: bool,
    /// Flashing text
    pub flashing: bool,
    /// The pen colors
    pub pen_color: PenColor,
}

impl PenAttributes {
    /// Decode the 2 argument bytes of a SetPenAttributes command.  The pen color is left at
    /// its default.
    pub fn from_command(data: [u8; 2]) -> Self {
        Self {
            pen_size: PenSize::from_bits(data[0]),
            offset: PenOffset::from_bits(data[0] >> 2),
            text_tag: PenTextTag::from_bits(data[0] >> 4),
            font_tag: PenFontStyle::from_bits(data[1]),
            edge_type: PenEdge::from_bits(data[1] >> 3),
            underline: (data[1] >> 6) & 0x01 != 0,
            italics: (data[1] >> 7) & 0x01 != 0,
            ..Default::default()
        }
    }

    /// One of the 7 predefined pen styles.  Style 0 and 1 are the default.
    pub fn predefined(style: u8) -> Self {
        let mut attrs = Self::default();
        match style {
            2 => attrs.font_tag = PenFontStyle::MonospacedWithSerifs,
            3 => attrs.font_tag = PenFontStyle::ProportionallySpacedWithSerifs,
            4 => attrs.font_tag = PenFontStyle::MonospacedWithoutSerifs,
            5 => attrs.font_tag = PenFontStyle::ProportionallySpacedWithoutSerifs,
            6 | 7 => {
                attrs.font_tag = if style == 6 {
                    PenFontStyle::MonospacedWithoutSerifs
                } else {
                    PenFontStyle::ProportionallySpacedWithoutSerifs
                };
                attrs.edge_type = PenEdge::Uniform;
                attrs.pen_color.bg_color = set_opacity(attrs.pen_color.bg_color, 3);
            }
            _ => (),
        }
        attrs
    }
}

/// The style of a window
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WindowAttributes {
    /// Text justification
    pub justify: WindowJustify,
    /// Print direction
    pub print_direction: PrintDirection,
    /// Scroll direction
    pub scroll_direction: ScrollDirection,
    /// Word wrapping
    pub word_wrap: bool,
    /// Display effect
    pub display_effect: DisplayEffect,
    /// Display effect direction
    pub effect_direction: EffectDirection,
    /// Display effect speed in units of 0.5 seconds
    pub effect_speed: u8,
    /// Fill ARGB color
    pub fill_color: u32,
    /// Border type
    pub border_type: WindowBorder,
    /// Border ARGB color
    pub border_color: u32,
}

impl Default for WindowAttributes {
    fn default() -> Self {
        Self {
            justify: WindowJustify::default(),
            print_direction: PrintDirection::default(),
            scroll_direction: ScrollDirection::default(),
            word_wrap: false,
            display_effect: DisplayEffect::default(),
            effect_direction: EffectDirection::default(),
            effect_speed: 0,
            fill_color: decode_color(COLOR_BLACK, 0),
            border_type: WindowBorder::default(),
            border_color: decode_color(COLOR_BLACK, 0),
        }
    }
}

impl WindowAttributes {
    /// Decode the 4 argument bytes of a SetWindowAttributes command
    pub fn from_command(data: [u8; 4]) -> Self {
        Self {
            fill_color: decode_color(data[0] & 0x3F, data[0] >> 6),
            border_color: decode_color(data[1] & 0x3F, 0),
            justify: WindowJustify::from_bits(data[2]),
            scroll_direction: ScrollDirection::from_bits(data[2] >> 2),
            print_direction: PrintDirection::from_bits(data[2] >> 4),
            word_wrap: (data[2] >> 6) & 0x01 != 0,
            border_type: WindowBorder::from_bits(((data[2] >> 5) & 0x04) | ((data[1] >> 6) & 0x03)),
            display_effect: DisplayEffect::from_bits(data[3]),
            effect_direction: EffectDirection::from_bits(data[3] >> 2),
            effect_speed: (data[3] >> 4) & 0x0F,
        }
    }

    /// One of the 7 predefined window styles.  Style 0 and 1 are the default.
    pub fn predefined(style: u8) -> Self {
        let mut attrs = Self::default();
        match style {
            2 => attrs.fill_color = set_opacity(attrs.fill_color, 3),
            3 => attrs.justify = WindowJustify::Center,
            4 => attrs.word_wrap = true,
            5 => {
                attrs.word_wrap = true;
                attrs.fill_color = set_opacity(attrs.fill_color, 3);
            }
            6 => {
                attrs.justify = WindowJustify::Center;
                attrs.word_wrap = true;
            }
            7 => {
                attrs.print_direction = PrintDirection::TopBottom;
                attrs.scroll_direction = ScrollDirection::RightLeft;
            }
            _ => (),
        }
        attrs
    }
}

/// The definition of a window
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct WindowDefinition {
    /// Window identifier, 0-7
    pub id: u8,
    /// Display priority, 0 is the highest
    pub priority: u8,
    /// Whether the column count is locked
    pub col_lock: bool,
    /// Whether the row count is locked
    pub row_lock: bool,
    /// Whether the window is visible
    pub visible: bool,
    /// Whether the anchor position is a percentage of the screen
    pub relative_pos: bool,
    /// Vertical anchor position
    pub anchor_vertical: u8,
    /// Horizontal anchor position
    pub anchor_horizontal: u8,
    /// The point of the window the anchor refers to
    pub anchor_point: AnchorPoint,
    /// The number of rows
    pub row_count: u8,
    /// The number of columns
    pub col_count: u8,
    /// The pen style
    pub pen_style: PenAttributes,
    /// The window style
    pub win_style: WindowAttributes,
}

impl WindowDefinition {
    /// Decode a DefineWindow command for window `id` from its 6 argument bytes
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::*;
    /// let def = WindowDefinition::from_command(2, [0x20 | 0x03, 0x4A, 0x10, 0x22, 0x1F, 0x09]);
    /// assert_eq!(def.id, 2);
    /// assert_eq!(def.priority, 3);
    /// assert!(def.visible);
    /// assert_eq!(def.anchor_vertical, 0x4A);
    /// assert_eq!(def.anchor_horizontal, 0x10);
    /// assert_eq!(def.row_count, 3);
    /// assert_eq!(def.col_count, 32);
    /// ```
    pub fn from_command(id: u8, data: [u8; 6]) -> Self {
        Self {
            id,
            priority: data[0] & 0x07,
            col_lock: (data[0] >> 3) & 0x01 != 0,
            row_lock: (data[0] >> 4) & 0x01 != 0,
            visible: (data[0] >> 5) & 0x01 != 0,
            anchor_vertical: data[1] & 0x7F,
            relative_pos: data[1] >> 7 != 0,
            anchor_horizontal: data[2],
            row_count: (data[3] & 0x0F) + 1,
            anchor_point: AnchorPoint::from_bits(data[3] >> 4),
            col_count: (data[4] & 0x3F) + 1,
            pen_style: PenAttributes::predefined(data[5] & 0x07),
            win_style: WindowAttributes::predefined((data[5] >> 3) & 0x07),
        }
    }
}

/// A set of window identifiers, bit `n` selecting window `n`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct WindowMask(u8);

impl WindowMask {
    /// No windows
    pub const NONE: WindowMask = WindowMask(0);
    /// All windows
    pub const ALL: WindowMask = WindowMask(0xFF);

    /// Construct a mask from the raw command byte
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// A mask selecting the single window `id`.  Out of range identifiers select nothing.
    pub fn single(id: u8) -> Self {
        if (id as usize) < MAX_WINDOWS {
            Self(1 << id)
        } else {
            Self::NONE
        }
    }

    /// The raw bits
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether window `id` is selected
    pub fn contains(&self, id: u8) -> bool {
        (id as usize) < MAX_WINDOWS && self.0 & (1 << id) != 0
    }

    /// Select window `id`
    pub fn insert(&mut self, id: u8) {
        *self = *self | Self::single(id);
    }

    /// Whether no window is selected
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the selected window identifiers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0..MAX_WINDOWS as u8).filter(move |id| bits & (1 << id) != 0)
    }
}

impl std::ops::BitOr for WindowMask {
    type Output = WindowMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        WindowMask(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;

    #[test]
    fn opacity_alpha_for_any_color() {
        test_init_log();
        for rgb in 0..=0x3F {
            for (opacity, alpha) in [(0, 255), (1, 250), (2, 100), (3, 0)] {
                let color = decode_color(rgb, opacity);
                assert_eq!(color >> 24, alpha, "rgb {rgb:#x} opacity {opacity}");
            }
        }
    }

    #[test]
    fn color_components() {
        test_init_log();
        assert_eq!(decode_color(0x00, 0) & 0x00FF_FFFF, 0x000000);
        assert_eq!(decode_color(0x10, 0) & 0x00FF_FFFF, 0x550000);
        assert_eq!(decode_color(0x08, 0) & 0x00FF_FFFF, 0x00AA00);
        assert_eq!(decode_color(0x03, 0) & 0x00FF_FFFF, 0x0000FF);
    }

    #[test]
    fn reserved_values_default() {
        test_init_log();
        assert_eq!(PenOffset::from_bits(3), PenOffset::Normal);
        assert_eq!(PenEdge::from_bits(7), PenEdge::None);
        assert_eq!(AnchorPoint::from_bits(0x0C), AnchorPoint::TopLeft);
        assert_eq!(DisplayEffect::from_bits(3), DisplayEffect::Snap);
        assert_eq!(PenTextTag::from_bits(0xFF), PenTextTag::NotToBeDisplayed);
        assert_eq!(PenSize::try_from(4), Err(4));
        assert_eq!(PenSize::try_from(3), Ok(PenSize::ExtraLarge));
    }

    #[test]
    fn pen_attributes_command() {
        test_init_log();
        let attrs = PenAttributes::from_command([0x02 | 0x08 | 0xF0, 0x03 | 0x18 | 0x40 | 0x80]);
        assert_eq!(attrs.pen_size, PenSize::Large);
        assert_eq!(attrs.offset, PenOffset::Superscript);
        assert_eq!(attrs.text_tag, PenTextTag::NotToBeDisplayed);
        assert_eq!(attrs.font_tag, PenFontStyle::MonospacedWithoutSerifs);
        assert_eq!(attrs.edge_type, PenEdge::Uniform);
        assert!(attrs.underline);
        assert!(attrs.italics);
        assert!(!attrs.flashing);
    }

    #[test]
    fn pen_color_edge_inherits_fg_opacity() {
        test_init_log();
        let color = PenColor::from_command([0x80 | 0x30, 0xC0 | 0x0C, 0x03]);
        assert_eq!(color.fg_color, 0x64FF_0000);
        assert_eq!(color.bg_color, 0x0000_FF00);
        assert_eq!(color.edge_color, 0x6400_00FF);
    }

    #[test]
    fn window_attributes_command() {
        test_init_log();
        let attrs = WindowAttributes::from_command([0xC0 | 0x3F, 0x80 | 0x03, 0x80 | 0x40 | 0x20 | 0x04 | 0x02, 0x50 | 0x08 | 0x01]);
        assert_eq!(attrs.fill_color, 0x00FF_FFFF);
        assert_eq!(attrs.border_color, 0xFF00_00FF);
        assert_eq!(attrs.justify, WindowJustify::Center);
        assert_eq!(attrs.scroll_direction, ScrollDirection::RightLeft);
        assert_eq!(attrs.print_direction, PrintDirection::TopBottom);
        assert!(attrs.word_wrap);
        assert_eq!(attrs.border_type, WindowBorder::ShadowRight);
        assert_eq!(attrs.display_effect, DisplayEffect::Fade);
        assert_eq!(attrs.effect_direction, EffectDirection::TopBottom);
        assert_eq!(attrs.effect_speed, 5);
    }

    #[test]
    fn predefined_styles() {
        test_init_log();
        assert_eq!(WindowAttributes::predefined(1), WindowAttributes::default());
        assert_eq!(WindowAttributes::predefined(2).fill_color >> 24, 0);
        let style7 = WindowAttributes::predefined(7);
        assert_eq!(style7.print_direction, PrintDirection::TopBottom);
        assert_eq!(style7.scroll_direction, ScrollDirection::RightLeft);
        let pen6 = PenAttributes::predefined(6);
        assert_eq!(pen6.font_tag, PenFontStyle::MonospacedWithoutSerifs);
        assert_eq!(pen6.edge_type, PenEdge::Uniform);
        assert_eq!(pen6.pen_color.bg_color, 0x0000_0000);
        assert_eq!(PenAttributes::predefined(0), PenAttributes::default());
    }

    #[test]
    fn window_mask() {
        test_init_log();
        let mut mask = WindowMask::from_bits(0b1000_0101);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(7));
        assert!(!mask.contains(8));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2, 7]);
        mask.insert(1);
        assert_eq!(mask.bits(), 0b1000_0111);
        assert_eq!(WindowMask::single(9), WindowMask::NONE);
        assert_eq!(WindowMask::ALL.iter().count(), 8);
    }
}
