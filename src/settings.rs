// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! User overrides of the broadcast caption style
//!
//! Every overridable attribute keeps the value embedded in the caption stream and an optional
//! value chosen by the viewer.  The viewer's choice wins when present.

use crate::attributes::{
    set_opacity, Opacity, PenAttributes, PenColor, PenEdge, PenFontStyle, PenSize,
    WindowAttributes, WindowBorder,
};
use crate::AttributeError;

/// User value requesting the embedded color
pub const USE_EMBEDDED_COLOR: u32 = 0xFF00_0000;
/// User value requesting the embedded value for any non-color attribute
pub const USE_EMBEDDED_VALUE: u32 = 0xFFFF_FFFF;

/// A single overridable attribute
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Setting<T> {
    embedded: T,
    user: Option<T>,
}

impl<T: Copy> Setting<T> {
    /// Store the value received from the caption stream
    pub fn set_embedded(&mut self, value: T) {
        self.embedded = value;
    }

    /// Store the value chosen by the user.  `None` reverts to the embedded value.
    pub fn set_user(&mut self, value: Option<T>) {
        self.user = value;
    }

    /// The value in effect
    pub fn value(&self) -> T {
        self.user.unwrap_or(self.embedded)
    }
}

/// An overridable ARGB color.  The color and the opacity are overridden separately.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::settings::ColorSetting;
/// # use cea_caption_decoder::attributes::Opacity;
/// let mut color = ColorSetting::default();
/// color.set_embedded(0xFF112233);
/// color.set_user_color(Some(0x00FF0000));
/// assert_eq!(color.value(), 0xFFFF0000);
/// color.set_user_opacity(Some(Opacity::Transparent));
/// assert_eq!(color.value(), 0x00FF0000);
/// color.set_user_color(None);
/// assert_eq!(color.value(), 0x00112233);
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ColorSetting {
    embedded: u32,
    user_color: Option<u32>,
    user_opacity: Option<Opacity>,
}

impl ColorSetting {
    /// Store the color received from the caption stream
    pub fn set_embedded(&mut self, argb: u32) {
        self.embedded = argb;
    }

    /// Store the RGB color chosen by the user.  `None` reverts to the embedded color.
    pub fn set_user_color(&mut self, rgb: Option<u32>) {
        self.user_color = rgb;
    }

    /// Store the opacity chosen by the user.  `None` reverts to the embedded alpha.
    pub fn set_user_opacity(&mut self, opacity: Option<Opacity>) {
        self.user_opacity = opacity;
    }

    /// The ARGB color in effect
    pub fn value(&self) -> u32 {
        let rgb = self.user_color.unwrap_or(self.embedded) & 0x00FF_FFFF;
        match self.user_opacity {
            Some(opacity) => set_opacity(rgb, opacity.to_bits()),
            None => rgb | (self.embedded & 0xFF00_0000),
        }
    }
}

/// The type of a user attribute.  Each type is a single bit of the attribute mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CcAttribType(u32);

impl CcAttribType {
    /// Text color
    pub const FONT_COLOR: CcAttribType = CcAttribType(0x0001);
    /// Text background color
    pub const BACKGROUND_COLOR: CcAttribType = CcAttribType(0x0002);
    /// Text opacity
    pub const FONT_OPACITY: CcAttribType = CcAttribType(0x0004);
    /// Text background opacity
    pub const BACKGROUND_OPACITY: CcAttribType = CcAttribType(0x0008);
    /// Font style
    pub const FONT_STYLE: CcAttribType = CcAttribType(0x0010);
    /// Pen size
    pub const FONT_SIZE: CcAttribType = CcAttribType(0x0020);
    /// Italics
    pub const FONT_ITALIC: CcAttribType = CcAttribType(0x0040);
    /// Underline
    pub const FONT_UNDERLINE: CcAttribType = CcAttribType(0x0080);
    /// Window border type
    pub const BORDER_TYPE: CcAttribType = CcAttribType(0x0100);
    /// Window border color
    pub const BORDER_COLOR: CcAttribType = CcAttribType(0x0200);
    /// Window fill color
    pub const WIN_COLOR: CcAttribType = CcAttribType(0x0400);
    /// Window fill opacity
    pub const WIN_OPACITY: CcAttribType = CcAttribType(0x0800);
    /// Glyph edge type
    pub const EDGE_TYPE: CcAttribType = CcAttribType(0x1000);
    /// Glyph edge color
    pub const EDGE_COLOR: CcAttribType = CcAttribType(0x2000);

    const ALL_BITS: u32 = 0x3FFF;

    /// The attribute type for a single mask bit
    pub fn from_bit(bit: u32) -> Result<Self, AttributeError> {
        if bit.count_ones() == 1 && bit & Self::ALL_BITS != 0 {
            Ok(Self(bit))
        } else {
            Err(AttributeError::UnknownAttribute(bit))
        }
    }

    /// The mask bit of this attribute type
    pub fn bit(&self) -> u32 {
        self.0
    }
}

/// A set of user attribute values, as received in a set attributes request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CcAttributes {
    attributes: Vec<(CcAttribType, u32)>,
}

impl CcAttributes {
    /// Construct from a list of attribute values
    pub fn new(attributes: Vec<(CcAttribType, u32)>) -> Self {
        Self { attributes }
    }

    /// Parse a little-endian attribute mask followed by one little-endian value for each set
    /// bit, lowest bit first.
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::*;
    /// let data = [0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x02, 0x00, 0x00, 0x00];
    /// let attrs = CcAttributes::parse(&data).unwrap();
    /// let values = attrs.iter().copied().collect::<Vec<_>>();
    /// assert_eq!(
    ///     values,
    ///     [(CcAttribType::FONT_COLOR, 0xFF0000), (CcAttribType::FONT_SIZE, 2)]
    /// );
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self, AttributeError> {
        let mut words = data
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        let mask = words.next().unwrap_or(0);

        let expected = 4 * (1 + mask.count_ones() as usize);
        if data.len() != expected {
            return Err(AttributeError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut attributes = Vec::with_capacity(mask.count_ones() as usize);
        for shift in 0..u32::BITS {
            let bit = 1 << shift;
            if mask & bit == 0 {
                continue;
            }
            let ty = CcAttribType::from_bit(bit)?;
            let value = words.next().ok_or(AttributeError::LengthMismatch {
                expected,
                actual: data.len(),
            })?;
            attributes.push((ty, value));
        }

        Ok(Self { attributes })
    }

    /// Iterate over the attribute values in mask order
    pub fn iter(&self) -> impl Iterator<Item = &(CcAttribType, u32)> {
        self.attributes.iter()
    }

    /// The number of attribute values
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether there are no attribute values
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// The effective caption style combining the embedded style with user overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    fg_color: ColorSetting,
    bg_color: ColorSetting,
    edge_color: ColorSetting,
    embedded_pen: PenAttributes,
    pen_size: Setting<PenSize>,
    edge_type: Setting<PenEdge>,
    italics: Setting<bool>,
    underline: Setting<bool>,
    font_style: Setting<PenFontStyle>,
    embedded_window: WindowAttributes,
    border_type: Setting<WindowBorder>,
    border_color: ColorSetting,
    fill_color: ColorSetting,
}

fn user_value<T: TryFrom<u32>>(
    attribute: CcAttribType,
    value: u32,
) -> Result<Option<T>, AttributeError> {
    if value == USE_EMBEDDED_VALUE {
        return Ok(None);
    }
    T::try_from(value)
        .map(Some)
        .map_err(|_| AttributeError::InvalidValue { attribute, value })
}

fn user_flag(attribute: CcAttribType, value: u32) -> Result<Option<bool>, AttributeError> {
    match value {
        USE_EMBEDDED_VALUE => Ok(None),
        0 => Ok(Some(false)),
        1 => Ok(Some(true)),
        _ => Err(AttributeError::InvalidValue { attribute, value }),
    }
}

fn user_color(value: u32) -> Option<u32> {
    (value != USE_EMBEDDED_COLOR).then_some(value & 0x00FF_FFFF)
}

impl Default for UserSettings {
    fn default() -> Self {
        let mut settings = Self {
            fg_color: ColorSetting::default(),
            bg_color: ColorSetting::default(),
            edge_color: ColorSetting::default(),
            embedded_pen: PenAttributes::default(),
            pen_size: Setting::default(),
            edge_type: Setting::default(),
            italics: Setting::default(),
            underline: Setting::default(),
            font_style: Setting::default(),
            embedded_window: WindowAttributes::default(),
            border_type: Setting::default(),
            border_color: ColorSetting::default(),
            fill_color: ColorSetting::default(),
        };
        settings.on_embedded_pen_color(&PenColor::default());
        settings.on_embedded_pen_attributes(&PenAttributes::default());
        settings.on_embedded_window_attributes(&WindowAttributes::default());
        settings
    }
}

impl UserSettings {
    /// Store the pen color received from the caption stream
    pub fn on_embedded_pen_color(&mut self, color: &PenColor) {
        self.fg_color.set_embedded(color.fg_color);
        self.bg_color.set_embedded(color.bg_color);
        self.edge_color.set_embedded(color.edge_color);
    }

    /// Store the pen attributes received from the caption stream
    pub fn on_embedded_pen_attributes(&mut self, attrs: &PenAttributes) {
        self.embedded_pen = *attrs;
        self.pen_size.set_embedded(attrs.pen_size);
        self.edge_type.set_embedded(attrs.edge_type);
        self.italics.set_embedded(attrs.italics);
        self.underline.set_embedded(attrs.underline);
        self.font_style.set_embedded(attrs.font_tag);
    }

    /// Store the window attributes received from the caption stream
    pub fn on_embedded_window_attributes(&mut self, attrs: &WindowAttributes) {
        self.embedded_window = *attrs;
        self.border_type.set_embedded(attrs.border_type);
        self.border_color.set_embedded(attrs.border_color);
        self.fill_color.set_embedded(attrs.fill_color);
    }

    /// Apply a single user attribute.  On error the previous value is kept.
    pub fn apply(&mut self, attribute: CcAttribType, value: u32) -> Result<(), AttributeError> {
        debug!("user attribute {:#06x} = {value:#x}", attribute.bit());
        match attribute {
            CcAttribType::FONT_COLOR => self.fg_color.set_user_color(user_color(value)),
            CcAttribType::FONT_OPACITY => self
                .fg_color
                .set_user_opacity(user_value(attribute, value)?),
            CcAttribType::BACKGROUND_COLOR => self.bg_color.set_user_color(user_color(value)),
            CcAttribType::BACKGROUND_OPACITY => self
                .bg_color
                .set_user_opacity(user_value(attribute, value)?),
            CcAttribType::EDGE_COLOR => self.edge_color.set_user_color(user_color(value)),
            CcAttribType::FONT_SIZE => self.pen_size.set_user(user_value(attribute, value)?),
            CcAttribType::EDGE_TYPE => self.edge_type.set_user(user_value(attribute, value)?),
            CcAttribType::FONT_ITALIC => self.italics.set_user(user_flag(attribute, value)?),
            CcAttribType::FONT_UNDERLINE => {
                self.underline.set_user(user_flag(attribute, value)?)
            }
            CcAttribType::FONT_STYLE => self.font_style.set_user(user_value(attribute, value)?),
            CcAttribType::BORDER_TYPE => {
                self.border_type.set_user(user_value(attribute, value)?)
            }
            CcAttribType::BORDER_COLOR => self.border_color.set_user_color(user_color(value)),
            CcAttribType::WIN_COLOR => self.fill_color.set_user_color(user_color(value)),
            CcAttribType::WIN_OPACITY => self
                .fill_color
                .set_user_opacity(user_value(attribute, value)?),
            _ => return Err(AttributeError::UnknownAttribute(attribute.bit())),
        }
        Ok(())
    }

    /// The effective pen color
    pub fn pen_color(&self) -> PenColor {
        PenColor {
            fg_color: self.fg_color.value(),
            bg_color: self.bg_color.value(),
            edge_color: self.edge_color.value(),
        }
    }

    /// The effective pen attributes, including the effective pen color
    pub fn pen_attributes(&self) -> PenAttributes {
        PenAttributes {
            pen_color: self.pen_color(),
            pen_size: self.pen_size.value(),
            edge_type: self.edge_type.value(),
            italics: self.italics.value(),
            underline: self.underline.value(),
            font_tag: self.font_style.value(),
            ..self.embedded_pen
        }
    }

    /// The effective window attributes
    pub fn window_attributes(&self) -> WindowAttributes {
        WindowAttributes {
            border_type: self.border_type.value(),
            border_color: self.border_color.value(),
            fill_color: self.fill_color.value(),
            ..self.embedded_window
        }
    }
}
