// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module for the CEA-608 code tables

/// The data channel within a field that a control code references
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Channel(pub(crate) bool);

impl Channel {
    /// Channel 1
    pub const ONE: Channel = Channel(true);
    /// Channel 2
    pub const TWO: Channel = Channel(false);

    /// The channel of a control code first byte (parity stripped)
    pub fn from_control_byte(byte: u8) -> Self {
        Channel(byte & 0x08 == 0)
    }

    /// The numerical identifier of this channel
    pub fn id(&self) -> u8 {
        if self.0 {
            1
        } else {
            2
        }
    }
}

/// The field carrying CEA-608 data
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Field(pub(crate) bool);

impl Field {
    /// Field 1
    pub const ONE: Field = Field(true);
    /// Field 2
    pub const TWO: Field = Field(false);

    /// The numerical identifier of this field
    pub fn id(&self) -> u8 {
        if self.0 {
            1
        } else {
            2
        }
    }
}

/// The color options available
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Color {
    /// White. RGB value 1.0, 1.0, 1.0.
    White,
    /// Green. RGB value 0.0, 1.0, 0.0.
    Green,
    /// Blue. RGB value 0.0, 0.0, 1.0.
    Blue,
    /// Cyan. RGB value 0.0, 1.0, 1.0.
    Cyan,
    /// Red. RGB value 1.0, 0.0, 0.0.
    Red,
    /// Yellow. RGB value 1.0, 1.0, 0.0.
    Yellow,
    /// Magenta. RGB value 1.0, 0.0, 1.0.
    Magenta,
}

impl Color {
    /// The color for a 3-bit color attribute.  Attribute 7 is not a color.
    pub fn from_attribute(attribute: u8) -> Option<Self> {
        match attribute {
            0 => Some(Self::White),
            1 => Some(Self::Green),
            2 => Some(Self::Blue),
            3 => Some(Self::Cyan),
            4 => Some(Self::Red),
            5 => Some(Self::Yellow),
            6 => Some(Self::Magenta),
            _ => None,
        }
    }

    /// Solid ARGB value of this color
    pub fn argb(&self) -> u32 {
        match self {
            Self::White => 0xFFFF_FFFF,
            Self::Green => 0xFF00_FF00,
            Self::Blue => 0xFF00_00FF,
            Self::Cyan => 0xFF00_FFFF,
            Self::Red => 0xFFFF_0000,
            Self::Yellow => 0xFFFF_FF00,
            Self::Magenta => 0xFFFF_00FF,
        }
    }
}

/// Solid black
pub const COLOR_BLACK: u32 = 0xFF00_0000;

/// Fully transparent alpha
pub const OPACITY_TRANSPARENT: u8 = 0x00;
/// Translucent alpha
pub const OPACITY_TRANSLUCENT: u8 = 0xA0;
/// Solid alpha
pub const OPACITY_SOLID: u8 = 0xFF;

/// Replace the alpha of `color` with `alpha`
pub fn with_alpha(color: u32, alpha: u8) -> u32 {
    (color & 0x00FF_FFFF) | ((alpha as u32) << 24)
}

/// A text style set by a preamble address code or a mid-row code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextStyle {
    /// A foreground color
    Color(Color),
    /// White italics
    Italics,
    /// Black foreground
    Black,
}

impl TextStyle {
    /// The style for a style attribute.  0-6 are colors, 7 is italics and 8 or larger is
    /// black.
    pub fn from_attribute(attribute: u8) -> Self {
        match attribute {
            7 => Self::Italics,
            8..=u8::MAX => Self::Black,
            _ => Color::from_attribute(attribute)
                .map(Self::Color)
                .unwrap_or(Self::Black),
        }
    }
}

/// A preamble address code command contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PreambleAddressCode {
    row: u8,
    underline: bool,
    ty: PreambleType,
}

impl PreambleAddressCode {
    /// Construct a new preamble
    pub fn new(row: u8, underline: bool, code: PreambleType) -> Self {
        Self {
            row,
            underline,
            ty: code,
        }
    }

    /// The row specified in this preamble (1-15)
    pub fn row(&self) -> u8 {
        self.row
    }

    /// Whether underline is signaled in this preamble
    pub fn underline(&self) -> bool {
        self.underline
    }

    /// The complete preamble code
    pub fn code(&self) -> PreambleType {
        self.ty
    }
}

/// The type of the preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreambleType {
    /// A text style.  Never [`TextStyle::Black`].
    Style(TextStyle),
    /// Cursor placed `n` characters from the left of the screen, a multiple of 4
    Indent(u8),
}

impl PreambleType {
    /// The indent value of this [`PreambleType`]
    pub fn indent(&self) -> Option<u8> {
        match self {
            Self::Indent(indent) => Some(*indent),
            _ => None,
        }
    }
}

/// Parse a preamble address code.  `byte0` and `byte1` must be parity stripped.  The channel
/// bit of `byte0` is ignored.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::tables::*;
/// let pac = parse_preamble(0x11, 0x40).unwrap();
/// assert_eq!(pac.row(), 1);
/// assert_eq!(pac.code(), PreambleType::Style(TextStyle::Color(Color::White)));
/// let pac = parse_preamble(0x1C, 0x75).unwrap();
/// assert_eq!(pac.row(), 15);
/// assert_eq!(pac.code(), PreambleType::Indent(8));
/// assert!(pac.underline());
/// ```
pub fn parse_preamble(byte0: u8, byte1: u8) -> Option<PreambleAddressCode> {
    if !(0x10..=0x1F).contains(&byte0) || byte1 & 0x40 == 0 {
        return None;
    }
    let row = preamble_row(byte0, byte1);
    let code = (byte1 & 0x0E) >> 1;
    let ty = if byte1 & 0x10 != 0 {
        PreambleType::Indent(code * 4)
    } else {
        PreambleType::Style(TextStyle::from_attribute(code))
    };
    Some(PreambleAddressCode {
        row,
        underline: byte1 & 0x01 != 0,
        ty,
    })
}

fn preamble_row(byte0: u8, byte1: u8) -> u8 {
    let code = ((byte0 & 0x07) << 1) | ((byte1 & 0x20) >> 5);
    match code {
        0x02 => 1,
        0x03 => 2,
        0x04 => 3,
        0x05 => 4,
        0x06 => 12,
        0x07 => 13,
        0x08 => 14,
        0x09 => 15,
        0x0A => 5,
        0x0B => 6,
        0x0C => 7,
        0x0D => 8,
        0x0E => 9,
        0x0F => 10,
        _ => 11,
    }
}

/// Miscellaneous caption control codes.  These are sent with a first byte of 0x14 or 0x1C
/// on field 1 and 0x15 or 0x1D on field 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
// must be ordered the same as the byte values
pub enum CaptionControl {
    /// Changes the mode of captioning to Pop-on.  Existing displayed captions are not affected.
    ResumeCaptionLoading,
    /// Remove the character at the previous location and move the cursor one character backwards.
    Backspace,
    /// Reserved (was Alarm Off).
    AlarmOff,
    /// Reserved (was Alarm On).
    AlarmOn,
    /// Delete all characters from the current cursor position to the end of the row.
    DeleteToEndOfRow,
    /// Change the mode of captioning to Roll-Up with 2 rows.
    RollUp2,
    /// Change the mode of captioning to Roll-Up with 3 rows.
    RollUp3,
    /// Change the mode of captioning to Roll-Up with 4 rows.
    RollUp4,
    /// Indicate that the character flash on and off.
    FlashOn,
    /// Changes the mode of captioning to Paint-on.  Existing displayed captions are not affected.
    ResumeDirectionCaptioning,
    /// Enter Text mode, clearing the Text screen buffer of any contents.
    TextRestart,
    /// Enter Text mode, keeping the Text screen buffer intact.
    ResumeTextDisplay,
    /// Remove all contents from the displayed screen buffer.
    EraseDisplayedMemory,
    /// Move the cursor to the next row and column 0.
    CarriageReturn,
    /// Remove all contents from the no displayed screen buffer.
    EraseNonDisplayedMemory,
    /// Flip the non displayed and displayed screen buffer.
    EndOfCaption,
}

#[derive(Debug, Clone)]
struct ControlMap {
    byte: u8,
    control: CaptionControl,
    name: &'static str,
}

macro_rules! control_map {
    ($byte:expr, $control:expr, $name:expr) => {
        ControlMap {
            byte: $byte,
            control: $control,
            name: $name,
        }
    };
}

// needs to be sorted by byte and CaptionControl
static CONTROL_MAP_TABLE: [ControlMap; 16] = [
    control_map!(0x20, CaptionControl::ResumeCaptionLoading, "RCL"),
    control_map!(0x21, CaptionControl::Backspace, "BS"),
    control_map!(0x22, CaptionControl::AlarmOff, "AOF"),
    control_map!(0x23, CaptionControl::AlarmOn, "AON"),
    control_map!(0x24, CaptionControl::DeleteToEndOfRow, "DER"),
    control_map!(0x25, CaptionControl::RollUp2, "RU2"),
    control_map!(0x26, CaptionControl::RollUp3, "RU3"),
    control_map!(0x27, CaptionControl::RollUp4, "RU4"),
    control_map!(0x28, CaptionControl::FlashOn, "FON"),
    control_map!(0x29, CaptionControl::ResumeDirectionCaptioning, "RDC"),
    control_map!(0x2A, CaptionControl::TextRestart, "TR"),
    control_map!(0x2B, CaptionControl::ResumeTextDisplay, "RTD"),
    control_map!(0x2C, CaptionControl::EraseDisplayedMemory, "EDM"),
    control_map!(0x2D, CaptionControl::CarriageReturn, "CR"),
    control_map!(0x2E, CaptionControl::EraseNonDisplayedMemory, "ENM"),
    control_map!(0x2F, CaptionControl::EndOfCaption, "EOC"),
];

impl CaptionControl {
    /// Parse the second byte (parity stripped) of a caption control code
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::tables::CaptionControl;
    /// assert_eq!(CaptionControl::from_byte(0x2C), Some(CaptionControl::EraseDisplayedMemory));
    /// assert_eq!(CaptionControl::from_byte(0x30), None);
    /// ```
    pub fn from_byte(byte: u8) -> Option<Self> {
        CONTROL_MAP_TABLE
            .binary_search_by_key(&byte, |control_map| control_map.byte)
            .ok()
            .map(|idx| CONTROL_MAP_TABLE[idx].control)
    }

    /// Parse a caption control pair (parity stripped).  Only first bytes 0x14, 0x15, 0x1C and
    /// 0x1D carry caption control codes.
    pub fn from_pair(byte0: u8, byte1: u8) -> Option<Self> {
        match byte0 {
            0x14 | 0x15 | 0x1C | 0x1D => Self::from_byte(byte1),
            _ => None,
        }
    }

    /// The short mnemonic for this control code
    pub fn name(&self) -> &'static str {
        CONTROL_MAP_TABLE
            .binary_search_by_key(self, |control_map| control_map.control)
            .map(|idx| CONTROL_MAP_TABLE[idx].name)
            .unwrap_or("UNKNOWN")
    }

    /// Whether this control code selects the Roll-Up captioning mode
    pub fn is_roll_up(&self) -> bool {
        matches!(self, Self::RollUp2 | Self::RollUp3 | Self::RollUp4)
    }
}

// 0x11 0x30-0x3F
static SPECIAL_CHARS: [char; 16] = [
    '®', '°', '½', '¿', '™', '¢', '£', '♪', 'à', '\u{A0}', 'è', 'â', 'ê', 'î', 'ô', 'û',
];

// 0x12 0x20-0x3F followed by 0x13 0x20-0x3F
static EXTENDED_CHARS: [char; 64] = [
    // Spanish
    'Á', 'É', 'Ó', 'Ú', 'Ü', 'ü', '‘', '¡',
    // miscellaneous
    '*', '\'', '─', '©', '℠', '•', '“', '”',
    // French
    'À', 'Â', 'Ç', 'È', 'Ê', 'Ë', 'ë', 'Î', 'Ï', 'ï', 'Ô', 'Ù', 'ù', 'Û', '«', '»',
    // Portuguese
    'Ã', 'ã', 'Í', 'Ì', 'ì', 'Ò', 'ò', 'Õ', 'õ', '{', '}', '\\', '^', '_', '|', '~',
    // German
    'Ä', 'ä', 'Ö', 'ö', 'ß', '¥', '¤', '│',
    // Danish
    'Å', 'å', 'Ø', 'ø', '┌', '┐', '└', '┘',
];

/// The special character for the low nibble of a 0x11 0x30-0x3F code
///
/// # Examples
/// ```
/// # use cea_caption_decoder::tables::special_char;
/// assert_eq!(special_char(0x37), '♪');
/// ```
pub fn special_char(byte1: u8) -> char {
    SPECIAL_CHARS[(byte1 & 0x0F) as usize]
}

/// The extended character for a 0x12/0x13 0x20-0x3F code (parity stripped).  The channel bit
/// of `byte0` is ignored.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::tables::extended_char;
/// assert_eq!(extended_char(0x12, 0x20), 'Á');
/// assert_eq!(extended_char(0x1B, 0x3F), '┘');
/// ```
pub fn extended_char(byte0: u8, byte1: u8) -> char {
    let idx = (byte1 & 0x1F) as usize + (((byte0 & 0x01) as usize) << 5);
    EXTENDED_CHARS[idx]
}

/// The character for a basic CEA-608 character byte (parity stripped).  Bytes below 0x20
/// are not characters.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::tables::basic_char;
/// assert_eq!(basic_char(0x41), Some('A'));
/// assert_eq!(basic_char(0x2A), Some('á'));
/// assert_eq!(basic_char(0x14), None);
/// ```
pub fn basic_char(byte: u8) -> Option<char> {
    let c = match byte {
        0x00..=0x1F => return None,
        0x2A => 'á',
        0x5C => 'é',
        0x5E => 'í',
        0x5F => 'ó',
        0x60 => 'ú',
        0x7B => 'ç',
        0x7C => '÷',
        0x7D => 'Ñ',
        0x7E => 'ñ',
        0x7F => '♪',
        _ => (byte & 0x7F) as char,
    };
    Some(c)
}

/// Remove the parity bit
pub fn strip_parity(byte: u8) -> u8 {
    byte & 0x7F
}

/// Set the parity bit so that `byte` has odd parity
pub fn add_parity(byte: u8) -> u8 {
    debug_assert!((byte & 0x80) == 0);
    if check_odd_parity(byte) {
        byte
    } else {
        byte | 0x80
    }
}

/// Whether `byte` has odd parity
///
/// # Examples
/// ```
/// # use cea_caption_decoder::tables::check_odd_parity;
/// assert!(check_odd_parity(0x80));
/// assert!(!check_odd_parity(0x14));
/// ```
pub fn check_odd_parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 1
}
