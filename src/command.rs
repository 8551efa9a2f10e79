// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module for the CEA-708 [`CommandCode`] table

/// The class of a CEA-708 byte, selecting how it is decoded
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodeClass {
    /// The EXT1 escape into the extended code space
    Ext1,
    /// C0 control codes, 0x00-0x1F
    C0,
    /// G0 characters (ASCII), 0x20-0x7F
    G0,
    /// C1 control codes, 0x80-0x9F
    C1,
    /// G1 characters (Latin-1), 0xA0-0xFF
    G1,
}

impl CodeClass {
    /// The class of `byte`
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::command::CodeClass;
    /// assert_eq!(CodeClass::from_byte(0x10), CodeClass::Ext1);
    /// assert_eq!(CodeClass::from_byte(0x41), CodeClass::G0);
    /// assert_eq!(CodeClass::from_byte(0x98), CodeClass::C1);
    /// ```
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            EXT1 => Self::Ext1,
            0x00..=0x1F => Self::C0,
            0x20..=0x7F => Self::G0,
            0x80..=0x9F => Self::C1,
            _ => Self::G1,
        }
    }
}

/// The class of a byte following an EXT1 escape
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtendedClass {
    /// C2 control codes, 0x00-0x1F
    C2,
    /// G2 and G3 characters, 0x20-0x7F and 0xA0-0xFF
    G2G3,
    /// C3 control codes, 0x80-0x9F
    C3,
}

impl ExtendedClass {
    /// The class of the byte following EXT1
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00..=0x1F => Self::C2,
            0x80..=0x9F => Self::C3,
            _ => Self::G2G3,
        }
    }
}

/// The EXT1 escape code
pub const EXT1: u8 = 0x10;

/// A CEA-708 C0 or C1 command
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
// must be ordered the same as the byte values for binary search to be successful
pub enum CommandCode {
    /// Null
    Nul,
    /// End of text
    Etx,
    /// Backspace
    Bs,
    /// Form feed
    Ff,
    /// Carriage return
    Cr,
    /// Horizontal carriage return
    Hcr,
    /// Extended code escape
    Ext1,
    /// Two byte padding
    P16,
    /// Set the current window
    SetCurrentWindow(u8),
    /// Clear windows
    ClearWindows,
    /// Display windows
    DisplayWindows,
    /// Hide windows
    HideWindows,
    /// Toggle windows
    ToggleWindows,
    /// Delete windows
    DeleteWindows,
    /// Delay processing
    Delay,
    /// Cancel a delay
    DelayCancel,
    /// Reset the service
    Reset,
    /// Set pen attributes
    SetPenAttributes,
    /// Set pen color
    SetPenColor,
    /// Set pen location
    SetPenLocation,
    /// Reserved C1 code
    Reserved1(u8),
    /// Set window attributes
    SetWindowAttributes,
    /// Define a window
    DefineWindow(u8),
    /// An unassigned code
    Unknown(u8),
}

#[derive(Debug, Clone)]
struct CommandMap {
    byte: u8,
    code: CommandCode,
    name: &'static str,
    description: &'static str,
    len: usize,
}

macro_rules! command_map {
    ($byte:expr, $code:expr, $name:expr, $description:expr, $len:expr) => {
        CommandMap {
            byte: $byte,
            code: $code,
            name: $name,
            description: $description,
            len: $len,
        }
    };
}

// needs to be sorted by byte and CommandCode
static COMMAND_MAP_TABLE: [CommandMap; 40] = [
    command_map!(0x00, CommandCode::Nul, "NUL", "Null", 1),
    command_map!(0x03, CommandCode::Etx, "ETX", "End of Text", 1),
    command_map!(0x08, CommandCode::Bs, "BS", "Backspace", 1),
    command_map!(0x0C, CommandCode::Ff, "FF", "Form Feed", 1),
    command_map!(0x0D, CommandCode::Cr, "CR", "Carriage Return", 1),
    command_map!(0x0E, CommandCode::Hcr, "HCR", "Horizontal Carriage Return", 1),
    command_map!(0x10, CommandCode::Ext1, "EXT1", "Extended Code Escape", 2),
    command_map!(0x18, CommandCode::P16, "P16", "Two Byte Padding", 3),
    command_map!(0x80, CommandCode::SetCurrentWindow(0), "CW0", "SetCurrentWindow0", 1),
    command_map!(0x81, CommandCode::SetCurrentWindow(1), "CW1", "SetCurrentWindow1", 1),
    command_map!(0x82, CommandCode::SetCurrentWindow(2), "CW2", "SetCurrentWindow2", 1),
    command_map!(0x83, CommandCode::SetCurrentWindow(3), "CW3", "SetCurrentWindow3", 1),
    command_map!(0x84, CommandCode::SetCurrentWindow(4), "CW4", "SetCurrentWindow4", 1),
    command_map!(0x85, CommandCode::SetCurrentWindow(5), "CW5", "SetCurrentWindow5", 1),
    command_map!(0x86, CommandCode::SetCurrentWindow(6), "CW6", "SetCurrentWindow6", 1),
    command_map!(0x87, CommandCode::SetCurrentWindow(7), "CW7", "SetCurrentWindow7", 1),
    command_map!(0x88, CommandCode::ClearWindows, "CLW", "ClearWindows", 2),
    command_map!(0x89, CommandCode::DisplayWindows, "DSW", "DisplayWindows", 2),
    command_map!(0x8A, CommandCode::HideWindows, "HDW", "HideWindows", 2),
    command_map!(0x8B, CommandCode::ToggleWindows, "TGW", "ToggleWindows", 2),
    command_map!(0x8C, CommandCode::DeleteWindows, "DLW", "DeleteWindows", 2),
    command_map!(0x8D, CommandCode::Delay, "DLY", "Delay", 2),
    command_map!(0x8E, CommandCode::DelayCancel, "DLC", "Delay Cancel", 1),
    command_map!(0x8F, CommandCode::Reset, "RST", "Reset", 1),
    command_map!(0x90, CommandCode::SetPenAttributes, "SPA", "SetPenAttributes", 3),
    command_map!(0x91, CommandCode::SetPenColor, "SPC", "SetPenColor", 4),
    command_map!(0x92, CommandCode::SetPenLocation, "SPL", "SetPenLocation", 3),
    command_map!(0x93, CommandCode::Reserved1(0x93), "RSV93", "Reserved", 1),
    command_map!(0x94, CommandCode::Reserved1(0x94), "RSV94", "Reserved", 1),
    command_map!(0x95, CommandCode::Reserved1(0x95), "RSV95", "Reserved", 1),
    command_map!(0x96, CommandCode::Reserved1(0x96), "RSV96", "Reserved", 1),
    command_map!(0x97, CommandCode::SetWindowAttributes, "SWA", "SetWindowAttributes", 5),
    command_map!(0x98, CommandCode::DefineWindow(0), "DF0", "DefineWindow0", 7),
    command_map!(0x99, CommandCode::DefineWindow(1), "DF1", "DefineWindow1", 7),
    command_map!(0x9A, CommandCode::DefineWindow(2), "DF2", "DefineWindow2", 7),
    command_map!(0x9B, CommandCode::DefineWindow(3), "DF3", "DefineWindow3", 7),
    command_map!(0x9C, CommandCode::DefineWindow(4), "DF4", "DefineWindow4", 7),
    command_map!(0x9D, CommandCode::DefineWindow(5), "DF5", "DefineWindow5", 7),
    command_map!(0x9E, CommandCode::DefineWindow(6), "DF6", "DefineWindow6", 7),
    command_map!(0x9F, CommandCode::DefineWindow(7), "DF7", "DefineWindow7", 7),
];

fn lookup(byte: u8) -> Option<&'static CommandMap> {
    COMMAND_MAP_TABLE
        .binary_search_by_key(&byte, |map| map.byte)
        .ok()
        .map(|idx| &COMMAND_MAP_TABLE[idx])
}

impl CommandCode {
    /// Look up the command for a C0 or C1 byte
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::command::CommandCode;
    /// assert_eq!(CommandCode::from_byte(0x8F), CommandCode::Reset);
    /// assert_eq!(CommandCode::from_byte(0x9A), CommandCode::DefineWindow(2));
    /// assert_eq!(CommandCode::from_byte(0x01), CommandCode::Unknown(0x01));
    /// ```
    pub fn from_byte(byte: u8) -> Self {
        lookup(byte)
            .map(|map| map.code)
            .unwrap_or(CommandCode::Unknown(byte))
    }

    /// The total length in bytes of the command starting with `byte`, including the command
    /// byte.  Only defined for C0 and C1 bytes.
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::command::CommandCode;
    /// assert_eq!(CommandCode::length(0x80), 1);
    /// assert_eq!(CommandCode::length(0x97), 5);
    /// assert_eq!(CommandCode::length(0x9F), 7);
    /// assert_eq!(CommandCode::length(0x11), 2);
    /// assert_eq!(CommandCode::length(0x1A), 3);
    /// ```
    pub fn length(byte: u8) -> usize {
        if let Some(map) = lookup(byte) {
            return map.len;
        }
        match byte {
            0x00..=0x0F => 1,
            0x10..=0x17 => 2,
            0x18..=0x1F => 3,
            _ => 1,
        }
    }

    /// The short mnemonic for the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "UNKNOWN",
            _ => self
                .byte()
                .and_then(lookup)
                .map(|map| map.name)
                .unwrap_or("UNKNOWN"),
        }
    }

    /// A human readable description of the command
    pub fn description(&self) -> &'static str {
        self.byte()
            .and_then(lookup)
            .map(|map| map.description)
            .unwrap_or("Unknown")
    }

    /// The byte encoding this command
    pub fn byte(&self) -> Option<u8> {
        match self {
            Self::Unknown(byte) => Some(*byte),
            Self::SetCurrentWindow(id) if *id < 8 => Some(0x80 + id),
            Self::DefineWindow(id) if *id < 8 => Some(0x98 + id),
            Self::Reserved1(byte) => Some(*byte),
            _ => COMMAND_MAP_TABLE
                .iter()
                .find(|map| map.code == *self)
                .map(|map| map.byte),
        }
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

/// The length in bytes of a C2 command, including the command byte
pub fn c2_length(byte: u8) -> usize {
    match byte {
        0x00..=0x07 => 1,
        0x08..=0x0F => 2,
        0x10..=0x17 => 3,
        _ => 4,
    }
}

/// The length in bytes of a C3 command, including the command byte.  Variable length
/// commands (0x90-0x9F) read their length from the following byte, if any.
pub fn c3_length(byte: u8, next: Option<u8>) -> usize {
    match byte {
        0x80..=0x87 => 5,
        0x88..=0x8F => 6,
        _ => next.map(|next| (next & 0x3F) as usize + 2).unwrap_or(2),
    }
}

/// The total length of the command starting at the beginning of `data`, following EXT1
/// escapes.  Returns 0 for empty data.
pub fn command_length(data: &[u8]) -> usize {
    let Some(&byte) = data.first() else {
        return 0;
    };
    match CodeClass::from_byte(byte) {
        CodeClass::Ext1 => {
            let Some(&ext) = data.get(1) else {
                return 1;
            };
            1 + match ExtendedClass::from_byte(ext) {
                ExtendedClass::C2 => c2_length(ext),
                ExtendedClass::C3 => c3_length(ext, data.get(2).copied()),
                ExtendedClass::G2G3 => 1,
            }
        }
        CodeClass::C0 | CodeClass::C1 => CommandCode::length(byte),
        CodeClass::G0 | CodeClass::G1 => 1,
    }
}

#[derive(Debug, Clone)]
struct G2G3Map {
    byte: u8,
    utf8: char,
}

macro_rules! g2g3_map {
    ($byte:expr, $utf8:expr) => {
        G2G3Map {
            byte: $byte,
            utf8: $utf8,
        }
    };
}

// needs to be sorted by byte
static G2G3_MAP_TABLE: [G2G3Map; 25] = [
    g2g3_map!(0x25, '…'),
    g2g3_map!(0x2A, 'Š'),
    g2g3_map!(0x2C, 'Œ'),
    g2g3_map!(0x30, '█'),
    g2g3_map!(0x31, '‘'),
    g2g3_map!(0x32, '’'),
    g2g3_map!(0x33, '“'),
    g2g3_map!(0x34, '”'),
    g2g3_map!(0x35, '•'),
    g2g3_map!(0x39, '™'),
    g2g3_map!(0x3A, 'š'),
    g2g3_map!(0x3C, 'œ'),
    g2g3_map!(0x3D, '℠'),
    g2g3_map!(0x3F, 'Ÿ'),
    g2g3_map!(0x76, '⅛'),
    g2g3_map!(0x77, '⅜'),
    g2g3_map!(0x78, '⅝'),
    g2g3_map!(0x79, '⅞'),
    g2g3_map!(0x7A, '│'),
    g2g3_map!(0x7B, '┐'),
    g2g3_map!(0x7C, '└'),
    g2g3_map!(0x7D, '─'),
    g2g3_map!(0x7E, '┘'),
    g2g3_map!(0x7F, '┌'),
    g2g3_map!(0xA0, '🅲'),
];

/// A character decoded from the G2/G3 code sets
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum G2G3Char {
    /// A transparent space.  `true` for a non-breaking transparent space.
    TransparentSpace(bool),
    /// A displayable character
    Char(char),
}

/// Decode a G2/G3 character following EXT1.  Unassigned codes map to `_`.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::command::{g2g3_char, G2G3Char};
/// assert_eq!(g2g3_char(0x20), G2G3Char::TransparentSpace(false));
/// assert_eq!(g2g3_char(0x39), G2G3Char::Char('™'));
/// assert_eq!(g2g3_char(0x41), G2G3Char::Char('_'));
/// ```
pub fn g2g3_char(byte: u8) -> G2G3Char {
    match byte {
        0x20 => G2G3Char::TransparentSpace(false),
        0x21 => G2G3Char::TransparentSpace(true),
        _ => G2G3Char::Char(
            G2G3_MAP_TABLE
                .binary_search_by_key(&byte, |map| map.byte)
                .map(|idx| G2G3_MAP_TABLE[idx].utf8)
                .unwrap_or('_'),
        ),
    }
}

/// Decode a G0 character.  0x7F is the musical note.
pub fn g0_char(byte: u8) -> char {
    if byte == 0x7F {
        '♪'
    } else {
        byte as char
    }
}

/// Decode a G1 (Latin-1) character
pub fn g1_char(byte: u8) -> char {
    byte as char
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;

    #[test]
    fn command_table_ordered() {
        test_init_log();
        let mut iter = COMMAND_MAP_TABLE.iter().peekable();
        while let Some(map) = iter.next() {
            if let Some(peek) = iter.peek() {
                trace!("checking ordinality for {map:?} and {peek:?}");
                assert!(peek.byte > map.byte);
                assert!(peek.code > map.code);
            }
        }
    }

    #[test]
    fn g2g3_table_ordered() {
        test_init_log();
        let mut iter = G2G3_MAP_TABLE.iter().peekable();
        while let Some(map) = iter.next() {
            if let Some(peek) = iter.peek() {
                assert!(peek.byte > map.byte);
            }
        }
    }

    #[test]
    fn set_current_window_codes() {
        test_init_log();
        for byte in 0x80..=0x87u8 {
            assert_eq!(CommandCode::length(byte), 1);
            assert_eq!(
                CommandCode::from_byte(byte),
                CommandCode::SetCurrentWindow(byte - 0x80)
            );
            assert_eq!(CommandCode::from_byte(byte).byte(), Some(byte));
        }
    }

    #[test]
    fn define_window_codes() {
        test_init_log();
        for byte in 0x98..=0x9Fu8 {
            assert_eq!(CommandCode::length(byte), 7);
            assert_eq!(
                CommandCode::from_byte(byte),
                CommandCode::DefineWindow(byte - 0x98)
            );
        }
    }

    #[test]
    fn c1_lengths() {
        test_init_log();
        for (byte, len) in [
            (0x88, 2),
            (0x89, 2),
            (0x8A, 2),
            (0x8B, 2),
            (0x8C, 2),
            (0x8D, 2),
            (0x8E, 1),
            (0x8F, 1),
            (0x90, 3),
            (0x91, 4),
            (0x92, 3),
            (0x93, 1),
            (0x96, 1),
            (0x97, 5),
        ] {
            assert_eq!(CommandCode::length(byte), len, "byte {byte:#x}");
        }
    }

    #[test]
    fn extended_lengths() {
        test_init_log();
        assert_eq!(command_length(&[]), 0);
        assert_eq!(command_length(&[0x10]), 1);
        assert_eq!(command_length(&[0x10, 0x05]), 2);
        assert_eq!(command_length(&[0x10, 0x0A]), 3);
        assert_eq!(command_length(&[0x10, 0x12]), 4);
        assert_eq!(command_length(&[0x10, 0x1F]), 5);
        assert_eq!(command_length(&[0x10, 0x39]), 2);
        assert_eq!(command_length(&[0x10, 0x80]), 6);
        assert_eq!(command_length(&[0x10, 0x8C]), 7);
        assert_eq!(command_length(&[0x10, 0x90, 0x43]), 6);
        assert_eq!(command_length(&[0x41]), 1);
        assert_eq!(command_length(&[0xE9]), 1);
    }

    #[test]
    fn names() {
        test_init_log();
        assert_eq!(CommandCode::from_byte(0x8F).name(), "RST");
        assert_eq!(CommandCode::from_byte(0x9F).name(), "DF7");
        assert_eq!(CommandCode::from_byte(0x94).name(), "RSV94");
        assert_eq!(CommandCode::Unknown(0x02).name(), "UNKNOWN");
        assert_eq!(CommandCode::SetPenColor.to_string(), "SPC (SetPenColor)");
    }

    #[test]
    fn characters() {
        test_init_log();
        assert_eq!(g0_char(0x41), 'A');
        assert_eq!(g0_char(0x7F), '♪');
        assert_eq!(g1_char(0xE9), 'é');
        assert_eq!(g2g3_char(0x21), G2G3Char::TransparentSpace(true));
        assert_eq!(g2g3_char(0xA0), G2G3Char::Char('🅲'));
        assert_eq!(g2g3_char(0x35), G2G3Char::Char('•'));
    }
}
