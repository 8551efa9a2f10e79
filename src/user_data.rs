// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// The type of a caption byte pair as signalled by the low 2 bits of the `cc_data` type byte
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CcType {
    /// CEA-608 field 1
    Field1,
    /// CEA-608 field 2
    Field2,
    /// CEA-708 Caption Channel Packet data
    CcpData,
    /// CEA-708 Caption Channel Packet start
    CcpStart,
}

impl CcType {
    /// Parse the type from the `cc_data` type byte.  Only the low 2 bits are considered.
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::CcType;
    /// assert_eq!(CcType::from_byte(0xFC), CcType::Field1);
    /// assert_eq!(CcType::from_byte(0xFF), CcType::CcpStart);
    /// ```
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x03 {
            0 => Self::Field1,
            1 => Self::Field2,
            2 => Self::CcpData,
            _ => Self::CcpStart,
        }
    }

    /// Whether this type carries CEA-608 data
    pub fn is_cea608(&self) -> bool {
        matches!(self, Self::Field1 | Self::Field2)
    }
}

/// A single caption byte pair
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CcData {
    /// Whether the pair is marked as valid
    pub valid: bool,
    /// The type of data in this pair
    pub cc_type: CcType,
    /// The first data byte
    pub data1: u8,
    /// The second data byte
    pub data2: u8,
}

impl CcData {
    /// Construct a new valid [`CcData`]
    pub fn new(cc_type: CcType, data1: u8, data2: u8) -> Self {
        Self {
            valid: true,
            cc_type,
            data1,
            data2,
        }
    }

    /// Whether this pair starts a new Caption Channel Packet
    pub fn is_ccp_start(&self) -> bool {
        self.cc_type == CcType::CcpStart
    }

    /// Whether this pair continues a Caption Channel Packet
    pub fn is_ccp_data(&self) -> bool {
        self.cc_type == CcType::CcpData
    }

    /// Whether this pair contains CEA-608 data
    pub fn is_cea608(&self) -> bool {
        self.cc_type.is_cea608()
    }
}

/// The caption pairs contained in one user data payload.
///
/// The payload is laid out as consecutive `cc_data` triplets of one type byte followed by two
/// data bytes.  A trailing partial triplet is ignored.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::*;
/// let user_data = UserData::new(&[0xFC, 0x94, 0x2C, 0xFF, 0x02, 0x21]);
/// assert_eq!(user_data.len(), 2);
/// let pairs = user_data.cc_data();
/// assert_eq!(pairs[0], CcData::new(CcType::Field1, 0x94, 0x2C));
/// assert_eq!(pairs[1], CcData::new(CcType::CcpStart, 0x02, 0x21));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserData {
    cc_data: Vec<CcData>,
}

impl UserData {
    /// Decode the provided raw buffer
    pub fn new(data: &[u8]) -> Self {
        if data.len() % 3 != 0 {
            debug!(
                "ignoring {} trailing bytes of user data length {}",
                data.len() % 3,
                data.len()
            );
        }
        let cc_data = data
            .chunks_exact(3)
            .map(|triplet| {
                trace!("{triplet:02x?}");
                // invalid triplets are filtered out before reaching here
                CcData::new(CcType::from_byte(triplet[0]), triplet[1], triplet[2])
            })
            .collect();
        Self { cc_data }
    }

    /// The decoded caption pairs
    pub fn cc_data(&self) -> &[CcData] {
        &self.cc_data
    }

    /// The number of decoded caption pairs
    pub fn len(&self) -> usize {
        self.cc_data.len()
    }

    /// Whether no caption pairs were decoded
    pub fn is_empty(&self) -> bool {
        self.cc_data.is_empty()
    }
}

impl IntoIterator for UserData {
    type Item = CcData;
    type IntoIter = std::vec::IntoIter<CcData>;

    fn into_iter(self) -> Self::IntoIter {
        self.cc_data.into_iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;

    #[test]
    fn type_from_low_bits() {
        test_init_log();
        for high in [0x00, 0xF8, 0xFC] {
            assert_eq!(CcType::from_byte(high), CcType::Field1);
            assert_eq!(CcType::from_byte(high | 0x01), CcType::Field2);
            assert_eq!(CcType::from_byte(high | 0x02), CcType::CcpData);
            assert_eq!(CcType::from_byte(high | 0x03), CcType::CcpStart);
        }
    }

    #[test]
    fn triplets_in_order() {
        test_init_log();
        let user_data = UserData::new(&[0xFC, 0x80, 0x80, 0xFD, 0x15, 0x2C, 0xFE, 0x41, 0x42]);
        assert_eq!(
            user_data.cc_data(),
            &[
                CcData::new(CcType::Field1, 0x80, 0x80),
                CcData::new(CcType::Field2, 0x15, 0x2C),
                CcData::new(CcType::CcpData, 0x41, 0x42),
            ]
        );
        assert!(user_data.cc_data().iter().all(|cc| cc.valid));
    }

    #[test]
    fn trailing_bytes_ignored() {
        test_init_log();
        let user_data = UserData::new(&[0xFC, 0x80, 0x80, 0xFD, 0x15]);
        assert_eq!(user_data.len(), 1);
        assert!(UserData::new(&[]).is_empty());
    }
}
