// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::{CcData, CcType, SequenceError};

/// A CEA-708 Caption Channel Packet reassembled from consecutive [`CcData`] pairs.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::*;
/// // sequence 0, size field 2 => 4 bytes including the header
/// let mut ccp = CaptionChannelPacket::default();
/// ccp.add(&CcData::new(CcType::CcpStart, 0x02, 0x21)).unwrap();
/// assert_eq!(ccp.size(), 4);
/// assert!(!ccp.is_full());
/// ccp.add(&CcData::new(CcType::CcpData, 0x41, 0x42)).unwrap();
/// assert!(ccp.is_full());
/// assert_eq!(ccp.data(), &[0x21, 0x41, 0x42]);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CaptionChannelPacket {
    started: bool,
    sequence_no: u8,
    size: usize,
    data: Vec<u8>,
}

impl CaptionChannelPacket {
    /// The size of a packet when the header size field is 0
    pub const MAX_SIZE: usize = 128;

    /// Start a new packet from a [`CcType::CcpStart`] pair
    pub fn from_cc_data(cc_data: &CcData) -> Result<Self, SequenceError> {
        let mut ccp = Self::default();
        ccp.add(cc_data)?;
        Ok(ccp)
    }

    /// Add a caption pair to this packet.
    ///
    /// A [`CcType::CcpStart`] pair is only accepted as the first pair and a
    /// [`CcType::CcpData`] pair is only accepted after a start and while the declared size
    /// has room for two more bytes.
    pub fn add(&mut self, cc_data: &CcData) -> Result<(), SequenceError> {
        if !cc_data.valid {
            return Err(SequenceError::InvalidData);
        }
        match cc_data.cc_type {
            CcType::CcpStart => {
                if self.started {
                    return Err(SequenceError::AlreadyStarted);
                }
                self.sequence_no = (cc_data.data1 & 0xC0) >> 6;
                let size = (cc_data.data1 & 0x3F) as usize;
                self.size = if size == 0 { Self::MAX_SIZE } else { size * 2 };
                self.started = true;
                debug!(
                    "CCP start sequence {}, size {}",
                    self.sequence_no, self.size
                );
            }
            CcType::CcpData => {
                if !self.started {
                    return Err(SequenceError::NotStarted);
                }
                // the declared size includes the header byte which is not stored
                let required = self.data.len() + 3;
                if self.size < required {
                    return Err(SequenceError::Overflow {
                        declared: self.size,
                        required,
                    });
                }
                self.data.push(cc_data.data1);
            }
            CcType::Field1 | CcType::Field2 => {
                return Err(if self.started {
                    SequenceError::InvalidData
                } else {
                    SequenceError::NotStarted
                });
            }
        }
        self.data.push(cc_data.data2);
        Ok(())
    }

    /// Whether a start pair has been received
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The 2-bit sequence number from the packet header
    pub fn sequence_no(&self) -> u8 {
        self.sequence_no
    }

    /// The declared size of the packet in bytes, including the header byte
    pub fn size(&self) -> usize {
        self.size
    }

    /// The packet payload received so far, excluding the header byte
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the payload has reached the declared size
    pub fn is_full(&self) -> bool {
        self.size == self.data.len() + 1
    }

    /// Reset as if it was a newly created instance
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Iterate over the service blocks contained in this packet.  Iteration stops at the
    /// first null or malformed block.
    pub fn service_blocks(&self) -> ServiceBlocks<'_> {
        ServiceBlocks {
            data: &self.data,
            offset: 0,
        }
    }
}

/// A service block addressed to one caption service
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceBlock {
    service_number: u8,
    data: Vec<u8>,
}

impl ServiceBlock {
    const EXTENDED_SERVICE: u8 = 7;

    /// Construct a [`ServiceBlock`] from a service number and payload
    pub fn new(service_number: u8, data: &[u8]) -> Self {
        Self {
            service_number,
            data: data.to_vec(),
        }
    }

    /// Parse a service block starting at `offset` in `ccp_data`.
    ///
    /// On return `offset` points to the byte after the parsed block.  A header that declares
    /// more bytes than are available yields a null block and moves `offset` to the end of the
    /// data.
    ///
    /// # Examples
    /// ```
    /// # use cea_caption_decoder::*;
    /// let data = [0x22, 0x41, 0x42, 0xE1, 0x09, 0x43];
    /// let mut offset = 0;
    /// let block = ServiceBlock::parse(&data, &mut offset);
    /// assert_eq!(block.service_number(), 1);
    /// assert_eq!(block.data(), &[0x41, 0x42]);
    /// let block = ServiceBlock::parse(&data, &mut offset);
    /// assert_eq!(block.service_number(), 9);
    /// assert_eq!(block.data(), &[0x43]);
    /// assert_eq!(offset, data.len());
    /// ```
    pub fn parse(ccp_data: &[u8], offset: &mut usize) -> Self {
        let Some(&header) = ccp_data.get(*offset) else {
            *offset = ccp_data.len();
            return Self::default();
        };
        let mut service_number = header >> 5;
        let block_size = (header & 0x1F) as usize;
        let mut header_len = 1;

        if service_number == Self::EXTENDED_SERVICE && block_size != 0 {
            let Some(&extended) = ccp_data.get(*offset + 1) else {
                debug!("missing extended service number at offset {}", *offset);
                *offset = ccp_data.len();
                return Self::default();
            };
            service_number = extended & 0x3F;
            header_len = 2;
        }

        let start = *offset + header_len;
        let end = start + block_size;
        if end > ccp_data.len() {
            debug!(
                "service block of size {block_size} at offset {} exceeds packet length {}",
                *offset,
                ccp_data.len()
            );
            *offset = ccp_data.len();
            return Self::default();
        }
        *offset = end;

        if block_size == 0 {
            return Self::default();
        }

        trace!(
            "service {service_number} block {:02x?}",
            &ccp_data[start..end]
        );
        Self {
            service_number,
            data: ccp_data[start..end].to_vec(),
        }
    }

    /// The service number.  0 indicates a null block.
    pub fn service_number(&self) -> u8 {
        self.service_number
    }

    /// The size of the block payload
    pub fn block_size(&self) -> usize {
        self.data.len()
    }

    /// Whether this is a null block
    pub fn is_null(&self) -> bool {
        self.service_number == 0 || self.data.is_empty()
    }

    /// The block payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Remove the first `len` bytes of the payload
    pub fn erase_to(&mut self, len: usize) {
        let len = len.min(self.data.len());
        self.data.drain(..len);
    }
}

/// Iterator over the [`ServiceBlock`]s of a [`CaptionChannelPacket`]
#[derive(Debug)]
pub struct ServiceBlocks<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for ServiceBlocks<'a> {
    type Item = ServiceBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let block = ServiceBlock::parse(self.data, &mut self.offset);
        if block.is_null() {
            trace!("null service block, ignoring the rest of the packet");
            self.offset = self.data.len();
            return None;
        }
        Some(block)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;

    fn start(size: u8) -> CcData {
        CcData::new(CcType::CcpStart, size, 0x00)
    }

    fn data(data1: u8, data2: u8) -> CcData {
        CcData::new(CcType::CcpData, data1, data2)
    }

    #[test]
    fn declared_size() {
        test_init_log();
        for s in 0..=0x3F_u8 {
            for seq in 0..=3 {
                let ccp = CaptionChannelPacket::from_cc_data(&start(seq << 6 | s)).unwrap();
                assert_eq!(ccp.sequence_no(), seq);
                let expected = if s == 0 { 128 } else { s as usize * 2 };
                assert_eq!(ccp.size(), expected);
            }
        }
    }

    #[test]
    fn full_exactly_at_declared_size() {
        test_init_log();
        for s in [1_u8, 2, 5, 0x3F, 0] {
            let mut ccp = CaptionChannelPacket::from_cc_data(&start(s)).unwrap();
            let size = ccp.size();
            while ccp.data().len() + 1 < size {
                assert!(!ccp.is_full());
                ccp.add(&data(0x01, 0x02)).unwrap();
            }
            assert_eq!(ccp.data().len() + 1, size);
            assert!(ccp.is_full());
            assert_eq!(
                ccp.add(&data(0x01, 0x02)),
                Err(SequenceError::Overflow {
                    declared: size,
                    required: size + 2
                })
            );
        }
    }

    #[test]
    fn data_before_start() {
        test_init_log();
        let mut ccp = CaptionChannelPacket::default();
        assert_eq!(ccp.add(&data(0x01, 0x02)), Err(SequenceError::NotStarted));
        assert!(!ccp.is_started());
    }

    #[test]
    fn second_start() {
        test_init_log();
        let mut ccp = CaptionChannelPacket::from_cc_data(&start(0x04)).unwrap();
        assert_eq!(ccp.add(&start(0x04)), Err(SequenceError::AlreadyStarted));
    }

    #[test]
    fn invalid_pair() {
        test_init_log();
        let mut cc = start(0x04);
        cc.valid = false;
        assert_eq!(
            CaptionChannelPacket::from_cc_data(&cc),
            Err(SequenceError::InvalidData)
        );
    }

    #[test]
    fn reset_allows_restart() {
        test_init_log();
        let mut ccp = CaptionChannelPacket::from_cc_data(&start(0x04)).unwrap();
        ccp.add(&data(0x01, 0x02)).unwrap();
        ccp.reset();
        assert!(!ccp.is_started());
        assert!(ccp.data().is_empty());
        ccp.add(&start(0x02)).unwrap();
        assert_eq!(ccp.size(), 4);
    }

    #[test]
    fn extended_service_number() {
        test_init_log();
        let bytes = [0xE2, 0x2A, 0x41, 0x42];
        let mut offset = 0;
        let block = ServiceBlock::parse(&bytes, &mut offset);
        assert_eq!(block.service_number(), 0x2A);
        assert_eq!(block.data(), &[0x41, 0x42]);
        assert_eq!(offset, 4);
    }

    #[test]
    fn oversized_block_is_null() {
        test_init_log();
        let bytes = [0x25, 0x41, 0x42];
        let mut offset = 0;
        let block = ServiceBlock::parse(&bytes, &mut offset);
        assert_eq!(block.service_number(), 0);
        assert_eq!(block.block_size(), 0);
        assert!(block.is_null());
        assert_eq!(offset, bytes.len());

        // extended header without the extension byte
        let bytes = [0xE1];
        let mut offset = 0;
        assert!(ServiceBlock::parse(&bytes, &mut offset).is_null());
        assert_eq!(offset, 1);
    }

    #[test]
    fn iteration_stops_at_null_block() {
        test_init_log();
        let mut ccp = CaptionChannelPacket::from_cc_data(&CcData::new(
            CcType::CcpStart,
            0x04,
            0x21,
        ))
        .unwrap();
        ccp.add(&data(0x41, 0x00)).unwrap();
        ccp.add(&data(0x41, 0x42)).unwrap();
        ccp.add(&data(0x43, 0x44)).unwrap();
        assert!(ccp.is_full());
        let blocks = ccp.service_blocks().collect::<Vec<_>>();
        assert_eq!(blocks, vec![ServiceBlock::new(1, &[0x41])]);
    }

    #[test]
    fn erase_to() {
        test_init_log();
        let mut block = ServiceBlock::new(1, &[1, 2, 3]);
        block.erase_to(2);
        assert_eq!(block.data(), &[3]);
        block.erase_to(5);
        assert_eq!(block.block_size(), 0);
    }
}
