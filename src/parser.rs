// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::attributes::{PenAttributes, PenColor, WindowAttributes, WindowDefinition, WindowMask};
use crate::cea608::{Cea608Channel, Cea608Decoder, CaptionState};
use crate::clock::Clock;
use crate::command::{
    c2_length, c3_length, command_length, g0_char, g1_char, g2g3_char, CodeClass,
    CommandCode, ExtendedClass, G2G3Char, EXT1,
};
use crate::packet::ServiceBlock;
use crate::processor::CommandProcessor;
use crate::user_data::CcType;
use crate::ParserError;

/// Bytes of queued service blocks after which an active delay is cancelled
const MAX_QUEUED_BYTES: usize = 128;
/// Maximum size of a service block payload
const MAX_SERVICE_BLOCK_LENGTH: usize = 32;
/// Capacity of the buffer holding a command split across service blocks
const PENDING_CAPACITY: usize = 2 * MAX_SERVICE_BLOCK_LENGTH;
const DISPLAY_TIMEOUT_SECONDS: u32 = 10;

/// Decodes CEA-708 service blocks and CEA-608 byte pairs into calls on a [`CommandProcessor`]
///
/// # Examples
/// ```
/// # use cea_caption_decoder::*;
/// # use std::rc::Rc;
/// let clock = ManualClock::default();
/// let mut parser = CommandParser::new(Rc::new(clock.clone()));
/// let mut windows = WindowController::new(Rc::new(clock));
/// // DefineWindow 0, visible, 2 rows of 32 columns then "Hi"
/// let block = ServiceBlock::new(1, &[0x98, 0x20, 0x00, 0x00, 0x01, 0x1F, 0x00, 0x48, 0x69]);
/// parser.process(&block, &mut windows);
/// assert_eq!(windows.window_definition(0).unwrap().row_count, 2);
/// assert_eq!(windows.window(0).unwrap().text(), "Hi");
/// ```
pub struct CommandParser {
    clock: Rc<dyn Clock>,
    delay_deadline: Option<Duration>,
    queue: VecDeque<ServiceBlock>,
    queued_size: usize,
    pending: Vec<u8>,
    cea608: Cea608Decoder,
}

impl std::fmt::Debug for CommandParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandParser")
            .field("delay_deadline", &self.delay_deadline)
            .field("queue", &self.queue)
            .field("queued_size", &self.queued_size)
            .field("pending", &self.pending)
            .field("cea608", &self.cea608)
            .finish()
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
struct ResetScan {
    reset: Option<usize>,
    delay_cancel: bool,
}

impl CommandParser {
    /// Construct a new [`CommandParser`] timing delays with `clock`
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            delay_deadline: None,
            queue: VecDeque::new(),
            queued_size: 0,
            pending: Vec::with_capacity(PENDING_CAPACITY),
            cea608: Cea608Decoder::default(),
        }
    }

    /// The number of service blocks waiting for a delay to expire
    pub fn queued_blocks(&self) -> usize {
        self.queue.len()
    }

    /// Whether a CEA-708 delay command is holding back queued service blocks
    pub fn is_delayed(&self) -> bool {
        self.delay_deadline.is_some()
    }

    /// The current CEA-608 captioning mode
    pub fn caption_state(&self) -> CaptionState {
        self.cea608.state()
    }

    /// The CEA-608 channel that was last requested
    pub fn cea608_channel(&self) -> Cea608Channel {
        self.cea608.requested_channel()
    }

    /// Process a CEA-708 service block.
    ///
    /// A Reset command anywhere in the block discards every queued block and the bytes before
    /// it.  Blocks are queued while a Delay command is active.
    pub fn process<P: CommandProcessor + ?Sized>(&mut self, block: &ServiceBlock, proc: &mut P) {
        trace!(
            "service {} block {:02x?}",
            block.service_number(),
            block.data()
        );
        let scan = scan_reset(block.data());

        if let Some(pos) = scan.reset {
            debug!("reset at offset {pos}, dropping {} queued blocks", self.queue.len());
            let mut block = block.clone();
            block.erase_to(pos + 1);
            self.queue.clear();
            self.queued_size = 0;
            self.pending.clear();
            proc.reset();
            self.queue.push_back(block);
        } else {
            self.queue.push_back(block.clone());
        }

        if scan.delay_cancel {
            self.delay_cancel();
        }

        self.queued_size += block_size(self.queue.back());

        while !self.handle_delay() {
            let Some(block) = self.queue.pop_front() else {
                break;
            };
            self.queued_size = self.queued_size.saturating_sub(block.block_size());
            self.process_block(block.data(), proc);
        }
    }

    /// Process a CEA-608 byte pair (with parity) for the 608 channel selected by `service`
    /// (1000-1007).  Changing the service resets the CEA-608 state.
    pub fn process_608_data<P: CommandProcessor + ?Sized>(
        &mut self,
        service: u32,
        cc_type: CcType,
        data1: u8,
        data2: u8,
        proc: &mut P,
    ) {
        let channel = Cea608Channel::from_service(service);
        self.cea608.process(channel, cc_type, data1, data2, proc);
    }

    /// Reset the CEA-608 state, removing all windows and leaving CEA-608 mode
    pub fn reset_608<P: CommandProcessor + ?Sized>(&mut self, proc: &mut P) {
        self.cea608.reset(proc);
        proc.enable_608(false);
    }

    /// Enter CEA-608 mode
    pub fn set_608<P: CommandProcessor + ?Sized>(&mut self, proc: &mut P) {
        proc.enable_608(true);
    }

    /// Cancel any active delay
    pub fn reset_service_buffer(&mut self) {
        self.delay_cancel();
    }

    /// Drop all queued service blocks, any partial command and any active delay
    pub fn reset(&mut self) {
        self.queue.clear();
        self.queued_size = 0;
        self.pending.clear();
        self.delay_cancel();
    }

    fn delay(&mut self, timeout: Duration) {
        debug!("delay for {timeout:?}");
        self.delay_deadline = Some(self.clock.now() + timeout);
    }

    fn delay_cancel(&mut self) {
        if self.delay_deadline.take().is_some() {
            debug!("delay cancelled");
        }
    }

    /// Returns whether processing of queued blocks must wait
    fn handle_delay(&mut self) -> bool {
        let Some(deadline) = self.delay_deadline else {
            return false;
        };

        if self.queued_size >= MAX_QUEUED_BYTES {
            debug!("{} bytes queued, cancelling delay", self.queued_size);
            self.delay_cancel();
            return false;
        }

        if self.clock.now() > deadline {
            self.delay_cancel();
            return false;
        }

        true
    }

    fn store_partial(&mut self, data: &[u8]) -> Result<(), ParserError> {
        if data.len() > PENDING_CAPACITY {
            return Err(ParserError::BufferOverflow {
                capacity: PENDING_CAPACITY,
                required: data.len(),
            });
        }
        self.pending.clear();
        self.pending.extend_from_slice(data);
        Ok(())
    }

    fn process_block<P: CommandProcessor + ?Sized>(&mut self, data: &[u8], proc: &mut P) {
        let joined;
        let data = if self.pending.is_empty() {
            data
        } else {
            trace!("continuing partial command {:02x?}", self.pending);
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(data);
            joined = buf;
            joined.as_slice()
        };

        let mut offset = 0;
        while offset < data.len() {
            let remaining = &data[offset..];
            let Some(len) = complete_length(remaining) else {
                trace!("command {:02x?} continues in the next block", remaining);
                if let Err(err) = self.store_partial(remaining) {
                    warn!("Dropping partial command: {err}");
                }
                break;
            };
            self.execute(&remaining[..len], proc);
            offset += len;
        }
    }

    fn execute<P: CommandProcessor + ?Sized>(&mut self, cmd: &[u8], proc: &mut P) {
        let Some((&byte, args)) = cmd.split_first() else {
            return;
        };
        match CodeClass::from_byte(byte) {
            CodeClass::C0 => handle_c0(byte, args, proc),
            CodeClass::G0 => report_char(g0_char(byte), proc),
            CodeClass::C1 => self.handle_c1(byte, args, proc),
            CodeClass::G1 => report_char(g1_char(byte), proc),
            CodeClass::Ext1 => handle_extended(args, proc),
        }
    }

    fn handle_c1<P: CommandProcessor + ?Sized>(&mut self, byte: u8, args: &[u8], proc: &mut P) {
        let code = CommandCode::from_byte(byte);
        debug!("C1: {byte:#04x}, {code}, {args:02x?}");

        match code {
            CommandCode::SetCurrentWindow(id) => proc.set_current_window(id),
            CommandCode::ClearWindows => {
                if let Some([mask]) = arguments(args) {
                    proc.clear_windows(WindowMask::from_bits(mask));
                }
            }
            CommandCode::DisplayWindows => {
                if let Some([mask]) = arguments(args) {
                    proc.display_windows(WindowMask::from_bits(mask));
                    proc.reset_window_timeout(DISPLAY_TIMEOUT_SECONDS);
                }
            }
            CommandCode::HideWindows => {
                if let Some([mask]) = arguments(args) {
                    proc.hide_windows(WindowMask::from_bits(mask));
                }
            }
            CommandCode::ToggleWindows => {
                if let Some([mask]) = arguments(args) {
                    proc.toggle_windows(WindowMask::from_bits(mask));
                    proc.reset_window_timeout(DISPLAY_TIMEOUT_SECONDS);
                }
            }
            CommandCode::DeleteWindows => {
                if let Some([mask]) = arguments(args) {
                    proc.delete_windows(WindowMask::from_bits(mask));
                }
            }
            CommandCode::Delay => {
                if let Some([tenths]) = arguments(args) {
                    self.delay(Duration::from_millis(tenths as u64 * 100));
                }
            }
            // handled when the block is queued
            CommandCode::DelayCancel | CommandCode::Reset => (),
            CommandCode::SetPenAttributes => {
                if let Some(data) = arguments(args) {
                    proc.set_pen_attributes(&PenAttributes::from_command(data));
                }
            }
            CommandCode::SetPenColor => {
                if let Some(data) = arguments(args) {
                    proc.set_pen_color(&PenColor::from_command(data));
                }
            }
            CommandCode::SetPenLocation => {
                if let Some([row, column]) = arguments(args) {
                    proc.set_pen_location(row & 0x0F, column & 0x3F);
                }
            }
            CommandCode::SetWindowAttributes => {
                if let Some(data) = arguments(args) {
                    proc.set_window_attributes(&WindowAttributes::from_command(data));
                }
            }
            CommandCode::DefineWindow(id) => {
                if let Some(data) = arguments::<6>(args) {
                    let def = WindowDefinition::from_command(id, data);
                    proc.define_window(&def);
                    if def.visible {
                        proc.reset_window_timeout(DISPLAY_TIMEOUT_SECONDS);
                    }
                }
            }
            _ => trace!("ignoring {code}"),
        }
    }
}

fn block_size(block: Option<&ServiceBlock>) -> usize {
    block.map(|block| block.block_size()).unwrap_or(0)
}

fn arguments<const N: usize>(args: &[u8]) -> Option<[u8; N]> {
    args.get(..N)?.try_into().ok()
}

/// The length of the command at the start of `data`, or `None` if it continues past the end
fn complete_length(data: &[u8]) -> Option<usize> {
    match data {
        [] | [EXT1] | [EXT1, 0x90..=0x9F] => None,
        _ => {
            let len = command_length(data);
            (len <= data.len()).then_some(len)
        }
    }
}

/// Find the last Reset and whether any Delay Cancel (or Reset) is present
fn scan_reset(data: &[u8]) -> ResetScan {
    let mut scan = ResetScan::default();
    let mut offset = 0;
    while offset < data.len() {
        match CommandCode::from_byte(data[offset]) {
            CommandCode::Reset => {
                scan.reset = Some(offset);
                scan.delay_cancel = true;
            }
            CommandCode::DelayCancel => scan.delay_cancel = true,
            _ => (),
        }
        offset += command_length(&data[offset..]).max(1);
    }
    scan
}

fn handle_c0<P: CommandProcessor + ?Sized>(byte: u8, args: &[u8], proc: &mut P) {
    let code = CommandCode::from_byte(byte);
    debug!("C0: {byte:#04x}, {code}");
    match code {
        CommandCode::Ff => proc.form_feed(),
        CommandCode::Cr => proc.carriage_return(),
        CommandCode::Hcr => proc.horizontal_carriage_return(),
        CommandCode::Bs => proc.backspace(),
        CommandCode::Nul | CommandCode::Etx => (),
        CommandCode::P16 => debug!("P16: skipping {args:02x?}"),
        _ => debug!("C0: unhandled {byte:#04x} {args:02x?}"),
    }
}

fn handle_extended<P: CommandProcessor + ?Sized>(args: &[u8], proc: &mut P) {
    let Some((&byte, rest)) = args.split_first() else {
        return;
    };
    match ExtendedClass::from_byte(byte) {
        ExtendedClass::C2 => {
            debug!("C2: {byte:#04x}, length {}", c2_length(byte));
        }
        ExtendedClass::C3 => {
            debug!(
                "C3: {byte:#04x}, length {}",
                c3_length(byte, rest.first().copied())
            );
        }
        ExtendedClass::G2G3 => match g2g3_char(byte) {
            G2G3Char::TransparentSpace(non_breaking) => proc.transparent_space(non_breaking),
            G2G3Char::Char(c) => report_char(c, proc),
        },
    }
}

fn report_char<P: CommandProcessor + ?Sized>(c: char, proc: &mut P) {
    let mut buf = [0; 4];
    let text = c.encode_utf8(&mut buf);
    trace!("report {text:?}");
    proc.report(text);
}
