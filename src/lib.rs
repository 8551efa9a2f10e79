// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # cea-caption-decoder
//!
//! Decodes CEA-608 and CEA-708 closed caption byte pairs into a windowed, styled text model
//! ready for presentation.
//!
//! The pipeline is:
//!
//! 1. [`UserData`] splits a raw `cc_data` payload into [`CcData`] pairs.
//! 2. CEA-708 pairs are reassembled into a [`CaptionChannelPacket`] which is split into
//!    [`ServiceBlock`]s.
//! 3. The [`CommandParser`] decodes CEA-708 service blocks or CEA-608 byte pairs and drives a
//!    [`CommandProcessor`].
//! 4. The [`WindowController`] implements [`CommandProcessor`] and keeps up to 8
//!    [`Window`]s which draw themselves through a [`Gfx`] implementation.
//!
//! The [`Controller`] wires all of the above together.
//!
//! The references for this implementation are the
//! [ANSI/CTA-608-E S-2019](https://shop.cta.tech/products/line-21-data-services) and
//! [ANSI/CTA-708-E R-2018](https://shop.cta.tech/products/digital-television-dtv-closed-captioning)
//! specifications.

#[macro_use]
extern crate log;

pub mod attributes;
mod cea608;
pub mod clock;
pub mod command;
mod controller;
pub mod gfx;
mod packet;
mod parser;
mod processor;
pub mod settings;
pub mod tables;
mod user_data;
mod window;
mod window_controller;

pub use attributes::{PenAttributes, PenColor, WindowAttributes, WindowDefinition, WindowMask};
pub use cea608::{CaptionState, Cea608Channel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{CeaType, Controller};
pub use gfx::{Dimensions, Gfx, Point, TextDrawer, TextDrawerFactory};
pub use packet::{CaptionChannelPacket, ServiceBlock};
pub use parser::CommandParser;
pub use processor::CommandProcessor;
pub use settings::{CcAttribType, CcAttributes, UserSettings};
pub use user_data::{CcData, CcType, UserData};
pub use window::{FontGroup, ScreenInfo, Window};
pub use window_controller::WindowController;

/// Errors when reassembling a [`CaptionChannelPacket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// The pair was not marked as valid
    #[error("Cannot add invalid data to a caption channel packet")]
    InvalidData,
    /// A packet start was received while a packet was already started
    #[error("Caption channel packet already started")]
    AlreadyStarted,
    /// Packet data was received without a preceding packet start
    #[error("Caption channel packet not started")]
    NotStarted,
    /// Adding the data would exceed the size declared in the packet header
    #[error("Adding data would need {required} bytes but the packet declares {declared} bytes")]
    Overflow {
        /// The size declared in the packet header
        declared: usize,
        /// The size required to add the data
        required: usize,
    },
}

/// Errors raised while decoding CEA-708 commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParserError {
    /// A command split across service blocks does not fit in the reassembly buffer
    #[error("Partial command of {required} bytes exceeds the buffer capacity of {capacity} bytes")]
    BufferOverflow {
        /// The capacity of the buffer
        capacity: usize,
        /// The number of bytes that would need to be stored
        required: usize,
    },
}

/// Errors returned by the [`Controller`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Data was provided while the controller is stopped
    #[error("Controller is not started")]
    NotStarted,
    /// An empty buffer was provided
    #[error("No data provided")]
    EmptyData,
}

/// Errors when parsing user supplied caption attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    /// The attribute type is not known
    #[error("Unknown attribute type {0:#x}")]
    UnknownAttribute(u32),
    /// The value is out of range for the attribute
    #[error("Value {value} is not valid for attribute {attribute:?}")]
    InvalidValue {
        /// The attribute
        attribute: CcAttribType,
        /// The rejected value
        value: u32,
    },
    /// Length of data does not match length advertised
    #[error("Length of the data ({actual}) does not match the expected length ({expected})")]
    LengthMismatch {
        /// The expected size
        expected: usize,
        /// The actual size
        actual: usize,
    },
}
