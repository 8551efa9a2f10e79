// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use cea_caption_decoder::attributes::WindowBorder;
use cea_caption_decoder::*;

use std::rc::Rc;
use std::time::Duration;
use std::{env, io::Read};

use std::sync::OnceLock;

static TRACING: OnceLock<()> = OnceLock::new();

#[macro_use]
extern crate log;

// cc_data triplets in one frame of 29.97fps video
const TRIPLETS_PER_FRAME: usize = 20;
const FRAME_DURATION: Duration = Duration::from_nanos(33_366_667);

pub fn debug_init() {
    TRACING.get_or_init(|| {
        env_logger::init();
    });
}

#[derive(Debug, Default)]
struct PrintGfx {
    frame: usize,
}

impl Gfx for PrintGfx {
    fn draw_background(&mut self, point: Point, dimensions: Dimensions, argb: u32) {
        trace!("background {point:?} {dimensions:?} {argb:#010x}");
    }
    fn draw_border(
        &mut self,
        point: Point,
        dimensions: Dimensions,
        fill: u32,
        border: u32,
        border_type: WindowBorder,
    ) {
        trace!("border {point:?} {dimensions:?} fill {fill:#010x} border {border:#010x} {border_type:?}");
    }
    fn draw_text(&mut self, point: Point, _dimensions: Dimensions, text: &str, pen: &PenAttributes) {
        debug!("text pen {pen:?}");
        println!("{:6} ({:4}, {:4}) {text:?}", self.frame, point.x, point.y);
    }
    fn draw_underline(&mut self, point: Point, dimensions: Dimensions, argb: u32) {
        trace!("underline {point:?} {dimensions:?} {argb:#010x}");
    }
    fn update(&mut self) {
        debug!("update");
    }
    fn clear(&mut self) {
        debug!("clear");
    }
    fn show(&mut self) {
        debug!("show");
    }
    fn hide(&mut self) {
        debug!("hide");
    }
}

fn main() -> std::process::ExitCode {
    debug_init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("cc-dump filename [service]");
        eprintln!("  service 1-63 selects a CEA-708 service, 1000-1007 CC1-CC4 and Text1-Text4");
        return std::process::ExitCode::from(1);
    }

    let service = match args.get(2).map(|s| s.parse::<u32>()) {
        None => 1000,
        Some(Ok(service)) => service,
        Some(Err(err)) => {
            eprintln!("Invalid service {}: {err}", args[2]);
            return std::process::ExitCode::from(1);
        }
    };
    let cea_type = if service >= 1000 {
        CeaType::Cea608
    } else {
        CeaType::Cea708
    };

    let mut data = vec![];
    if let Err(err) = std::fs::File::open(&args[1]).and_then(|mut file| file.read_to_end(&mut data)) {
        eprintln!("Failed to read {}: {err}", args[1]);
        return std::process::ExitCode::from(1);
    }

    let clock = ManualClock::default();
    let mut controller = Controller::new(Rc::new(clock.clone()), PrintGfx::default());
    controller.set_active_service(cea_type, service);
    controller.unmute();
    controller.start();

    for (frame, triplets) in data.chunks(TRIPLETS_PER_FRAME * 3).enumerate() {
        controller.gfx_mut().frame = frame;
        if let Err(err) = controller.add_data(triplets) {
            error!("Failed to add data: {err}");
            break;
        }
        controller.process();
        clock.advance(FRAME_DURATION);
    }

    controller.stop();

    std::process::ExitCode::SUCCESS
}
