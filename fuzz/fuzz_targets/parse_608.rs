#![no_main]
use libfuzzer_sys::fuzz_target;

use cea_caption_decoder::*;

use std::rc::Rc;

use log::info;

use std::sync::OnceLock;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn debug_init() {
    TRACING.get_or_init(|| {
        env_logger::init();
    });
}

fuzz_target!(|data: &[u8]| {
    debug_init();
    let Some((&channel, data)) = data.split_first() else {
        return;
    };
    let service = 1000 + (channel as u32 % 8);
    let clock = ManualClock::default();
    let mut parser = CommandParser::new(Rc::new(clock.clone()));
    let mut windows = WindowController::new(Rc::new(clock));
    parser.set_608(&mut windows);

    for triplet in data.chunks_exact(3) {
        let cc_type = CcType::from_byte(triplet[0]);
        parser.process_608_data(service, cc_type, triplet[1], triplet[2], &mut windows);
    }
    info!("{:?} in {:?}", parser.cea608_channel(), parser.caption_state());

    parser.reset_608(&mut windows);
    assert_eq!(windows.windows().count(), 0);
    assert!(!windows.is_608_enabled());
});
