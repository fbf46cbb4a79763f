//! # plugin-faulty
//!
//! A greeter plugin that cannot start: its constructor panics. Hosts use it
//! to check that a panic inside a plugin library is reported as a failed
//! load instead of taking the host down.

use hatch_plugin_api::export_entry_point;
use plugin_greeter::{Greeter, GreeterContract};

/// Entry point name of [`StageFrightGreeter`].
pub const STAGE_FRIGHT_ENTRY_POINT: &str = "faulty.StageFright";

/// Panic message raised by the constructor.
pub const STAGE_FRIGHT_MESSAGE: &str = "stage fright: greeter refuses to start";

/// A greeter that never gets to greet.
#[derive(Debug)]
pub struct StageFrightGreeter;

impl Greeter for StageFrightGreeter {
    fn greet(&self, _name: &str) -> String {
        String::new()
    }

    fn language(&self) -> &str {
        "none"
    }
}

fn stage_fright() -> StageFrightGreeter {
    panic!("{}", STAGE_FRIGHT_MESSAGE)
}

export_entry_point!(faulty_StageFright, GreeterContract, stage_fright());
