use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace, warn};

/// Where `display`, `debug` and `trace` send their text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Standard,
    Debug,
    Trace,
}

pub trait Output {
    fn write(&mut self, channel: Channel, text: &str);
}

/// Standard text to stdout; the debug and trace channels go to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdOutput;

impl Output for StdOutput {
    fn write(&mut self, channel: Channel, text: &str) {
        match channel {
            Channel::Standard => {
                let mut stdout = std::io::stdout();
                if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
                    warn!("failed to write program output: {}", e);
                }
            }
            Channel::Debug => debug!(target: "scheme_rules::program", "{}", text),
            Channel::Trace => trace!(target: "scheme_rules::program", "{}", text),
        }
    }
}

#[derive(Debug, Default)]
struct Buffers {
    standard: String,
    debug: String,
    trace: String,
}

/// Collects each channel into memory. Clones share the same buffers, so a host
/// can hand one clone to an interpreter and read the text through another.
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    buffers: Rc<RefCell<Buffers>>,
}

impl BufferOutput {
    pub fn new() -> BufferOutput { BufferOutput::default() }

    pub fn standard(&self) -> String { self.buffers.borrow().standard.clone() }

    pub fn debug(&self) -> String { self.buffers.borrow().debug.clone() }

    pub fn trace(&self) -> String { self.buffers.borrow().trace.clone() }

    pub fn clear(&self) { *self.buffers.borrow_mut() = Buffers::default(); }
}

impl Output for BufferOutput {
    fn write(&mut self, channel: Channel, text: &str) {
        let mut buffers = self.buffers.borrow_mut();
        let target = match channel {
            Channel::Standard => &mut buffers.standard,
            Channel::Debug => &mut buffers.debug,
            Channel::Trace => &mut buffers.trace,
        };
        target.push_str(text);
    }
}
