//! Forked executions
//!
//! A fork runs one function on its own thread with its own [`Dispatcher`]
//! and error channel. The program is shared read-only; arguments arrive as
//! deep copies. The child's standard streams are the only link back.
//!
//! The dispatcher that started a fork keeps its [`JoinHandle`] and joins it
//! when its `Main` (or, for a fork, its entry function) finishes.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use core_types::{Label, UsmResult};
use crossbeam::channel::unbounded;
use tracing::{debug, warn};

use crate::code::Program;
use crate::config::RuntimeConfig;
use crate::dispatch::Dispatcher;
use crate::stream::{ChannelReader, ChannelWriter, ForkStream, StdIo};
use crate::value::Portable;

/// Start `label` on a new thread and return the parent's end of its stdio
/// together with the thread's handle
pub fn spawn(
    program: Arc<Program>,
    config: RuntimeConfig,
    label: Label,
    arguments: Vec<Portable>,
) -> UsmResult<(ForkStream, JoinHandle<()>)> {
    let (to_child, child_input) = unbounded();
    let (child_output, from_child) = unbounded();

    let handle = thread::Builder::new()
        .name(format!("usm-fork-{}", label))
        .spawn(move || {
            let mut io = StdIo::new(
                Box::new(ChannelReader::new(child_input)),
                Box::new(ChannelWriter::new(child_output)),
            );
            let arguments = arguments.into_iter().map(Portable::into_value).collect();
            let mut dispatcher = Dispatcher::new(program, &mut io, config);
            match dispatcher.invoke(label, arguments) {
                Ok(_) => debug!(%label, "forked execution finished"),
                Err(err) => warn!(%label, %err, "forked execution failed"),
            }
            dispatcher.join_forks();
        })?;

    let stream = ForkStream {
        reader: ChannelReader::new(from_child),
        writer: ChannelWriter::new(to_child),
    };
    Ok((stream, handle))
}
