//! Per-datapath maintenance task: sweeps the chain for expired flows once a
//! second on a dedicated thread, with an interruptible sleep so teardown is
//! prompt. Shutdown is signal, then join.

use super::Datapath;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender as CancelSender};
use log::debug;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const MAINT_SLEEP: Duration = Duration::from_millis(1000);

pub(crate) struct MaintHandle {
    cancel: CancelSender<()>,
    thread: Option<JoinHandle<()>>,
}

impl MaintHandle {
    pub(crate) fn stop(mut self) {
        let _ = self.cancel.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub(crate) fn spawn(dp: Arc<Datapath>) -> Result<MaintHandle> {
    let (cancel, cancelled) = bounded(1);
    let thread = std::thread::Builder::new()
        .name(format!("dp{}-maint", dp.id()))
        .spawn(move || run(dp, cancelled))
        .map_err(|_| Error::OutOfMemory)?;
    Ok(MaintHandle {
        cancel,
        thread: Some(thread),
    })
}

fn run(dp: Arc<Datapath>, cancelled: Receiver<()>) {
    loop {
        for flow in dp.chain().timeout_sweep(Instant::now()) {
            if let Err(err) = dp.send_flow_removed(&flow) {
                debug!("{}: flow-removed notification failed: {err}", dp.name());
            }
        }
        match cancelled.recv_timeout(MAINT_SLEEP) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
