//! Standard-input point-update bridge
//!
//! The daemon has no transport of its own; a thin shim (an MQTT subscriber,
//! a test harness, a replay script) pipes point updates to stdin as
//! newline-delimited JSON:
//!
//! ```text
//! {"address": "wb-msw-v4_80/CO2", "value": 712}
//! {"address": "wb-msw-v4_80/CO2#error", "value": "r"}
//! ```
//!
//! Each parsed line becomes a [`PointEvent`] on the output channel.
//! Malformed lines are logged and skipped; they never stop the bridge.

use crate::error::InputError;
use crate::points::PointEvent;
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::Sender;

/// Reads point updates from stdin on a background thread
pub struct StdinCollector {
    /// Channel the parsed events are sent to
    output_channel: Sender<PointEvent>,
    /// Handle to the background thread
    thread_handle: Option<JoinHandle<()>>,
    /// Shared state for controlling the collector
    running: Arc<Mutex<bool>>,
}

impl StdinCollector {
    /// Create a new collector sending parsed events to `channel`
    pub fn new(channel: Sender<PointEvent>) -> Self {
        Self {
            output_channel: channel,
            thread_handle: None,
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Start the reader thread
    pub fn start(&mut self) {
        {
            let mut running = self.running.lock().unwrap();
            if *running {
                return; // Already running
            }
            *running = true;
        }

        let channel = self.output_channel.clone();
        let running = Arc::clone(&self.running);
        let handle = thread::spawn(move || {
            Self::collector_thread(channel, running);
        });
        self.thread_handle = Some(handle);
        info!("Input bridge started, reading point updates from stdin");
    }

    /// Signal the reader thread to stop
    ///
    /// The thread is not joined: it may be blocked on a stdin read that only
    /// returns when the upstream pipe closes, and the process is about to
    /// exit anyway.
    pub fn stop(&mut self) {
        {
            let mut running = self.running.lock().unwrap();
            *running = false;
        }
        self.thread_handle.take();
        info!("Input bridge stopped");
    }

    fn collector_thread(channel: Sender<PointEvent>, running: Arc<Mutex<bool>>) {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if !*running.lock().unwrap() {
                break;
            }

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read input line: {}", e);
                    break;
                }
            };

            match Self::parse_line(&line) {
                Ok(Some(event)) => {
                    debug!("Input update {} = {}", event.address, event.value);
                    if channel.blocking_send(event).is_err() {
                        info!("Event channel closed; stopping input bridge");
                        break;
                    }
                }
                Ok(None) => {} // blank line
                Err(e) => warn!("Skipping input line: {}", e),
            }
        }

        {
            let mut running_flag = running.lock().unwrap();
            *running_flag = false;
        }
        info!("Input stream ended");
    }

    /// Parse one input line into a point event
    ///
    /// Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InputError::ParseError` for lines that are not a valid
    /// update object.
    pub fn parse_line(line: &str) -> Result<Option<PointEvent>, InputError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| InputError::ParseError(format!("{}: {}", e, line)))
    }
}
