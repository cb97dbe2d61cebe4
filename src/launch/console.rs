//! Output sinks - Bounded console buffer and stdout pass-through.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::pump::{OutputSink, StreamSource};

/// One complete line of process output.
#[derive(Debug, Clone)]
pub struct ConsoleLine {
    pub text: String,
    pub source: StreamSource,
    pub at: DateTime<Utc>,
}

struct ConsoleState {
    lines: VecDeque<ConsoleLine>,
    partial_out: String,
    partial_err: String,
    attached: Option<u32>,
}

impl ConsoleState {
    fn partial_mut(&mut self, source: StreamSource) -> &mut String {
        match source {
            StreamSource::Stdout => &mut self.partial_out,
            StreamSource::Stderr => &mut self.partial_err,
        }
    }
}

/// Bounded FIFO of process output lines.
///
/// Chunks are assembled into lines per stream; when the stored line count
/// exceeds the capacity, the oldest line is evicted first. Detaching from
/// a process preserves the buffered content.
pub struct ConsoleSink {
    capacity: usize,
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(ConsoleState {
                lines: VecDeque::new(),
                partial_out: String::new(),
                partial_err: String::new(),
                attached: None,
            }),
        }
    }

    /// Associate the buffer with a running process.
    pub fn attach(&self, pid: u32) {
        self.state.lock().expect("console buffer poisoned").attached = Some(pid);
    }

    /// Drop the process association, keeping the buffered lines.
    pub fn detach(&self) {
        self.state.lock().expect("console buffer poisoned").attached = None;
    }

    pub fn attached(&self) -> Option<u32> {
        self.state.lock().expect("console buffer poisoned").attached
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.state
            .lock()
            .expect("console buffer poisoned")
            .lines
            .iter()
            .cloned()
            .collect()
    }

    /// Buffered line texts, oldest first.
    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|line| line.text).collect()
    }

    pub fn line_count(&self) -> usize {
        self.state.lock().expect("console buffer poisoned").lines.len()
    }

    fn push_line(&self, state: &mut ConsoleState, source: StreamSource, mut text: String) {
        if text.ends_with('\r') {
            text.pop();
        }
        state.lines.push_back(ConsoleLine {
            text,
            source,
            at: Utc::now(),
        });
        while state.lines.len() > self.capacity {
            state.lines.pop_front();
        }
    }
}

impl OutputSink for ConsoleSink {
    fn accept(&self, source: StreamSource, chunk: &str) {
        let mut state = self.state.lock().expect("console buffer poisoned");
        let mut text = {
            let partial = state.partial_mut(source);
            partial.push_str(chunk);
            std::mem::take(partial)
        };
        while let Some(newline) = text.find('\n') {
            let rest = text.split_off(newline + 1);
            text.truncate(newline);
            self.push_line(&mut state, source, text);
            text = rest;
        }
        *state.partial_mut(source) = text;
    }

    fn stream_closed(&self, source: StreamSource) {
        let mut state = self.state.lock().expect("console buffer poisoned");
        let partial = std::mem::take(state.partial_mut(source));
        if !partial.is_empty() {
            self.push_line(&mut state, source, partial);
        }
    }
}

/// Forwards every chunk straight to the launcher's own standard output,
/// with no buffering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughSink;

impl PassThroughSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for PassThroughSink {
    fn accept(&self, _source: StreamSource, chunk: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    }
}
