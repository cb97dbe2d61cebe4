//! Per-stream reader loops forwarding process output to a sink.

use std::io::Read;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

/// Which process stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Consumer of streamed process output.
pub trait OutputSink: Send + Sync {
    /// Accept one decoded chunk. Chunks are not necessarily line-aligned.
    fn accept(&self, source: StreamSource, chunk: &str);

    /// The stream for `source` reached end-of-file or failed.
    fn stream_closed(&self, source: StreamSource) {
        let _ = source;
    }
}

const READ_BUFFER_LEN: usize = 1024;

/// Starts fire-and-forget reader loops over process output streams.
pub struct OutputPump;

impl OutputPump {
    /// Pump `stream` into `sink` on a dedicated thread.
    ///
    /// The loop owns the stream until closure: it ends at end-of-stream or
    /// on the first read error (logged, non-fatal), dropping the stream on
    /// every exit path. The supervisor never joins the returned handle.
    pub fn attach<R>(
        source: StreamSource,
        stream: R,
        sink: Arc<dyn OutputSink>,
    ) -> thread::JoinHandle<()>
    where
        R: Read + Send + 'static,
    {
        let name = match source {
            StreamSource::Stdout => "pump-stdout",
            StreamSource::Stderr => "pump-stderr",
        };
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || pump(source, stream, sink))
            .expect("failed to spawn output pump thread")
    }
}

fn pump<R: Read>(source: StreamSource, mut stream: R, sink: Arc<dyn OutputSink>) {
    let mut buffer = [0u8; READ_BUFFER_LEN];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(len) => {
                let chunk = String::from_utf8_lossy(&buffer[..len]);
                sink.accept(source, &chunk);
            }
            Err(error) => {
                // A reader error ends only this stream; the process and
                // the other reader keep running.
                warn!(?source, %error, "process output read failed");
                break;
            }
        }
    }
    sink.stream_closed(source);
    debug!(?source, "output stream closed");
}
