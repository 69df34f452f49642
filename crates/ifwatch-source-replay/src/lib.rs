// # Replay Change Source
//
// Feeds the event loop from a recorded or hand-written list of
// state-change notifications, one JSON object per line:
//
// ```text
// # comment
// {"type":"interface_added","id":1,"name":"lo","port_class":"loopback"}
// {"type":"online_changed","id":1,"online":true}
// {"type":"address_changed","id":1,"addr":"127.0.0.1/8","assignment_state":"assigned"}
// {"type":"address_removed","id":1,"addr":"127.0.0.1/8","reason":"manual_action"}
// {"type":"interface_removed","id":1}
// ```
//
// Blank lines and `#` comments are skipped. Lines that fail to parse are
// logged and skipped. A read error ends the stream.

use std::path::Path;

use ifwatch_core::traits::{ChangeSource, ChangeStream};
use ifwatch_core::{InterfaceChange, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Change source reading JSON-lines notifications
pub struct ReplaySource {
    reader: Option<BoxedReader>,
    origin: String,
}

impl ReplaySource {
    /// Replay the notifications stored in `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }

    /// Replay notifications piped in on stdin
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), "stdin")
    }

    /// Replay notifications from any buffered reader
    ///
    /// `origin` names the input in logs.
    pub fn from_reader<R>(reader: R, origin: impl Into<String>) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl ChangeSource for ReplaySource {
    fn watch(&mut self) -> ChangeStream {
        let Some(reader) = self.reader.take() else {
            warn!(origin = %self.origin, "replay input already consumed");
            return Box::pin(tokio_stream::empty::<InterfaceChange>());
        };

        let origin = self.origin.clone();
        let read_origin = origin.clone();
        let mut line_no = 0usize;

        let changes = LinesStream::new(reader.lines())
            .map_while(move |line| match line {
                Ok(line) => Some(line),
                Err(e) => {
                    warn!(origin = %read_origin, error = %e, "failed to read replay input, stopping");
                    None
                }
            })
            .filter_map(move |line| {
                line_no += 1;
                match parse_line(&line) {
                    Ok(Some(change)) => {
                        debug!(origin = %origin, line = line_no, %change, "replaying");
                        Some(change)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(origin = %origin, line = line_no, error = %e, "skipping malformed line");
                        None
                    }
                }
            });

        Box::pin(changes)
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

/// Parses one input line
///
/// Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<InterfaceChange>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}
