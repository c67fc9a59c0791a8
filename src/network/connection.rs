use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{ChatError, ChatResult};

/// Reads newline-terminated lines from a byte stream, in order
pub struct LineReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next line without its terminator, `None` on EOF
    pub async fn read_line(&mut self) -> ChatResult<Option<String>> {
        self.lines
            .next_line()
            .await
            .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
            .map_err(|e| ChatError::Network(e.to_string()))
    }

    /// Next line, treating EOF as an error
    pub async fn expect_line(&mut self) -> ChatResult<String> {
        self.read_line().await?.ok_or(ChatError::ConnectionClosed)
    }
}

/// Write one line and flush it
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> ChatResult<()> {
    let mut data = String::with_capacity(line.len() + 1);
    data.push_str(line);
    data.push('\n');
    writer
        .write_all(data.as_bytes())
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;
    writer.flush().await.map_err(|e| ChatError::Network(e.to_string()))
}

/// Spawn a task that owns `writer` and drains queued lines into it.
///
/// The task ends, shutting the writer down, once every sender is dropped or a
/// write fails. Queued lines are written before shutdown.
pub fn spawn_writer<W>(mut writer: W) -> (mpsc::UnboundedSender<String>, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

    let handle = tokio::spawn(async move {
        while let Some(line) = receiver.recv().await {
            if let Err(e) = write_line(&mut writer, &line).await {
                debug!(error = %e, "writer stopped");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    (sender, handle)
}
