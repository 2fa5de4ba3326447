use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::{
    commands::IrcCommand, errors::IrcClientError, handlers::base::Dispatcher, message::as_action,
};

// Define the size of the rate limited outbound queue
const OUTBOUND_QUEUE_SIZE: usize = 256;

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Wrap the text as a CTCP ACTION ("/me").
    pub action: bool,
    /// Write immediately instead of waiting in the rate limited queue.
    pub ignore_limit: bool,
}

/// Write side of the connection.
///
/// `send_now` writes straight to the socket; `enqueue` hands the command to
/// the sender task, which waits `rate_limit` after every write.
#[derive(Clone)]
pub struct Outbound {
    writer: Arc<Mutex<BoxedWriter>>,
    queue: mpsc::Sender<IrcCommand>,
}

impl Outbound {
    pub fn start<W>(writer: W, rate_limit: Duration) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: Arc<Mutex<BoxedWriter>> = Arc::new(Mutex::new(Box::new(writer)));
        let (queue, rx_queue) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let sender = tokio::spawn(sender_task(writer.clone(), rx_queue, rate_limit));
        (Outbound { writer, queue }, sender)
    }

    pub async fn send_now(&self, command: &IrcCommand) -> Result<(), IrcClientError> {
        write_command(&self.writer, command).await
    }

    pub async fn enqueue(&self, command: IrcCommand) -> Result<(), IrcClientError> {
        self.queue
            .send(command)
            .await
            .map_err(|_| IrcClientError::NotConnected)
    }

    pub async fn privmsg(
        &self,
        target: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<(), IrcClientError> {
        let text = if options.action {
            as_action(text)
        } else {
            text.to_owned()
        };
        let command = IrcCommand::PRIVMSG(target.to_owned(), text);
        if options.ignore_limit {
            self.send_now(&command).await
        } else {
            self.enqueue(command).await
        }
    }

    /// Closes the queue, then shuts the writer down.
    ///
    /// With `flush`, the sender task gets up to that long to write what was
    /// already accepted; without it, queued lines are dropped.
    pub async fn close(
        self,
        mut sender: JoinHandle<()>,
        flush: Option<Duration>,
    ) -> Result<(), IrcClientError> {
        let Outbound { writer, queue } = self;
        drop(queue);
        match flush {
            Some(limit) => {
                if tokio::time::timeout(limit, &mut sender).await.is_err() {
                    warn!("Outbound queue not flushed after {limit:?}, dropping the rest");
                    sender.abort();
                }
            }
            None => sender.abort(),
        }
        writer.lock().await.shutdown().await?;
        Ok(())
    }
}

async fn write_command(
    writer: &Mutex<BoxedWriter>,
    command: &IrcCommand,
) -> Result<(), IrcClientError> {
    debug!("<< {command}");
    let mut writer = writer.lock().await;
    writer.write_all(command.raw_line().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn sender_task(
    writer: Arc<Mutex<BoxedWriter>>,
    mut rx_queue: mpsc::Receiver<IrcCommand>,
    rate_limit: Duration,
) {
    while let Some(command) = rx_queue.recv().await {
        if let Err(e) = write_command(&writer, &command).await {
            error!("Failed to write queued message: {e}");
        }
        tokio::time::sleep(rate_limit).await;
    }
    debug!("Outbound queue closed");
}

fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(['\r', '\n'])
        .to_owned()
}

/// Reads lines until end-of-stream, a fatal dispatch error, or until
/// `shutdown` turns true.
///
/// Lines are dispatched one after the other, so entity mutations happen in
/// arrival order; anything slow is spawned by the dispatcher.
pub async fn read_loop<R>(
    reader: R,
    dispatcher: &Dispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), IrcClientError>
where
    R: AsyncRead + Unpin,
{
    let mut buffered_reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown requested");
                return Ok(());
            }
            read = buffered_reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            info!("Server closed the connection");
            return Err(IrcClientError::StreamClosed);
        }

        let line = decode_line(&buf);
        if line.is_empty() {
            continue;
        }
        debug!(">> {line}");
        match dispatcher.dispatch(&line).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!("Failed to handle {line:?}: {e}"),
        }
    }
}
