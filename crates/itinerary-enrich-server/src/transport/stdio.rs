//! Stdio transport: one enrichment request per stdin line, one response per
//! stdout line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::service::EnrichService;
use crate::types::ServerResult;

use super::framing;

/// Line-oriented transport for pipelines and batch jobs.
pub struct StdioTransport {
    service: EnrichService,
}

impl StdioTransport {
    pub fn new(service: EnrichService) -> Self {
        Self { service }
    }

    /// Run the transport loop on the process's stdin and stdout.
    pub async fn run(&self) -> ServerResult<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.run_on(reader, tokio::io::stdout()).await
    }

    /// Run the loop over arbitrary streams until the reader hits EOF.
    pub async fn run_on<R, W>(&self, mut reader: R, mut writer: W) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        tracing::info!("Stdio transport started ({})", self.service.client_name());

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            if line.trim().is_empty() {
                continue;
            }

            let framed = match self.handle_line(&line).await {
                Ok(framed) => framed,
                Err(e) => {
                    tracing::warn!("Request failed: {e}");
                    framing::frame_message(&e.to_body())?
                }
            };

            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    async fn handle_line(&self, line: &str) -> ServerResult<String> {
        let request = framing::parse_request(line)?;
        let enriched = self.service.enrich(request).await?;
        framing::frame_message(&enriched)
    }
}
