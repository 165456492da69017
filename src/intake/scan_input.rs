use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

/// Source of decoded scan strings. Barcode and keyboard entry are indistinguishable here.
#[async_trait]
pub trait ScanInputSource: Send {
    /// Next non-blank scan, or `None` once the source is exhausted.
    async fn next_scan(&mut self) -> Option<String>;
}

/// Newline-delimited scans from any async reader, e.g. a wedge scanner on stdin.
pub struct LineScanSource<R> {
    lines: Lines<R>,
}

impl<R> LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> ScanInputSource for LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_scan(&mut self) -> Option<String> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Scan input closed after read error");
                    return None;
                }
            }
        }
    }
}

/// Replays a fixed list of scans.
#[derive(Debug, Default)]
pub struct ScriptedScans {
    scans: std::collections::VecDeque<String>,
}

impl ScriptedScans {
    pub fn new<I, S>(scans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scans: scans.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ScanInputSource for ScriptedScans {
    async fn next_scan(&mut self) -> Option<String> {
        while let Some(scan) = self.scans.pop_front() {
            if !scan.trim().is_empty() {
                return Some(scan);
            }
        }
        None
    }
}
