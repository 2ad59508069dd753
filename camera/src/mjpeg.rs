use ball_speed_common::frame::TimestampedFrame;
use bytes::BytesMut;
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use crate::clock::DriverClock;
use crate::CameraError;

static SEQ_COUNTER: AtomicU64 = AtomicU64::new(0);

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for a `multipart/x-mixed-replace` JPEG stream.
pub struct MjpegParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MjpegParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Append a chunk and return every JPEG it completed, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    else {
                        // Resume the search just before the unscanned tail next time.
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        break;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before boundary
                    let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg_data = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                    if !jpeg_data.is_empty() {
                        frames.push(jpeg_data);
                    }
                    self.state = ParseState::SeekingHeaderEnd;
                }
            }
        }
        frames
    }
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand a frame to the driver without waiting. Frames that arrive while the
/// driver is still busy with the previous one are dropped.
fn offer_frame(
    frames: &Sender<TimestampedFrame>,
    clock: &DriverClock,
    jpeg_data: Vec<u8>,
) -> Result<(), CameraError> {
    let seq = SEQ_COUNTER.fetch_add(1, Ordering::Relaxed);
    let frame = TimestampedFrame::new(
        jpeg_data,
        clock.now_ms(),
        Utc::now().timestamp_millis(),
        seq,
    );
    match frames.try_send(frame) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(frame)) => {
            debug!(seq = frame.seq, "driver busy, dropping frame");
            Ok(())
        }
        Err(TrySendError::Closed(_)) => Err(CameraError::DriverGone),
    }
}

/// Consume the MJPEG stream and hand frames to the driver.
/// Reconnects with exponential backoff on failure.
pub async fn run_mjpeg_source(
    stream_url: String,
    frames: Sender<TimestampedFrame>,
    clock: DriverClock,
) -> Result<(), CameraError> {
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);

    loop {
        info!(url = %stream_url, "connecting to MJPEG stream");
        match consume_stream(&stream_url, &frames, &clock).await {
            Ok(()) => {
                info!("stream ended cleanly, reconnecting");
                backoff = Duration::from_secs(2);
            }
            Err(CameraError::DriverGone) => return Err(CameraError::DriverGone),
            Err(e) => {
                error!(error = %e, "stream error, reconnecting in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn consume_stream(
    url: &str,
    frames: &Sender<TimestampedFrame>,
    clock: &DriverClock,
) -> Result<(), CameraError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(CameraError::HttpConnect)?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(CameraError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(CameraError::HttpStatus(response.status().as_u16()));
    }

    info!(status = %response.status(), "connected to MJPEG stream");

    let mut byte_stream = response.bytes_stream();
    let mut parser = MjpegParser::new();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(CameraError::HttpStream)?;
        for jpeg_data in parser.feed(&chunk) {
            offer_frame(frames, clock, jpeg_data)?;
        }
    }

    Ok(())
}

/// Polling-based fallback: periodically fetch single frames.
pub async fn run_polling_source(
    frame_url: String,
    frames: Sender<TimestampedFrame>,
    interval: Duration,
    clock: DriverClock,
) -> Result<(), CameraError> {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        match client.get(&frame_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(body) => offer_frame(&frames, &clock, body.to_vec())?,
                Err(e) => warn!(error = %e, "failed to read camera frame body"),
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "non-success response from camera");
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch camera frame");
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const STREAM: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\nAAAA\r\n\
--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 2\r\n\r\nBB\r\n--frame\r\n";

    #[test]
    fn splits_whole_stream() {
        let mut parser = MjpegParser::new();
        let frames = parser.feed(STREAM);
        assert_eq!(frames, vec![b"AAAA".to_vec(), b"BB".to_vec()]);
    }

    #[test]
    fn boundary_split_across_chunks() {
        let mut parser = MjpegParser::new();
        let mut frames = Vec::new();
        for chunk in STREAM.chunks(3) {
            frames.extend(parser.feed(chunk));
        }
        assert_eq!(frames, vec![b"AAAA".to_vec(), b"BB".to_vec()]);
    }

    #[test]
    fn garbage_before_first_boundary_is_skipped() {
        let mut parser = MjpegParser::new();
        let mut input = b"HTTP noise without marker".to_vec();
        input.extend_from_slice(STREAM);
        assert_eq!(parser.feed(&input).len(), 2);
    }

    #[test]
    fn incomplete_frame_is_held_back() {
        let mut parser = MjpegParser::new();
        assert!(parser
            .feed(b"--frame\r\nContent-Type: image/jpeg\r\n\r\nCCC")
            .is_empty());
        assert_eq!(parser.feed(b"C\r\n--frame\r\n"), vec![b"CCCC".to_vec()]);
    }

    #[test]
    fn find_subsequence_edges() {
        assert_eq!(find_subsequence(b"ab", b"abc"), None);
        assert_eq!(find_subsequence(b"xxabc", b"abc"), Some(2));
    }

    #[tokio::test]
    async fn full_channel_drops_frame() {
        let clock = DriverClock::start();
        let (tx, mut rx) = mpsc::channel(1);
        offer_frame(&tx, &clock, vec![1]).unwrap();
        offer_frame(&tx, &clock, vec![2]).unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.jpeg_data, vec![1]);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(matches!(
            offer_frame(&tx, &clock, vec![3]),
            Err(CameraError::DriverGone)
        ));
    }

    #[tokio::test]
    async fn frames_carry_driver_timeline() {
        let clock = DriverClock::start();
        let before = clock.now_ms();
        let (tx, mut rx) = mpsc::channel(1);
        offer_frame(&tx, &clock, vec![1]).unwrap();
        let frame = rx.recv().await.unwrap();
        assert!(frame.monotonic_ms >= before);
        assert!(frame.monotonic_ms <= clock.now_ms());
        // Wall time is a Unix timestamp, far ahead of the driver timeline.
        assert!(frame.captured_at_ms > frame.monotonic_ms);
    }
}
