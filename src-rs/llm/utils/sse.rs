use anyhow::Result;
use std::pin::Pin;
use tokio_stream::Stream;

pub(crate) fn extract_sse_frame_from_buffer(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| (pos, 4usize));
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2usize));

    // Whichever event boundary comes first wins.
    let (delimiter_pos, delimiter_len) = [crlf, lf].into_iter().flatten().min_by_key(|(pos, _)| *pos)?;

    let frame = buffer.drain(..delimiter_pos).collect::<Vec<u8>>();
    buffer.drain(..delimiter_len);
    Some(frame)
}

pub(crate) fn sse_data_from_frame(frame: &str) -> Option<String> {
    let mut data_parts: Vec<&str> = Vec::new();

    for raw_line in frame.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            data_parts.push(rest);
        }
    }

    if data_parts.is_empty() {
        return None;
    }
    Some(data_parts.join("\n"))
}

/// Turns a byte stream carrying `text/event-stream` into the `data` payload of each event.
pub(crate) fn sse_data_stream<T>(
    stream: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<String>> + Send>>
where
    T: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = stream;
        while let Some(chunk_result) = tokio_stream::StreamExt::next(&mut stream).await {
            let bytes = chunk_result?;
            buffer.extend_from_slice(bytes.as_ref());

            while let Some(frame_bytes) = extract_sse_frame_from_buffer(&mut buffer) {
                let frame = String::from_utf8_lossy(&frame_bytes);
                if let Some(data) = sse_data_from_frame(&frame) {
                    yield Ok(data);
                }
            }
        }

        if !buffer.is_empty() {
            let frame = String::from_utf8_lossy(&buffer);
            if let Some(data) = sse_data_from_frame(&frame) {
                yield Ok(data);
            }
        }
    })
}
