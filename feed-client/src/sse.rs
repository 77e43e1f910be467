use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::error::{FeedClientError, FeedClientResult};

/// Инкрементальный декодер text/event-stream: скармливаем чанки байтов,
/// забираем готовые `data`-пейлоады. Комментарии (keep-alive) игнорируются.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let frame: String = self.buf.drain(..pos + 2).collect();
            if let Some(data) = parse_frame(frame.trim_end_matches('\n')) {
                payloads.push(data);
            }
        }
        payloads
    }
}

fn parse_frame(frame: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(data_lines.join("\n"))
}

/// Превращает SSE-ответ в типизированный поток снапшотов.
pub(crate) fn snapshot_stream<T>(
    response: reqwest::Response,
) -> impl Stream<Item = FeedClientResult<T>>
where
    T: DeserializeOwned,
{
    let mut decoder = SseDecoder::new();
    response.bytes_stream().flat_map(move |chunk| {
        let items: Vec<FeedClientResult<T>> = match chunk {
            Ok(bytes) => decoder
                .feed(&bytes)
                .into_iter()
                .map(|payload| {
                    serde_json::from_str::<T>(&payload)
                        .map_err(|err| FeedClientError::Stream(err.to_string()))
                })
                .collect(),
            Err(err) => vec![Err(FeedClientError::from_reqwest(err))],
        };
        futures::stream::iter(items)
    })
}

#[cfg(test)]
mod tests {
    use super::SseDecoder;

    #[test]
    fn decodes_single_frame() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: {\"posts\":[]}\n\n");
        assert_eq!(payloads, vec!["{\"posts\":[]}".to_string()]);
    }

    #[test]
    fn decodes_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"po").is_empty());
        assert!(decoder.feed(b"sts\":[]}").is_empty());
        let payloads = decoder.feed(b"\n\n");
        assert_eq!(payloads, vec!["{\"posts\":[]}".to_string()]);
    }

    #[test]
    fn decodes_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: 1\n\ndata: 2\n\n");
        assert_eq!(payloads, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn ignores_keep_alive_comments() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b":\n\ndata: 1\n\n: ping\n\n");
        assert_eq!(payloads, vec!["1".to_string()]);
    }

    #[test]
    fn joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(payloads, vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn keeps_partial_frame_buffered() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        let payloads = decoder.feed(b"\n\n");
        assert_eq!(payloads, vec!["tail".to_string()]);
    }
}
