//! Incremental decoding of a chunked body into JSON objects.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use serde_json::Value;
use tickwire_types::{StreamError, StreamEvent, TransportError};

/// Longest line the decoder buffers before giving up on the stream.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Characters of an offending segment kept in error messages.
const SEGMENT_PREVIEW_CHARS: usize = 256;

/// [`Stream`] of JSON objects decoded from a stream of byte chunks.
///
/// Objects are framed by line terminators. Chunks may split an object at any
/// byte; partial lines are buffered until their terminator arrives. Blank
/// lines are keep-alive filler and are skipped. Several objects on one line
/// are yielded in order.
///
/// Malformed input ends the stream: the decoder yields one
/// [`StreamError::MalformedStreamData`] and then `None`. A transport error
/// from the inner stream is yielded the same way.
#[derive(Debug)]
pub struct EventDecoder<S> {
    inner: S,
    buffer: BytesMut,
    scanned: usize,
    ready: VecDeque<Result<StreamEvent, StreamError>>,
    max_line_bytes: usize,
    done: bool,
}

impl<S> EventDecoder<S> {
    /// Wraps a stream of body chunks.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            scanned: 0,
            ready: VecDeque::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            done: false,
        }
    }

    /// Sets the longest accepted line.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Returns the number of bytes buffered for an incomplete line.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes every complete line in the buffer.
    fn drain_lines(&mut self) {
        while !self.done {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n')
            else {
                self.scanned = self.buffer.len();
                break;
            };
            let end = self.scanned + offset;
            if end > self.max_line_bytes {
                self.fail_oversized();
                break;
            }
            let line = self.buffer.split_to(end + 1);
            self.scanned = 0;
            if let Err(err) = decode_segment(&line[..end], &mut self.ready) {
                self.fail(err);
            }
        }

        if !self.done && self.buffer.len() > self.max_line_bytes {
            self.fail_oversized();
        }
    }

    fn fail_oversized(&mut self) {
        let preview = SEGMENT_PREVIEW_CHARS.min(self.buffer.len());
        let err = malformed(
            format!("line exceeds {} bytes", self.max_line_bytes),
            &String::from_utf8_lossy(&self.buffer[..preview]),
        );
        self.fail(err);
    }

    /// Decodes the unterminated tail once the inner stream has ended.
    fn finish(&mut self) {
        let tail = self.buffer.split();
        self.done = true;
        if let Err(err) = decode_segment(&tail, &mut self.ready) {
            self.ready.push_back(Err(err));
        }
    }

    fn fail(&mut self, err: StreamError) {
        self.ready.push_back(Err(err));
        self.buffer.clear();
        self.scanned = 0;
        self.done = true;
    }
}

impl<S> Stream for EventDecoder<S>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    type Item = Result<StreamEvent, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(item) = this.ready.pop_front() {
                return Poll::Ready(Some(item));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.buffer.extend_from_slice(&chunk);
                    this.drain_lines();
                }
                Some(Err(err)) => this.fail(err.into()),
                None => this.finish(),
            }
        }
    }
}

/// Decodes one line into zero or more objects.
fn decode_segment(
    segment: &[u8],
    out: &mut VecDeque<Result<StreamEvent, StreamError>>,
) -> Result<(), StreamError> {
    let text = std::str::from_utf8(segment)
        .map_err(|e| malformed(e.to_string(), &String::from_utf8_lossy(segment)))?;
    if text.trim().is_empty() {
        return Ok(());
    }

    for value in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match value.map_err(|e| malformed(e.to_string(), text))? {
            Value::Object(event) => out.push_back(Ok(event)),
            other => {
                return Err(malformed(
                    format!("expected a JSON object, found {}", json_type(&other)),
                    text,
                ));
            }
        }
    }
    Ok(())
}

/// Builds a [`StreamError::MalformedStreamData`] with a truncated segment.
pub(crate) fn malformed(reason: String, segment: &str) -> StreamError {
    StreamError::MalformedStreamData {
        reason,
        segment: segment.trim().chars().take(SEGMENT_PREVIEW_CHARS).collect(),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use serde_json::json;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, TransportError>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::copy_from_slice(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn decode_all(parts: &[&[u8]]) -> Vec<Result<StreamEvent, StreamError>> {
        EventDecoder::new(chunks(parts)).collect().await
    }

    fn ok_values(items: Vec<Result<StreamEvent, StreamError>>) -> Vec<Value> {
        items
            .into_iter()
            .map(|item| Value::Object(item.unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_one_object_per_line() {
        let items = decode_all(&[b"{\"a\":1}\n{\"b\":2}\n"]).await;
        assert_eq!(ok_values(items), vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[tokio::test]
    async fn test_object_split_across_chunks() {
        let items = decode_all(&[b"{\"transac", b"tion\":{\"id\"", b":1}}\n{\"heart", b"beat\":{}}\n"])
            .await;
        assert_eq!(
            ok_values(items),
            vec![json!({"transaction": {"id": 1}}), json!({"heartbeat": {}})]
        );
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        let line = "{\"msg\":\"caf\u{e9}\"}\n".as_bytes();
        let (head, tail) = line.split_at(12);
        let items = decode_all(&[head, tail]).await;
        assert_eq!(ok_values(items), vec![json!({"msg": "caf\u{e9}"})]);
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf_are_skipped() {
        let items = decode_all(&[b"\r\n\n  \n{\"a\":1}\r\n\r\n{\"b\":2}\r\n"]).await;
        assert_eq!(ok_values(items), vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_decoded() {
        let items = decode_all(&[b"{\"a\":1}\n{\"b\":", b"2}"]).await;
        assert_eq!(ok_values(items), vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[tokio::test]
    async fn test_several_objects_on_one_line() {
        let items = decode_all(&[b"{\"a\":1}{\"b\":2} {\"c\":3}\n"]).await;
        assert_eq!(
            ok_values(items),
            vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]
        );
    }

    #[tokio::test]
    async fn test_malformed_line_ends_stream() {
        let items = decode_all(&[b"{\"a\":1}\nnot json\n{\"b\":2}\n"]).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        match &items[1] {
            Err(StreamError::MalformedStreamData { segment, .. }) => {
                assert_eq!(segment, "not json");
            }
            other => panic!("expected malformed data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_truncated_tail_is_malformed() {
        let items = decode_all(&[b"{\"a\":1}\n{\"b\":"]).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[1],
            Err(StreamError::MalformedStreamData { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_object_is_malformed() {
        let items = decode_all(&[b"[1,2,3]\n"]).await;
        match &items[..] {
            [Err(StreamError::MalformedStreamData { reason, .. })] => {
                assert!(reason.contains("an array"));
            }
            other => panic!("unexpected items: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let items = decode_all(&[b"{\"a\":\"\xff\"}\n"]).await;
        assert!(matches!(
            items[..],
            [Err(StreamError::MalformedStreamData { .. })]
        ));
    }

    #[tokio::test]
    async fn test_line_limit() {
        let decoder = EventDecoder::new(chunks(&[b"{\"a\":\"0123456789", b"0123456789\"}\n"]))
            .with_max_line_bytes(16);
        let items: Vec<_> = decoder.collect().await;
        match &items[..] {
            [Err(StreamError::MalformedStreamData { reason, .. })] => {
                assert!(reason.contains("16 bytes"));
            }
            other => panic!("unexpected items: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let inner = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"b\"")),
            Err(TransportError::Timeout("idle read".to_string())),
            Ok(Bytes::from_static(b":2}\n")),
        ]);
        let items: Vec<_> = EventDecoder::new(inner).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(err) if err.is_timeout()));
    }

    #[tokio::test]
    async fn test_partial_line_is_buffered() {
        let mut decoder = EventDecoder::new(chunks(&[b"{\"a\":1}\n{\"b\":"]));
        assert!(decoder.next().await.unwrap().is_ok());
        assert_eq!(decoder.buffered_len(), 5);
    }
}
