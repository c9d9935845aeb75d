use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

/// Splits a byte stream into newline-terminated lines.
///
/// Chunks from the network can end anywhere, including in the middle of a
/// multi-byte character, so bytes are buffered until a `\n` is seen. Lines
/// are handed out as raw bytes; decoding is left to the consumer.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.buffer);
                lines.push(strip_carriage_return(raw));
            } else {
                self.buffer.push(byte);
            }
        }
        lines
    }

    /// The unterminated tail left when the stream closes, if any.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(strip_carriage_return(std::mem::take(&mut self.buffer)))
    }
}

fn strip_carriage_return(mut raw: Vec<u8>) -> Vec<u8> {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    raw
}

struct LineState<S> {
    inner: S,
    decoder: LineDecoder,
    ready: VecDeque<Vec<u8>>,
    exhausted: bool,
}

/// Adapt a stream of byte chunks into a lazy stream of lines.
///
/// The result ends when the inner stream ends. An error from the inner
/// stream is yielded once and ends the line stream.
pub fn lines<S, B, E>(inner: S) -> impl Stream<Item = Result<Vec<u8>, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = LineState {
        inner,
        decoder: LineDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.exhausted {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let completed = state.decoder.push(chunk.as_ref());
                    state.ready.extend(completed);
                }
                Some(Err(err)) => {
                    state.exhausted = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    if let Some(rest) = state.decoder.take_remainder() {
                        state.ready.push_back(rest);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, String>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(part.to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn decoder_reassembles_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"a\":").is_empty());
        assert_eq!(decoder.push(b"1}\n{\"b\""), vec![b"{\"a\":1}".to_vec()]);
        assert_eq!(decoder.push(b":2}\n"), vec![b"{\"b\":2}".to_vec()]);
        assert_eq!(decoder.take_remainder(), None);
    }

    #[test]
    fn decoder_strips_carriage_returns() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            decoder.push(b"one\r\ntwo\r\n"),
            vec![b"one".to_vec(), b"two".to_vec()]
        );
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_between_chunks() {
        let text = "안녕\n".as_bytes();
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..2]).is_empty());
        assert_eq!(decoder.push(&text[2..]), vec!["안녕".as_bytes().to_vec()]);
    }

    #[test]
    fn decoder_passes_invalid_utf8_through_untouched() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            decoder.push(b"{\"a\":\"\xff\"}\n"),
            vec![b"{\"a\":\"\xff\"}".to_vec()]
        );
    }

    #[test]
    fn decoder_preserves_empty_lines() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            decoder.push(b"a\n\nb\n"),
            vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]
        );
    }

    #[tokio::test]
    async fn line_stream_yields_unterminated_tail_on_close() {
        let collected: Vec<_> = lines(chunks(&[b"first\nsec", b"ond\nthird"]))
            .collect::<Vec<_>>()
            .await;
        let collected: Vec<String> = collected
            .into_iter()
            .map(|line| String::from_utf8(line.unwrap()).unwrap())
            .collect();
        assert_eq!(collected, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn line_stream_ends_after_inner_error() {
        let inner = stream::iter(vec![
            Ok(b"ok\npart".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"ial\n".to_vec()),
        ]);
        let collected: Vec<_> = lines(inner).collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0], Ok(b"ok".to_vec()));
        assert_eq!(collected[1], Err("connection reset".to_string()));
    }

    #[tokio::test]
    async fn line_stream_of_empty_body_is_empty() {
        let collected: Vec<_> = lines(chunks(&[])).collect().await;
        assert!(collected.is_empty());
    }
}
