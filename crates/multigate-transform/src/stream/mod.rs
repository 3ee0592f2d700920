pub mod decode;
pub mod delta;
pub mod encode;

use crate::types::{Proto, StreamEvent, TransformError};

enum SrcDecoder {
    Claude(decode::ClaudeDecoder),
    OpenAIChat(decode::OpenAIChatDecoder),
    OpenAIResponse(decode::OpenAIResponseDecoder),
    Gemini(decode::GeminiDecoder),
    Ollama(decode::OllamaDecoder),
}

enum DstEncoder {
    Claude(encode::ClaudeEncoder),
    OpenAIChat(encode::OpenAIChatEncoder),
    OpenAIResponse(encode::OpenAIResponseEncoder),
    Gemini(encode::GeminiEncoder),
    Ollama(encode::OllamaEncoder),
}

/// Drives one live stream through the `StreamDelta` pivot. Each
/// destination protocol is still fully responsible for its own frame
/// sequencing (bracket open/close, sequence numbers, SSE event names);
/// this only keeps the 5x5 matrix from requiring a hand-rolled state
/// machine per (src, dst) pair.
pub struct StreamTransformer {
    decoder: SrcDecoder,
    encoder: DstEncoder,
}

impl StreamTransformer {
    pub fn new(src: Proto, dst: Proto) -> Self {
        let decoder = match src {
            Proto::Claude => SrcDecoder::Claude(decode::ClaudeDecoder::default()),
            Proto::OpenAIChat => SrcDecoder::OpenAIChat(decode::OpenAIChatDecoder::default()),
            Proto::OpenAIResponse => {
                SrcDecoder::OpenAIResponse(decode::OpenAIResponseDecoder::default())
            }
            Proto::Gemini => SrcDecoder::Gemini(decode::GeminiDecoder::default()),
            Proto::Ollama => SrcDecoder::Ollama(decode::OllamaDecoder::default()),
        };
        let encoder = match dst {
            Proto::Claude => DstEncoder::Claude(encode::ClaudeEncoder::default()),
            Proto::OpenAIChat => DstEncoder::OpenAIChat(encode::OpenAIChatEncoder::default()),
            Proto::OpenAIResponse => {
                DstEncoder::OpenAIResponse(encode::OpenAIResponseEncoder::default())
            }
            Proto::Gemini => DstEncoder::Gemini(encode::GeminiEncoder::default()),
            Proto::Ollama => DstEncoder::Ollama(encode::OllamaEncoder::default()),
        };
        Self { decoder, encoder }
    }

    /// Feeds one source wire event and returns zero or more destination
    /// wire events in emission order.
    pub fn feed(&mut self, event: StreamEvent) -> Result<Vec<StreamEvent>, TransformError> {
        let deltas = match (&mut self.decoder, event) {
            (SrcDecoder::Claude(d), StreamEvent::Claude(e)) => d.feed(e),
            (SrcDecoder::OpenAIChat(d), StreamEvent::OpenAIChat(e)) => d.feed(e),
            (SrcDecoder::OpenAIResponse(d), StreamEvent::OpenAIResponse(e)) => d.feed(e),
            (SrcDecoder::Gemini(d), StreamEvent::Gemini(e)) => d.feed(e),
            (SrcDecoder::Ollama(d), StreamEvent::Ollama(e)) => d.feed(e),
            _ => return Err(TransformError::ProtoMismatch),
        };

        let mut out = Vec::new();
        for delta in deltas {
            match &mut self.encoder {
                DstEncoder::Claude(e) => {
                    out.extend(e.on_delta(delta).into_iter().map(StreamEvent::Claude))
                }
                DstEncoder::OpenAIChat(e) => {
                    out.extend(e.on_delta(delta).into_iter().map(StreamEvent::OpenAIChat))
                }
                DstEncoder::OpenAIResponse(e) => out.extend(
                    e.on_delta(delta)
                        .into_iter()
                        .map(StreamEvent::OpenAIResponse),
                ),
                DstEncoder::Gemini(e) => {
                    out.extend(e.on_delta(delta).into_iter().map(StreamEvent::Gemini))
                }
                DstEncoder::Ollama(e) => {
                    out.extend(e.on_delta(delta).into_iter().map(StreamEvent::Ollama))
                }
            }
        }
        Ok(out)
    }
}
