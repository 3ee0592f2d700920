pub mod canonical;
pub mod convert;
pub mod ops;
pub mod stream;
pub mod types;

pub use ops::{
    new_stream_transformer, streamify_response, transform_model_list, transform_request,
    transform_response, TargetAccumulator,
};
pub use stream::StreamTransformer;
pub use types::{
    GenerateContentRequest, GenerateContentResponse, ModelListResponse, Op, Proto, StreamEvent,
    StreamFormat, TransformContext, TransformError, stream_format,
};

#[cfg(test)]
mod tests {
    use super::*;
    use multigate_protocol::claude;
    use multigate_protocol::openai_chat;

    fn sample_claude_request() -> claude::CreateMessageRequest {
        claude::CreateMessageRequest {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1024,
            messages: vec![claude::Message {
                role: claude::Role::User,
                content: claude::Content::Text("hello there".to_string()),
            }],
            system: Some(claude::SystemField::Text("be terse".to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn claude_to_openai_chat_preserves_system_and_text() {
        let ctx = TransformContext {
            src: Proto::Claude,
            dst: Proto::OpenAIChat,
            src_op: Op::GenerateContent,
            dst_op: Op::GenerateContent,
        };
        let req = GenerateContentRequest::Claude(sample_claude_request());
        let out = transform_request(ctx, req).expect("transform succeeds");
        match out {
            GenerateContentRequest::OpenAIChat(r) => {
                assert_eq!(r.messages.len(), 2);
                assert!(matches!(r.messages[0].role, openai_chat::Role::System));
                assert!(matches!(r.messages[1].role, openai_chat::Role::User));
            }
            _ => panic!("expected openai chat request"),
        }
    }

    #[test]
    fn wrong_source_proto_is_rejected() {
        let ctx = TransformContext {
            src: Proto::Gemini,
            dst: Proto::Claude,
            src_op: Op::GenerateContent,
            dst_op: Op::GenerateContent,
        };
        let req = GenerateContentRequest::Claude(sample_claude_request());
        assert!(matches!(
            transform_request(ctx, req),
            Err(TransformError::ProtoMismatch)
        ));
    }

    #[test]
    fn streamify_then_accumulate_round_trips_text() {
        let resp = canonical::CanonicalResponse {
            id: "msg_1".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            parts: vec![canonical::ContentPart::Text("hi".to_string())],
            finish_reason: canonical::FinishReason::Stop,
            usage: canonical::CanonicalUsage {
                input_tokens: 10,
                output_tokens: 2,
                cached_input_tokens: 0,
                reasoning_tokens: 0,
            },
        };
        let events = streamify_response(Proto::Claude, resp.clone());
        assert!(!events.is_empty());

        let mut acc = TargetAccumulator::default();
        let mut decoder = stream::decode::ClaudeDecoder::default();
        for event in events {
            if let StreamEvent::Claude(e) = event {
                for delta in decoder.feed(e) {
                    acc.apply(delta);
                }
            }
        }
        let rebuilt = acc.finish();
        assert_eq!(rebuilt.model, resp.model);
        assert!(matches!(&rebuilt.parts[0], canonical::ContentPart::Text(t) if t == "hi"));
    }
}
