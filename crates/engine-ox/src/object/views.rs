use super::{ApiObject, ApiValue};

/// Read-only view over a `chat.completion` object
#[derive(Debug, Clone, Copy)]
pub struct ChatCompletionView<'a>(pub(super) &'a ApiObject);

impl<'a> ChatCompletionView<'a> {
    pub fn id(&self) -> Option<&'a str> {
        self.0.get_str("id")
    }

    pub fn model(&self) -> Option<&'a str> {
        self.0.get_str("model")
    }

    /// Unix timestamp of creation
    pub fn created(&self) -> Option<i64> {
        self.0["created"].as_i64()
    }

    pub fn choices(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["choices"].objects()
    }

    /// Get the first choice, if available
    pub fn first_choice(&self) -> Option<&'a ApiObject> {
        self.choices().next()
    }

    /// Get the content of the first choice, if available
    pub fn content(&self) -> Option<&'a str> {
        self.first_choice()
            .and_then(|choice| choice["message"]["content"].as_str())
    }

    /// Get the finish reason of the first choice
    pub fn finish_reason(&self) -> Option<&'a str> {
        self.first_choice()
            .and_then(|choice| choice.get_str("finish_reason"))
    }

    pub fn usage(&self) -> Option<&'a ApiObject> {
        self.0["usage"].as_object()
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage().and_then(|usage| usage["total_tokens"].as_u64())
    }
}

/// Read-only view over a streamed `chat.completion.chunk`
#[derive(Debug, Clone, Copy)]
pub struct ChatChunkView<'a>(pub(super) &'a ApiObject);

impl<'a> ChatChunkView<'a> {
    pub fn id(&self) -> Option<&'a str> {
        self.0.get_str("id")
    }

    /// Content fragment carried by the first choice's delta
    pub fn delta_content(&self) -> Option<&'a str> {
        self.0["choices"][0]["delta"]["content"].as_str()
    }

    pub fn delta_role(&self) -> Option<&'a str> {
        self.0["choices"][0]["delta"]["role"].as_str()
    }

    pub fn finish_reason(&self) -> Option<&'a str> {
        self.0["choices"][0]["finish_reason"].as_str()
    }
}

/// Read-only view over a moderation result
#[derive(Debug, Clone, Copy)]
pub struct ModerationView<'a>(pub(super) &'a ApiObject);

impl<'a> ModerationView<'a> {
    pub fn id(&self) -> Option<&'a str> {
        self.0.get_str("id")
    }

    pub fn model(&self) -> Option<&'a str> {
        self.0.get_str("model")
    }

    pub fn results(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["results"].objects()
    }

    /// True when any input was flagged
    pub fn flagged(&self) -> bool {
        self.results()
            .any(|result| result["flagged"].as_bool().unwrap_or(false))
    }

    /// Names of the categories flagged across all inputs, in first-seen order
    pub fn flagged_categories(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = Vec::new();
        for result in self.results() {
            let Some(categories) = result["categories"].as_object() else {
                continue;
            };
            for (name, value) in categories.iter() {
                if value.as_bool() == Some(true) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Read-only view over a fine-tune job record
#[derive(Debug, Clone, Copy)]
pub struct FineTuneView<'a>(pub(super) &'a ApiObject);

impl<'a> FineTuneView<'a> {
    pub fn id(&self) -> Option<&'a str> {
        self.0.get_str("id")
    }

    pub fn status(&self) -> Option<&'a str> {
        self.0.get_str("status")
    }

    pub fn is_succeeded(&self) -> bool {
        self.status() == Some("succeeded")
    }

    pub fn model(&self) -> Option<&'a str> {
        self.0.get_str("model")
    }

    pub fn fine_tuned_model(&self) -> Option<&'a str> {
        self.0.get_str("fine_tuned_model")
    }

    pub fn result_files(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["result_files"].objects()
    }

    pub fn training_files(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["training_files"].objects()
    }

    pub fn validation_files(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["validation_files"].objects()
    }
}

/// Read-only view over a `list` envelope
#[derive(Debug, Clone, Copy)]
pub struct ListView<'a>(pub(super) &'a ApiObject);

impl<'a> ListView<'a> {
    /// Raw entries of `data`; empty when the field is missing
    pub fn data(&self) -> &'a [ApiValue] {
        self.0["data"].as_array().unwrap_or_default()
    }

    pub fn objects(&self) -> impl Iterator<Item = &'a ApiObject> + 'a {
        self.0["data"].objects()
    }

    pub fn has_more(&self) -> bool {
        self.0["has_more"].as_bool().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::object::{ApiObject, TransportMeta};
    use serde_json::json;
    use std::sync::Arc;

    fn object(value: serde_json::Value, tag: Option<&str>) -> ApiObject {
        ApiObject::from_json(value, tag, Arc::new(TransportMeta::default())).unwrap()
    }

    #[test]
    fn test_chat_completion_view() {
        let obj = object(
            json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "created": 1677652288,
                "model": "gpt-4",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
            }),
            None,
        );

        let chat = obj.as_chat_completion().unwrap();
        assert_eq!(chat.id(), Some("chatcmpl-123"));
        assert_eq!(chat.model(), Some("gpt-4"));
        assert_eq!(chat.created(), Some(1_677_652_288));
        assert_eq!(chat.content(), Some("Hello!"));
        assert_eq!(chat.finish_reason(), Some("stop"));
        assert_eq!(chat.total_tokens(), Some(21));
        assert_eq!(chat.choices().count(), 1);
    }

    #[test]
    fn test_chat_chunk_view() {
        let obj = object(
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
            }),
            None,
        );
        let chunk = obj.as_chat_chunk().unwrap();
        assert_eq!(chunk.delta_content(), Some("Hel"));
        assert_eq!(chunk.finish_reason(), None);
    }

    #[test]
    fn test_moderation_view() {
        let obj = object(
            json!({
                "id": "modr-1",
                "model": "text-moderation-007",
                "results": [
                    {"flagged": false, "categories": {"hate": false, "violence": false}},
                    {"flagged": true, "categories": {"hate": false, "violence": true}}
                ]
            }),
            Some("moderation"),
        );

        let moderation = obj.as_moderation().unwrap();
        assert!(moderation.flagged());
        assert_eq!(moderation.flagged_categories(), vec!["violence"]);
        assert_eq!(moderation.results().count(), 2);
    }

    #[test]
    fn test_fine_tune_and_list_views() {
        let obj = object(
            json!({
                "object": "list",
                "data": [
                    {"id": "ft-1", "object": "fine-tune", "status": "succeeded",
                     "result_files": [{"id": "file-r", "object": "file"}],
                     "fine_tuned_model": "curie:ft-acme"},
                    {"id": "ft-2", "object": "fine-tune", "status": "running"}
                ]
            }),
            None,
        );

        let list = obj.as_list().unwrap();
        assert_eq!(list.data().len(), 2);
        assert!(!list.has_more());

        let jobs: Vec<_> = list.objects().filter_map(ApiObject::as_fine_tune).collect();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].is_succeeded());
        assert_eq!(jobs[0].fine_tuned_model(), Some("curie:ft-acme"));
        assert_eq!(jobs[0].result_files().next().and_then(ApiObject::id), Some("file-r"));
        assert!(!jobs[1].is_succeeded());
        assert_eq!(jobs[1].result_files().count(), 0);
    }
}
