use serde_json::Value;
use vaultlab_types::{InvocationResponse, Turn};

use super::{LabView, RenderedView, SurfaceMeta, ViewBody};
use crate::host::HostError;

use super::list::CLOSE_ACTION;

/// Append-only transcript of user lines and remote replies.
pub struct ConversationPanel {
    meta: SurfaceMeta,
    transcript: Vec<Turn>,
}

impl ConversationPanel {
    pub fn new(meta: SurfaceMeta) -> Self {
        Self {
            meta,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Append the user's line before the remote answers. Blank lines are skipped.
    pub fn push_user(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.transcript.push(Turn::user(line));
    }
}

impl LabView for ConversationPanel {
    fn view_type(&self) -> &str {
        self.meta.id.as_str()
    }

    fn display_text(&self) -> &str {
        &self.meta.title
    }

    fn icon(&self) -> &str {
        &self.meta.icon
    }

    fn render(&self) -> RenderedView {
        RenderedView {
            view_type: self.meta.id.to_string(),
            title: self.meta.title.clone(),
            icon: self.meta.icon.clone(),
            header: None,
            body: ViewBody::Transcript(self.transcript.clone()),
            actions: vec![CLOSE_ACTION],
        }
    }

    fn set_data(&mut self, response: &InvocationResponse) -> Result<(), HostError> {
        if let Some(contents) = response.contents() {
            let reply = match contents {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            self.transcript.push(Turn::remote(reply));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vaultlab_types::{ActiveOperation, OperationConfig, OperationId, OperationMode, Speaker};

    #[test]
    fn transcript_only_grows() {
        let operation = ActiveOperation::new(
            OperationId::from("chat"),
            OperationConfig::new("Chat", OperationMode::Conversation).activated(),
        );
        let mut panel = ConversationPanel::new(SurfaceMeta::for_operation(&operation));
        panel.push_user("hello");
        panel.push_user("   ");
        panel
            .set_data(&InvocationResponse::from_value(json!({"contents": "hi there"})))
            .unwrap();
        panel.set_data(&InvocationResponse::from_value(json!({}))).unwrap();
        panel
            .set_data(&InvocationResponse::from_value(json!({"contents": {"n": 2}})))
            .unwrap();

        let speakers: Vec<_> = panel.transcript().iter().map(|turn| turn.speaker).collect();
        assert_eq!(speakers, [Speaker::User, Speaker::Remote, Speaker::Remote]);
        assert_eq!(panel.transcript()[1].text, "hi there");
        assert_eq!(panel.transcript()[2].text, "{\"n\":2}");
    }
}
