use leadbot_core::connectors::Notification;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Section { text: TextObject },
    Image { image_url: String, alt_text: String },
    Context { elements: Vec<TextObject> },
    Divider,
}

/// Incoming-webhook payload; `text` is the notification fallback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { text: TextObject::plain(text) });
        self
    }

    pub fn section(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Section { text: TextObject::mrkdwn(text) });
        self
    }

    pub fn image(mut self, image_url: impl Into<String>, alt_text: impl Into<String>) -> Self {
        self.blocks.push(Block::Image { image_url: image_url.into(), alt_text: alt_text.into() });
        self
    }

    pub fn context<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        if !builder.elements.is_empty() {
            self.blocks.push(Block::Context { elements: builder.elements });
        }
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { text: self.text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }
}

/// Slack only renders image blocks for publicly fetchable URLs, so inline `data:`
/// photos are mentioned in the context line instead.
pub fn lead_alert_message(notification: &Notification) -> MessageTemplate {
    let photo = notification.photo_url.as_deref().filter(|url| !url.trim().is_empty());
    let linkable = photo.filter(|url| url.starts_with("https://") || url.starts_with("http://"));

    let mut builder = MessageBuilder::new(notification.title.clone()).header(&notification.title);
    if !notification.body.trim().is_empty() {
        builder = builder.section(notification.body.clone());
    }
    if let Some(url) = linkable {
        builder = builder.image(url, "Customer photo");
    }

    builder
        .divider()
        .context(|context| {
            if photo.is_some() && linkable.is_none() {
                context.plain("Customer attached an inline photo in chat");
            }
            if !notification.correlation_id.is_empty() {
                context.mrkdwn(format!("Request `{}`", notification.correlation_id));
            }
        })
        .build()
}
