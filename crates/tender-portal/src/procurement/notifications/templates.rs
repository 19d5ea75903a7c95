use serde::{Deserialize, Serialize};

use super::NotificationTarget;

/// Outcome message families understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Awarded,
    Rejected,
    Shortlisted,
    UnderReview,
    Custom,
}

impl MessageType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "awarded" | "award" | "accepted" => Some(Self::Awarded),
            "rejected" | "reject" => Some(Self::Rejected),
            "shortlisted" | "shortlist" => Some(Self::Shortlisted),
            "under_review" | "review" => Some(Self::UnderReview),
            "custom" | "general" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Tender context quoted in every message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenderDetails {
    pub title: Option<String>,
    pub tender_number: Option<String>,
    pub organization: Option<String>,
    pub closing_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),
    #[error("custom messages require a non-empty customMessage")]
    MissingCustomMessage,
    #[error("tender details must include a title or tender number")]
    MissingTenderReference,
}

pub fn render(
    message_type: &str,
    custom_message: Option<&str>,
    tender: &TenderDetails,
    recipient: &NotificationTarget,
) -> Result<RenderedMessage, TemplateError> {
    let kind = MessageType::parse(message_type)
        .ok_or_else(|| TemplateError::UnknownMessageType(message_type.to_string()))?;
    let custom = custom_message
        .map(str::trim)
        .filter(|message| !message.is_empty());
    let reference = tender_reference(tender).ok_or(TemplateError::MissingTenderReference)?;

    let greeting_name = recipient
        .contact_person
        .as_deref()
        .or(recipient.company_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Applicant");
    let application_line = match recipient.application_number.as_deref() {
        Some(number) => format!("Application number: {number}"),
        None => format!("Application reference: {}", recipient.id),
    };

    let (subject, headline) = match kind {
        MessageType::Awarded => (
            format!("Tender awarded: {reference}"),
            format!("We are pleased to inform you that your application for {reference} has been successful."),
        ),
        MessageType::Rejected => (
            format!("Tender outcome: {reference}"),
            format!("Thank you for applying for {reference}. After careful evaluation your application was not selected."),
        ),
        MessageType::Shortlisted => (
            format!("Shortlisted: {reference}"),
            format!("Your application for {reference} has been shortlisted for the next evaluation stage."),
        ),
        MessageType::UnderReview => (
            format!("Application under review: {reference}"),
            format!("Your application for {reference} is now under review by the evaluation committee."),
        ),
        MessageType::Custom => {
            let message = custom.ok_or(TemplateError::MissingCustomMessage)?;
            (format!("Update on {reference}"), message.to_string())
        }
    };

    let mut paragraphs = vec![headline];
    if kind != MessageType::Custom {
        if let Some(note) = custom {
            paragraphs.push(note.to_string());
        }
    }
    paragraphs.push(application_line);
    if let Some(closing) = tender.closing_date.as_deref() {
        paragraphs.push(format!("Tender closing date: {closing}"));
    }
    let signature = tender
        .organization
        .as_deref()
        .unwrap_or("The Procurement Office");

    let text_body = format!(
        "Dear {greeting_name},\n\n{}\n\nRegards,\n{signature}\n",
        paragraphs.join("\n\n")
    );
    let html_paragraphs: String = paragraphs
        .iter()
        .map(|paragraph| format!("<p>{}</p>", escape_html(paragraph)))
        .collect();
    let html_body = format!(
        "<p>Dear {},</p>{html_paragraphs}<p>Regards,<br>{}</p>",
        escape_html(greeting_name),
        escape_html(signature)
    );

    Ok(RenderedMessage {
        subject,
        text_body,
        html_body,
    })
}

fn tender_reference(tender: &TenderDetails) -> Option<String> {
    let title = tender.title.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let number = tender
        .tender_number
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match (title, number) {
        (Some(title), Some(number)) => Some(format!("{title} ({number})")),
        (Some(title), None) => Some(title.to_string()),
        (None, Some(number)) => Some(format!("tender {number}")),
        (None, None) => None,
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
