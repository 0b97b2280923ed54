//! Chat data model: messages, the card taxonomy, and session events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    Bot,
    User,
}

/// One entry in the message log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub card: Card,
}

impl Message {
    /// Create a message with a fresh id and the current time.
    pub fn new(author: Author, card: Card) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author,
            timestamp: Utc::now(),
            card,
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }

    /// Plain text of a user message (or the text of a bot text card).
    pub fn text(&self) -> Option<&str> {
        match &self.card {
            Card::Text { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A clickable button on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub as_link: bool,
}

impl Button {
    pub fn new(text: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: action.into(),
            primary: false,
            as_link: false,
        }
    }

    /// Mark as the primary (highlighted) button.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Render as a link instead of a button.
    pub fn as_link(mut self) -> Self {
        self.as_link = true;
        self
    }
}

/// Input kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Select,
}

/// Descriptor of one form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub label: String,
    pub kind: FieldKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl FormField {
    pub fn text(label: &str, name: &str, placeholder: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: FieldKind::Text,
            name: name.to_string(),
            placeholder: Some(placeholder.to_string()),
            options: Vec::new(),
            optional: false,
        }
    }

    pub fn select(label: &str, name: &str, options: Vec<String>) -> Self {
        Self {
            label: label.to_string(),
            kind: FieldKind::Select,
            name: name.to_string(),
            placeholder: None,
            options,
            optional: false,
        }
    }
}

/// Tone of a status card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Error,
    Info,
    Warning,
}

/// A service line on a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub name: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ref: Option<String>,
}

/// Structured bill fields for a `bill-summary` card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummaryData {
    pub company_name: String,
    pub company_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<String>,
    pub issue_date: String,
    pub account_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation_account: Option<String>,
    pub invoice: String,
    pub total_due: Decimal,
    pub due_date: String,
    pub last_bill: Decimal,
    pub payment_amount: Decimal,
    pub payment_date: String,
    pub remaining_balance: Decimal,
    pub services: Vec<ServiceItem>,
    pub total_services: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustments: Option<Decimal>,
}

/// Per-line change in a `bill-analysis` card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillBreakdownItem {
    pub line_number: String,
    pub name: String,
    pub change_text: String,
    pub change_amount: Decimal,
    pub details: Vec<String>,
}

/// One tile of an `option-cards` card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCard {
    pub title: String,
    pub description: String,
    pub icon_url: String,
    pub action: String,
}

/// A billing account as shown in the BAN picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanAccount {
    pub ban: String,
    pub name: String,
    pub balance: Decimal,
}

/// Typed, renderable payload of a message. Exactly one `type` tag.
///
/// Optional fields are omitted from JSON when empty; renderers treat a
/// missing field as "not shown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Card {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    Card {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    Image {
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Form {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        form_fields: Vec<FormField>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    BillSummary {
        title: String,
        bill_data: BillSummaryData,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    BillAnalysis {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
        current_total: String,
        previous_total: String,
        total_increase: String,
        bill_breakdown: Vec<BillBreakdownItem>,
        total_lines: u32,
        lines_with_increases: u32,
        lines_unchanged: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_pay_info: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional_info: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    PaymentMethod {
        title: String,
        payment_amount: Decimal,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    Status {
        status_type: StatusKind,
        text: String,
    },
    BusinessSecurity {
        text: String,
    },
    ConnectionStatus {
        text: String,
    },
    OptionCards {
        options: Vec<OptionCard>,
    },
    BanInput {
        title: String,
        text: String,
        ban_accounts: Vec<BanAccount>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        has_more: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<Button>,
    },
    SignedInStatus {
        text: String,
    },
}

impl Card {
    /// Plain text card.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            title: None,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Text card with buttons.
    pub fn text_with_buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self::Text {
            title: None,
            text: text.into(),
            buttons,
        }
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Card { .. } => "card",
            Self::Image { .. } => "image",
            Self::Form { .. } => "form",
            Self::BillSummary { .. } => "bill-summary",
            Self::BillAnalysis { .. } => "bill-analysis",
            Self::PaymentMethod { .. } => "payment-method",
            Self::Status { .. } => "status",
            Self::BusinessSecurity { .. } => "business-security",
            Self::ConnectionStatus { .. } => "connection-status",
            Self::OptionCards { .. } => "option-cards",
            Self::BanInput { .. } => "ban-input",
            Self::SignedInStatus { .. } => "signed-in-status",
        }
    }

    /// Buttons carried by this card (empty for button-less variants).
    pub fn buttons(&self) -> &[Button] {
        match self {
            Self::Text { buttons, .. }
            | Self::Card { buttons, .. }
            | Self::Form { buttons, .. }
            | Self::BillSummary { buttons, .. }
            | Self::BillAnalysis { buttons, .. }
            | Self::PaymentMethod { buttons, .. }
            | Self::BanInput { buttons, .. } => buttons,
            _ => &[],
        }
    }

    /// Main human-readable text, if the card has one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. }
            | Self::Status { text, .. }
            | Self::BusinessSecurity { text }
            | Self::ConnectionStatus { text }
            | Self::SignedInStatus { text }
            | Self::BillAnalysis { text, .. }
            | Self::BanInput { text, .. } => Some(text.as_str()),
            Self::Card { text, .. } | Self::Form { text, .. } | Self::Image { text, .. } => {
                text.as_deref()
            }
            Self::BillSummary { .. } | Self::PaymentMethod { .. } | Self::OptionCards { .. } => {
                None
            }
        }
    }
}

/// Events broadcast by a chat session to its presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A message was appended to the log.
    MessageAppended { message: Message },
    /// The log was cleared.
    LogReset,
    /// The chat panel opened or closed.
    ChatVisibility { open: bool },
    /// Navigate to the sign-in page.
    Redirect {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_hint: Option<String>,
    },
    /// A bill document is ready for the client to save.
    DocumentReady { file_name: String, size_bytes: u64 },
}
