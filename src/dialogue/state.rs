//! Conversation state: what the orchestrator remembers between turns.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chat::model::Message;

/// A request that may have to wait for sign-in or an account choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    ViewBill,
    AnalyzeBill,
    DownloadBill,
    PayBill,
}

impl PendingAction {
    /// Short phrase used in bot copy ("to view your bill").
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ViewBill => "view your bill",
            Self::AnalyzeBill => "review the changes on your bill",
            Self::DownloadBill => "download your bill",
            Self::PayBill => "make a payment",
        }
    }
}

impl std::fmt::Display for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ViewBill => "view_bill",
            Self::AnalyzeBill => "analyze_bill",
            Self::DownloadBill => "download_bill",
            Self::PayBill => "pay_bill",
        };
        write!(f, "{s}")
    }
}

/// Where the conversation is waiting. No step means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Typing a BAN by hand.
    AwaitingBan,
    /// Picking an account from the BAN list.
    AwaitingAccountSelection,
    /// Entering how much to pay.
    AwaitingPaymentAmount,
    /// Choosing a card brand or filling the payment form.
    AwaitingPaymentMethod,
    /// Entering an email / user id before being sent to sign in.
    AwaitingCredential,
}

impl Step {
    /// Whether free text typed in this step belongs to the step rather than
    /// to intent matching.
    pub fn consumes_text(&self) -> bool {
        matches!(self, Self::AwaitingBan | Self::AwaitingCredential)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingBan => "awaiting_ban",
            Self::AwaitingAccountSelection => "awaiting_account_selection",
            Self::AwaitingPaymentAmount => "awaiting_payment_amount",
            Self::AwaitingPaymentMethod => "awaiting_payment_method",
            Self::AwaitingCredential => "awaiting_credential",
        };
        write!(f, "{s}")
    }
}

/// Card brands offered on the payment-method card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Discover,
    Amex,
}

impl CardBrand {
    pub const ALL: [CardBrand; 4] = [Self::Visa, Self::Mastercard, Self::Discover, Self::Amex];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "MasterCard",
            Self::Discover => "Discover",
            Self::Amex => "American Express",
        }
    }

    /// Button action code selecting this brand.
    pub fn action_code(&self) -> &'static str {
        match self {
            Self::Visa => "pay_with_visa",
            Self::Mastercard => "pay_with_mastercard",
            Self::Discover => "pay_with_discover",
            Self::Amex => "pay_with_amex",
        }
    }
}

/// Per-session dialogue state. Mutated only by the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Request parked until the user signs in.
    pub pending_action: Option<PendingAction>,
    /// Text of the request that was parked.
    pub last_user_question: String,
    /// Most recent user message.
    pub last_user_message: Option<Message>,
    pub selected_account_id: String,
    pub selected_account_name: String,
    pub selected_balance: String,
    pub step: Option<Step>,
    /// Request waiting on a BAN choice (small-business flows).
    pub account_action: Option<PendingAction>,
    /// Current page of the BAN picker.
    pub account_page: usize,
    /// Failed manual BAN entries in a row.
    pub ban_attempts: u32,
    /// Amount chosen for the payment in progress.
    pub payment_amount: Option<Decimal>,
    /// Card brand chosen for the payment in progress.
    pub card_brand: Option<CardBrand>,
    /// User id typed before being sent to sign in.
    pub sign_in_hint: Option<String>,
    /// The chat should reopen and resume after the next sign-in. The
    /// session moves this into its handoff flag after every turn.
    pub reopen_after_login: bool,
}

impl ConversationState {
    /// Whether nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.step.is_none() && self.pending_action.is_none() && self.account_action.is_none()
    }

    /// Record the selected billing account.
    pub fn select_account(&mut self, ban: &str, name: &str, balance: Decimal) {
        self.selected_account_id = ban.to_string();
        self.selected_account_name = name.to_string();
        self.selected_balance = format!("{:.2}", balance);
    }

    /// Selected balance as a decimal, if one is recorded.
    pub fn selected_balance_amount(&self) -> Option<Decimal> {
        self.selected_balance.parse().ok()
    }

    /// Forget the sign-in replay fields once a resumed action has run.
    pub fn clear_resume(&mut self) {
        self.pending_action = None;
        self.last_user_message = None;
        self.last_user_question.clear();
    }

    /// Forget everything about the action tree that just finished.
    pub fn clear_pending_state(&mut self) {
        self.clear_resume();
        self.account_action = None;
        self.account_page = 0;
        self.ban_attempts = 0;
        self.payment_amount = None;
        self.card_brand = None;
        self.step = None;
    }

    /// Forget the payment in progress but keep the account selection.
    pub fn clear_payment(&mut self) {
        self.payment_amount = None;
        self.card_brand = None;
        if matches!(
            self.step,
            Some(Step::AwaitingPaymentAmount) | Some(Step::AwaitingPaymentMethod)
        ) {
            self.step = None;
        }
    }
}
