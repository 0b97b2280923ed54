//! Button action codes.
//!
//! Parameterized codes (`select_ban_<id>`, `select_account_pay_<id>`) are
//! matched by prefix before the static table.

use serde::{Deserialize, Serialize};

use super::state::CardBrand;

pub const SELECT_BAN_PREFIX: &str = "select_ban_";
pub const SELECT_ACCOUNT_PAY_PREFIX: &str = "select_account_pay_";

/// A parsed button click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ButtonAction {
    Login,
    ContinueGuest,
    ViewBill,
    AnalyzeBill,
    DownloadPdf,
    PayBill,
    PayBillPrompt,
    PayFullBalance,
    PayFullTotal,
    ShowMoreBans,
    ShowMorePayAccounts,
    EnterBan,
    ShowBanList,
    ContactSupport,
    PayWith { brand: CardBrand },
    SubmitPayment,
    CancelPayment,
    /// Pick an account for the action waiting on a BAN.
    SelectBan { ban: String },
    /// Pick an account to pay.
    SelectAccountPay { ban: String },
    /// Anything else.
    Unknown { code: String },
}

impl ButtonAction {
    /// Parse an action code.
    pub fn parse(code: &str) -> Self {
        let code = code.trim();
        parse_parameterized(code).unwrap_or_else(|| match code {
            "login" => Self::Login,
            "continue_guest" => Self::ContinueGuest,
            "view_bill" => Self::ViewBill,
            "analyze_bill" => Self::AnalyzeBill,
            "download_pdf" => Self::DownloadPdf,
            "pay_bill" => Self::PayBill,
            "pay_bill_prompt" => Self::PayBillPrompt,
            "pay_full_balance" => Self::PayFullBalance,
            "pay_full_total" => Self::PayFullTotal,
            "show_more_bans" => Self::ShowMoreBans,
            "show_more_pay_accounts" => Self::ShowMorePayAccounts,
            "enter_ban" => Self::EnterBan,
            "show_ban_list" => Self::ShowBanList,
            "contact_support" => Self::ContactSupport,
            "pay_with_visa" => Self::PayWith {
                brand: CardBrand::Visa,
            },
            "pay_with_mastercard" => Self::PayWith {
                brand: CardBrand::Mastercard,
            },
            "pay_with_discover" => Self::PayWith {
                brand: CardBrand::Discover,
            },
            "pay_with_amex" => Self::PayWith {
                brand: CardBrand::Amex,
            },
            "submit_payment" => Self::SubmitPayment,
            "cancel_payment" => Self::CancelPayment,
            other => Self::Unknown {
                code: other.to_string(),
            },
        })
    }

    /// Action code for a BAN picker entry.
    pub fn select_ban_code(ban: &str) -> String {
        format!("{SELECT_BAN_PREFIX}{ban}")
    }

    /// Action code for a pay-account entry.
    pub fn select_account_pay_code(ban: &str) -> String {
        format!("{SELECT_ACCOUNT_PAY_PREFIX}{ban}")
    }
}

fn parse_parameterized(code: &str) -> Option<ButtonAction> {
    parse_prefixed(code, SELECT_ACCOUNT_PAY_PREFIX)
        .map(|ban| ButtonAction::SelectAccountPay { ban })
        .or_else(|| parse_prefixed(code, SELECT_BAN_PREFIX).map(|ban| ButtonAction::SelectBan { ban }))
}

fn parse_prefixed(code: &str, prefix: &str) -> Option<String> {
    let rest = code.strip_prefix(prefix)?.trim();
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_string())
}
