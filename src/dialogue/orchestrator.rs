//! Dialogue orchestrator: turns one user input into a [`Script`].
//!
//! Every handler runs synchronously against the session's
//! [`ConversationState`] and returns the bot output as delayed steps. The
//! session runtime owns timing; nothing here sleeps or touches the log.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::action::ButtonAction;
use super::fixtures::{Fixtures, normalize_ban};
use super::intent::{Intent, IntentRules};
use super::script::{Script, StepAction};
use super::state::{CardBrand, ConversationState, PendingAction, Step};
use crate::chat::model::{
    BanAccount, Button, Card, FormField, Message, OptionCard, StatusKind,
};
use crate::config::AssistantConfig;
use crate::identity::{FlowContext, IdentityStore};

/// Sign-in page the credential capture hands off to.
pub const LOGIN_PATH: &str = "/login";

/// Names of the payment form fields. All are required.
pub const PAYMENT_FIELDS: [&str; 10] = [
    "firstName",
    "lastName",
    "cardNumber",
    "cvv",
    "expMonth",
    "expYear",
    "street",
    "city",
    "state",
    "zip",
];

/// The dialogue engine. Shared by every session; holds no per-session state.
pub struct Orchestrator {
    config: Arc<AssistantConfig>,
    identity: Arc<dyn IdentityStore>,
    rules: IntentRules,
    fixtures: Fixtures,
}

impl Orchestrator {
    pub fn new(config: Arc<AssistantConfig>, identity: Arc<dyn IdentityStore>) -> Self {
        Self {
            config,
            identity,
            rules: IntentRules::default_rules(),
            fixtures: Fixtures::demo(),
        }
    }

    /// Replace the demo fixtures.
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<dyn IdentityStore> {
        &self.identity
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    // ── Greeting ────────────────────────────────────────────────────

    /// Opening messages for an empty log.
    pub fn greeting(&self) -> Script {
        let user = self.identity.current_user();
        let context = self.identity.flow_context();

        let welcome = if user.is_authenticated {
            format!(
                "Hi {}! I can see you are logged in. How can I assist you?",
                user.display_name
            )
        } else {
            format!(
                "Hi! I'm {}, your AT&T virtual assistant. How can I help you today?",
                self.config.assistant_name
            )
        };

        let script = Script::new().say(Card::text(welcome));
        if context != FlowContext::SmallBusiness {
            return script;
        }

        let connection = if user.is_authenticated {
            format!("Connected to your business account as {}.", user.display_name)
        } else {
            "Connected as a guest. Sign in to see your business accounts.".to_string()
        };

        script
            .say(Card::BusinessSecurity {
                text: "For your security, never share your password or full card number in chat."
                    .to_string(),
            })
            .say(Card::ConnectionStatus { text: connection })
            .say(Card::OptionCards {
                options: primary_option_cards(),
            })
    }

    // ── Free text ───────────────────────────────────────────────────

    /// Handle a user utterance. The reply waits for the typing delay.
    pub fn handle_utterance(&self, state: &mut ConversationState, message: &Message) -> Script {
        let text = message.text().unwrap_or_default().to_string();
        state.last_user_message = Some(message.clone());

        let script = match state.step {
            Some(Step::AwaitingCredential) => self.capture_credential(state, &text),
            Some(Step::AwaitingBan) => self.typed_ban(state, &text),
            Some(Step::AwaitingAccountSelection) if normalize_ban(&text).is_some() => {
                self.typed_ban(state, &text)
            }
            _ => self.dispatch_intent(state, &text),
        };
        script.delayed(self.config.typing_delay)
    }

    fn dispatch_intent(&self, state: &mut ConversationState, text: &str) -> Script {
        let intent = self.rules.evaluate(text);
        info!(intent = ?intent, step = ?state.step, "Utterance classified");

        match intent {
            Intent::ViewBill => self.request(state, PendingAction::ViewBill, text),
            Intent::AnalyzeBill => self.request(state, PendingAction::AnalyzeBill, text),
            Intent::DownloadBill => self.request(state, PendingAction::DownloadBill, text),
            Intent::PayBill => self.request(state, PendingAction::PayBill, text),
            Intent::Amount(amount) => self.handle_payment_amount(state, amount),
            Intent::Clarify if state.step == Some(Step::AwaitingPaymentAmount) => {
                Script::new().say(Card::text(
                    "Please enter a valid payment amount greater than $0:",
                ))
            }
            Intent::Clarify => Script::new().say(Card::text_with_buttons(
                "I can help you with viewing your bill, analyzing changes on your bill, \
                 downloading your bill, or making a payment. What would you like to do?",
                primary_buttons(),
            )),
        }
    }

    // ── Button clicks ───────────────────────────────────────────────

    /// Handle a button click. Replies start immediately.
    pub fn handle_action(&self, state: &mut ConversationState, code: &str) -> Script {
        let action = ButtonAction::parse(code);
        info!(action = %code, step = ?state.step, "Button clicked");

        if let Some(pending) = business_request(&action, state) {
            if let Some(script) = self.business_gate(state, pending, code) {
                return script;
            }
        }

        match action {
            ButtonAction::Login => self.start_sign_in(state),
            ButtonAction::ContinueGuest => self.guest_flow(state),
            ButtonAction::ViewBill => self.request(state, PendingAction::ViewBill, "View bill"),
            ButtonAction::AnalyzeBill => {
                self.request(state, PendingAction::AnalyzeBill, "Analyze bill")
            }
            ButtonAction::DownloadPdf => {
                self.request(state, PendingAction::DownloadBill, "Download PDF")
            }
            ButtonAction::PayBill => self.request(state, PendingAction::PayBill, "Pay bill"),
            ButtonAction::PayBillPrompt => {
                if self.identity.is_authenticated() && !state.selected_account_id.is_empty() {
                    self.amount_prompt(state)
                } else {
                    self.request(state, PendingAction::PayBill, "Pay bill")
                }
            }
            ButtonAction::PayFullBalance => match state.selected_balance_amount() {
                Some(balance) => self.handle_payment_amount(state, balance),
                None => self.amount_prompt(state),
            },
            ButtonAction::PayFullTotal => {
                let total = self.fixtures.total_positive_balance();
                state.selected_account_id.clear();
                state.selected_account_name = "All accounts".to_string();
                state.selected_balance = format!("{:.2}", total);
                state.account_action = None;
                self.handle_payment_amount(state, total)
            }
            ButtonAction::ShowMoreBans => {
                state.account_page += 1;
                self.show_ban_picker(state)
            }
            ButtonAction::ShowMorePayAccounts => {
                state.account_page += 1;
                self.show_pay_options(state)
            }
            ButtonAction::EnterBan => {
                state.step = Some(Step::AwaitingBan);
                state.ban_attempts = 0;
                Script::new().say(Card::text(
                    "Please enter your 12-digit Billing Account Number (BAN):",
                ))
            }
            ButtonAction::ShowBanList => {
                state.account_page = 0;
                if state.account_action == Some(PendingAction::PayBill) {
                    self.show_pay_options(state)
                } else {
                    self.show_ban_picker(state)
                }
            }
            ButtonAction::ContactSupport => {
                state.clear_pending_state();
                Script::new().say(Card::Card {
                    title: "Contact support".to_string(),
                    subtitle: None,
                    text: Some(format!(
                        "Our business support team can help you find your account. \
                         Call {} (Mon-Fri, 7am-9pm).",
                        self.config.support_phone
                    )),
                    buttons: vec![
                        Button::new("Call support", format!("tel:{}", self.config.support_phone))
                            .as_link(),
                    ],
                })
            }
            ButtonAction::PayWith { brand } => self.show_payment_form(state, brand),
            ButtonAction::SubmitPayment => self.submit_payment(state, &BTreeMap::new()),
            ButtonAction::CancelPayment => {
                state.clear_payment();
                Script::new().say(Card::text(
                    "Your payment has been cancelled. Is there anything else I can help with?",
                ))
            }
            ButtonAction::SelectBan { ban } => match self.fixtures.find_account(&ban) {
                Some(account) => {
                    let account = account.clone();
                    self.account_chosen(state, &account)
                }
                None => self.unknown_account(state, &ban),
            },
            ButtonAction::SelectAccountPay { ban } => match self.fixtures.find_account(&ban) {
                Some(account) => {
                    state.select_account(&account.ban, &account.name, account.balance);
                    state.account_action = None;
                    state.account_page = 0;
                    self.amount_prompt(state)
                }
                None => self.unknown_account(state, &ban),
            },
            ButtonAction::Unknown { code } => {
                warn!(action = %code, "Unknown button action");
                Script::new().say(Card::text_with_buttons(
                    "I'm not sure how to help with that. Here's what I can do for you:",
                    primary_buttons(),
                ))
            }
        }
    }

    /// Handle a form submission.
    pub fn submit_form(
        &self,
        state: &mut ConversationState,
        code: &str,
        fields: &BTreeMap<String, String>,
    ) -> Script {
        match ButtonAction::parse(code) {
            ButtonAction::SubmitPayment => self.submit_payment(state, fields),
            _ => self.handle_action(state, code),
        }
    }

    // ── Sign-in handoff ─────────────────────────────────────────────

    /// Replay whatever was parked behind sign-in.
    ///
    /// The pending action is taken out of the state here, so calling this
    /// twice replays nothing the second time.
    pub fn resume_after_login(&self, state: &mut ConversationState) -> Script {
        let user = self.identity.current_user();
        let status = Script::new().say(Card::SignedInStatus {
            text: format!("You're signed in as {}.", user.display_name),
        });

        let Some(action) = state.pending_action.take() else {
            debug!("Nothing pending after sign-in");
            state.clear_resume();
            return status.say_after(
                self.config.resume_delay,
                Card::text_with_buttons(
                    format!("Welcome back, {}! How can I assist you today?", user.display_name),
                    primary_buttons(),
                ),
            );
        };

        info!(action = %action, context = %self.identity.flow_context(), "Resuming after sign-in");
        let replay = self.resolve_authenticated(state, action);
        state.clear_resume();
        status.extend(replay.delayed(self.config.resume_delay))
    }

    fn start_sign_in(&self, state: &mut ConversationState) -> Script {
        if self.identity.is_authenticated() {
            let name = self.identity.current_user().display_name;
            return Script::new().say(Card::text(format!("You're already signed in as {name}.")));
        }
        state.step = Some(Step::AwaitingCredential);
        Script::new().say(Card::text("Please enter your email or user ID to sign in:"))
    }

    fn capture_credential(&self, state: &mut ConversationState, text: &str) -> Script {
        let hint = text.trim();
        if hint.is_empty() {
            return Script::new().say(Card::text(
                "I didn't catch that. Please enter your email or user ID:",
            ));
        }

        state.step = None;
        state.sign_in_hint = Some(hint.to_string());
        let context = self.identity.flow_context();
        self.identity.set_redirect_path(context.landing_path());
        state.reopen_after_login = true;
        info!(context = %context, "Handing off to sign-in");

        Script::new()
            .say(Card::text(format!(
                "Thanks, {hint}. Taking you to sign in. I'll be right here when you get back."
            )))
            .then(
                std::time::Duration::ZERO,
                StepAction::Redirect {
                    path: LOGIN_PATH.to_string(),
                    user_hint: Some(hint.to_string()),
                },
            )
    }

    fn guest_flow(&self, state: &mut ConversationState) -> Script {
        let sign_in = || vec![Button::new("Sign In", "login").primary()];
        match state.pending_action {
            Some(PendingAction::ViewBill) => Script::new().say(Card::text_with_buttons(
                "As a guest, you have limited access. Please sign in for full account details, \
                 or I can help you with general billing questions.",
                sign_in(),
            )),
            Some(PendingAction::AnalyzeBill) => Script::new().say(Card::text_with_buttons(
                "Reviewing the changes on your bill needs access to your account. \
                 Please sign in and I'll walk you through it.",
                sign_in(),
            )),
            Some(PendingAction::DownloadBill) => Script::new().say(Card::text_with_buttons(
                "PDF downloads require authentication for security. \
                 Please sign in to download your bill.",
                sign_in(),
            )),
            Some(PendingAction::PayBill) => {
                state.step = Some(Step::AwaitingPaymentAmount);
                Script::new().say(Card::text(
                    "For guest payments, you'll be redirected to our secure payment portal. \
                     Please enter the amount you'd like to pay:",
                ))
            }
            None => Script::new().say(Card::text_with_buttons(
                "No problem, you can keep chatting as a guest. What would you like to do?",
                primary_buttons(),
            )),
        }
    }

    // ── Requests ────────────────────────────────────────────────────

    /// Entry point of the four primary requests.
    fn request(&self, state: &mut ConversationState, action: PendingAction, question: &str) -> Script {
        if !self.identity.is_authenticated() {
            state.pending_action = Some(action);
            state.last_user_question = question.to_string();
            state.reopen_after_login = true;
            info!(action = %action, "Request parked until sign-in");
            return self.sign_in_prompt(action);
        }
        self.resolve_authenticated(state, action)
    }

    /// Gate for the business account buttons (BAN picker, pay options,
    /// manual BAN entry). Guests are asked to sign in with the request
    /// parked; signed-in users outside small business get their own bill.
    /// `None` means the click may proceed.
    fn business_gate(
        &self,
        state: &mut ConversationState,
        action: PendingAction,
        question: &str,
    ) -> Option<Script> {
        if !self.identity.is_authenticated() {
            state.step = None;
            state.account_action = None;
            return Some(self.request(state, action, question));
        }
        if self.identity.flow_context() != FlowContext::SmallBusiness {
            debug!(action = %action, "Business action outside small business");
            state.step = None;
            state.account_action = None;
            return Some(self.resolve_authenticated(state, action));
        }
        None
    }

    fn typed_ban(&self, state: &mut ConversationState, text: &str) -> Script {
        let action = state.account_action.unwrap_or(PendingAction::ViewBill);
        match self.business_gate(state, action, text) {
            Some(script) => script,
            None => self.handle_ban_entry(state, text),
        }
    }

    fn sign_in_prompt(&self, action: PendingAction) -> Script {
        Script::new()
            .say(Card::Card {
                title: "Sign in required".to_string(),
                subtitle: None,
                text: Some(format!(
                    "To {} I need you to sign in first. You can also continue as a guest \
                     for limited help.",
                    action.describe()
                )),
                buttons: vec![
                    Button::new("Sign In", "login").primary(),
                    Button::new("Continue as guest", "continue_guest"),
                ],
            })
            .say_after(
                self.config.sign_in_follow_up_delay,
                Card::text(format!(
                    "Once you sign in, we'll resume this conversation right where we left off \
                     and {}.",
                    action.describe()
                )),
            )
    }

    fn resolve_authenticated(&self, state: &mut ConversationState, action: PendingAction) -> Script {
        if self.identity.flow_context() == FlowContext::SmallBusiness {
            state.account_action = Some(action);
            state.account_page = 0;
            return if action == PendingAction::PayBill {
                self.show_pay_options(state)
            } else {
                self.show_ban_picker(state)
            };
        }

        let bill = self.fixtures.consumer_bill();
        state.select_account(&bill.account_number, &bill.company_name, bill.total_due);
        self.resolve(state, action, None)
    }

    /// Run `action` against the selected account. `account` is the business
    /// account when one was picked; `None` means the consumer bill.
    fn resolve(
        &self,
        state: &mut ConversationState,
        action: PendingAction,
        account: Option<&BanAccount>,
    ) -> Script {
        debug!(action = %action, ban = ?account.map(|a| a.ban.as_str()), "Resolving request");
        match action {
            PendingAction::ViewBill => {
                state.clear_pending_state();
                let bill_data = match account {
                    Some(account) => self.fixtures.business_bill(account),
                    None => self.fixtures.consumer_bill().clone(),
                };
                Script::new().say(Card::BillSummary {
                    title: "Your Bill Summary".to_string(),
                    bill_data,
                    buttons: vec![
                        Button::new("Download PDF", "download_pdf"),
                        Button::new("Pay Bill", "pay_bill_prompt").primary(),
                        Button::new("Analyze bill", "analyze_bill"),
                    ],
                })
            }
            PendingAction::AnalyzeBill => {
                state.clear_pending_state();
                let analysis = self.fixtures.analysis();
                let increase = analysis.total_increase();
                Script::new()
                    .say(Card::text(
                        "Let me take a look at what changed on your bill since last month...",
                    ))
                    .say_after(
                        self.config.analysis_delay,
                        Card::BillAnalysis {
                            title: Some("Bill Analysis Summary".to_string()),
                            text: format!(
                                "Your bill went up by {} compared to last month. {} of your {} \
                                 lines changed; here's what's different.",
                                money(increase),
                                analysis.lines_with_increases(),
                                analysis.total_lines
                            ),
                            current_total: money(analysis.current_total),
                            previous_total: money(analysis.previous_total),
                            total_increase: money(increase),
                            bill_breakdown: analysis.breakdown.clone(),
                            total_lines: analysis.total_lines,
                            lines_with_increases: analysis.lines_with_increases(),
                            lines_unchanged: analysis.lines_unchanged(),
                            auto_pay_info: analysis.auto_pay_info.clone(),
                            additional_info: analysis.additional_info.clone(),
                            buttons: vec![
                                Button::new("Pay Bill", "pay_bill_prompt").primary(),
                                Button::new("Download PDF", "download_pdf"),
                            ],
                        },
                    )
            }
            PendingAction::DownloadBill => {
                state.clear_pending_state();
                Script::new()
                    .say(Card::text("Preparing your bill for download..."))
                    .then(
                        self.config.download_delay,
                        StepAction::DeliverDocument {
                            ban: account.map(|a| a.ban.clone()),
                        },
                    )
            }
            PendingAction::PayBill => {
                state.clear_resume();
                state.account_action = None;
                self.amount_prompt(state)
            }
        }
    }

    // ── Business accounts ───────────────────────────────────────────

    fn show_ban_picker(&self, state: &mut ConversationState) -> Script {
        let action = state.account_action.unwrap_or(PendingAction::ViewBill);
        let page = self.fixtures.paginated_accounts(
            state.account_page,
            self.config.page_size,
            false,
        );
        state.step = Some(Step::AwaitingAccountSelection);

        let mut buttons = Vec::new();
        if page.has_more {
            buttons.push(Button::new("Show more accounts", "show_more_bans"));
        }
        buttons.push(Button::new("Enter BAN manually", "enter_ban"));

        Script::new().say(Card::BanInput {
            title: "Select an account".to_string(),
            text: format!(
                "Which billing account would you like to {}? ({} accounts)",
                action.describe(),
                page.total
            ),
            ban_accounts: page.accounts,
            has_more: page.has_more,
            buttons,
        })
    }

    fn show_pay_options(&self, state: &mut ConversationState) -> Script {
        let page = self.fixtures.paginated_accounts(
            state.account_page,
            self.config.page_size,
            true,
        );
        let total = self.fixtures.total_positive_balance();
        state.account_action = Some(PendingAction::PayBill);
        state.step = Some(Step::AwaitingAccountSelection);

        let mut buttons: Vec<Button> = page
            .accounts
            .iter()
            .map(|a| {
                Button::new(
                    format!("{} (BAN {}) - {}", a.name, a.ban, money(a.balance)),
                    ButtonAction::select_account_pay_code(&a.ban),
                )
            })
            .collect();
        if page.has_more {
            buttons.push(Button::new("Show more accounts", "show_more_pay_accounts"));
        }
        buttons.push(
            Button::new(format!("Pay Full Total ({})", money(total)), "pay_full_total").primary(),
        );
        buttons.push(Button::new("Enter BAN manually", "enter_ban"));

        Script::new().say(Card::Card {
            title: "Choose an account to pay".to_string(),
            subtitle: Some(format!("{} accounts with a balance due", page.total)),
            text: Some("Pick an account, or pay the full total across all of them.".to_string()),
            buttons,
        })
    }

    fn account_chosen(&self, state: &mut ConversationState, account: &BanAccount) -> Script {
        state.select_account(&account.ban, &account.name, account.balance);
        state.step = None;
        state.ban_attempts = 0;
        state.account_page = 0;
        let action = state.account_action.take().unwrap_or(PendingAction::ViewBill);
        info!(ban = %account.ban, action = %action, "Account selected");
        self.resolve(state, action, Some(account))
    }

    fn unknown_account(&self, state: &mut ConversationState, ban: &str) -> Script {
        warn!(ban = %ban, "Selected account not found");
        state.step = Some(Step::AwaitingAccountSelection);
        Script::new().say(Card::text_with_buttons(
            format!("I couldn't find an account with BAN {ban}."),
            vec![
                Button::new("Show account list", "show_ban_list"),
                Button::new("Enter BAN manually", "enter_ban"),
            ],
        ))
    }

    fn handle_ban_entry(&self, state: &mut ConversationState, text: &str) -> Script {
        let normalized = normalize_ban(text);
        if let Some(account) = normalized
            .as_deref()
            .and_then(|ban| self.fixtures.find_account(ban))
        {
            let account = account.clone();
            return self.account_chosen(state, &account);
        }

        state.ban_attempts += 1;
        info!(attempts = state.ban_attempts, "BAN entry rejected");

        if state.ban_attempts >= self.config.max_ban_attempts {
            state.step = None;
            state.ban_attempts = 0;
            return Script::new().say(Card::Card {
                title: "Let's try something else".to_string(),
                subtitle: None,
                text: Some(
                    "I'm having trouble finding that account. You can pick it from your \
                     account list or contact support for help."
                        .to_string(),
                ),
                buttons: vec![
                    Button::new("Show account list", "show_ban_list").primary(),
                    Button::new("Contact support", "contact_support"),
                ],
            });
        }

        state.step = Some(Step::AwaitingBan);
        let remaining = self.config.max_ban_attempts - state.ban_attempts;
        let text = match normalized {
            Some(ban) => format!(
                "I couldn't find an account with BAN {ban}. Please check the number and try \
                 again ({remaining} attempts left)."
            ),
            None => format!(
                "That doesn't look like a valid BAN. A BAN is 12 digits, for example \
                 2873 0122 4446. Please try again ({remaining} attempts left)."
            ),
        };
        Script::new().say(Card::text(text))
    }

    // ── Payments ────────────────────────────────────────────────────

    fn amount_prompt(&self, state: &mut ConversationState) -> Script {
        state.step = Some(Step::AwaitingPaymentAmount);
        state.payment_amount = None;
        state.card_brand = None;

        match state.selected_balance_amount() {
            Some(balance) if !state.selected_account_name.is_empty() => {
                Script::new().say(Card::text_with_buttons(
                    format!(
                        "The balance for {} is {}. How much would you like to pay? \
                         Enter an amount like 75.00.",
                        state.selected_account_name,
                        money(balance)
                    ),
                    vec![
                        Button::new(
                            format!("Pay full balance ({})", money(balance)),
                            "pay_full_balance",
                        )
                        .primary(),
                    ],
                ))
            }
            _ => Script::new().say(Card::text("Please enter the amount you want to pay:")),
        }
    }

    fn handle_payment_amount(&self, state: &mut ConversationState, amount: Decimal) -> Script {
        if amount <= Decimal::ZERO {
            state.step = Some(Step::AwaitingPaymentAmount);
            return Script::new().say(Card::text(
                "Please enter a valid payment amount greater than $0:",
            ));
        }

        let mut amount = amount;
        amount.rescale(2);
        state.payment_amount = Some(amount);
        state.card_brand = None;
        state.step = Some(Step::AwaitingPaymentMethod);
        info!(amount = %amount, "Payment amount accepted");

        Script::new()
            .say(Card::text(format!(
                "Great! You'd like to pay {}. Let's choose how you want to pay.",
                money(amount)
            )))
            .say_after(
                self.config.amount_confirm_delay,
                Card::PaymentMethod {
                    title: "Select Payment Method".to_string(),
                    payment_amount: amount,
                    buttons: CardBrand::ALL
                        .iter()
                        .map(|b| Button::new(b.display_name(), b.action_code()))
                        .collect(),
                },
            )
    }

    fn show_payment_form(&self, state: &mut ConversationState, brand: CardBrand) -> Script {
        let Some(amount) = state.payment_amount else {
            return self.amount_prompt(state);
        };
        state.card_brand = Some(brand);
        state.step = Some(Step::AwaitingPaymentMethod);

        Script::new().say(Card::Form {
            title: format!("{} Payment", brand.display_name()),
            subtitle: Some(format!("Amount: {}", money(amount))),
            text: Some("Please enter your payment details:".to_string()),
            form_fields: payment_form_fields(),
            buttons: vec![
                Button::new("Submit Payment", "submit_payment").primary(),
                Button::new("Cancel", "cancel_payment"),
            ],
        })
    }

    fn submit_payment(
        &self,
        state: &mut ConversationState,
        fields: &BTreeMap<String, String>,
    ) -> Script {
        let (Some(amount), Some(brand)) = (state.payment_amount, state.card_brand) else {
            return self.amount_prompt(state);
        };

        let missing: Vec<&str> = PAYMENT_FIELDS
            .iter()
            .copied()
            .filter(|name| fields.get(*name).is_none_or(|v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            debug!(missing = ?missing, "Payment form incomplete");
            return Script::new().say(Card::text(
                "Please fill in every field of the payment form to continue.",
            ));
        }

        let confirmation = confirmation_number();
        let account = if state.selected_account_id.is_empty() {
            state.selected_account_name.clone()
        } else {
            format!("BAN {}", state.selected_account_id)
        };
        info!(amount = %amount, brand = ?brand, confirmation = %confirmation, "Payment submitted");
        state.clear_payment();
        state.clear_pending_state();

        Script::new()
            .say(Card::text("Processing your payment... Please wait."))
            .say_after(
                self.config.payment_processing_delay,
                Card::Status {
                    status_type: StatusKind::Success,
                    text: format!(
                        "Your {} payment of {} for {} has been processed successfully! \
                         Confirmation number: {}. You should receive a confirmation email shortly.",
                        brand.display_name(),
                        money(amount),
                        account,
                        confirmation
                    ),
                },
            )
    }
}

/// Message appended when the bill PDF was delivered.
pub fn download_ready_card(file_name: &str) -> Card {
    Card::text(format!(
        "Your bill ({file_name}) has been downloaded successfully! Check your Downloads folder."
    ))
}

/// Message appended when the bill PDF could not be loaded.
pub fn download_failed_card() -> Card {
    Card::Status {
        status_type: StatusKind::Error,
        text: "Something went wrong while preparing your bill. Please try again in a moment."
            .to_string(),
    }
}

/// The four primary actions as buttons.
pub fn primary_buttons() -> Vec<Button> {
    vec![
        Button::new("View bill", "view_bill"),
        Button::new("Analyze bill", "analyze_bill"),
        Button::new("Download PDF", "download_pdf"),
        Button::new("Pay bill", "pay_bill"),
    ]
}

fn primary_option_cards() -> Vec<OptionCard> {
    [
        ("View bill", "See your latest statement", "assets/icons/bill.svg", "view_bill"),
        ("Analyze bill", "Find out what changed", "assets/icons/analysis.svg", "analyze_bill"),
        ("Download PDF", "Save a copy of your bill", "assets/icons/download.svg", "download_pdf"),
        ("Pay bill", "Pay one or all accounts", "assets/icons/pay.svg", "pay_bill"),
    ]
    .into_iter()
    .map(|(title, description, icon_url, action)| OptionCard {
        title: title.to_string(),
        description: description.to_string(),
        icon_url: icon_url.to_string(),
        action: action.to_string(),
    })
    .collect()
}

fn payment_form_fields() -> Vec<FormField> {
    let months = (1..=12).map(|m| format!("{m:02}")).collect();
    let years = (2025..=2030).map(|y| y.to_string()).collect();
    vec![
        FormField::text("First Name", "firstName", "Enter first name"),
        FormField::text("Last Name", "lastName", "Enter last name"),
        FormField::text("Card Number", "cardNumber", "Enter card number"),
        FormField::text("CVV", "cvv", "3 or 4 digits"),
        FormField::select("Expiration Month", "expMonth", months),
        FormField::select("Expiration Year", "expYear", years),
        FormField::text("Street Address", "street", "Enter street address"),
        FormField::text("City", "city", "Enter city"),
        FormField::text("State", "state", "Enter state"),
        FormField::text("ZIP Code", "zip", "Enter ZIP code"),
    ]
}

fn confirmation_number() -> String {
    let n: u64 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);
    format!("EVA{n}")
}

/// The request behind a business account button, if `action` is one.
fn business_request(action: &ButtonAction, state: &ConversationState) -> Option<PendingAction> {
    match action {
        ButtonAction::PayFullTotal
        | ButtonAction::ShowMorePayAccounts
        | ButtonAction::SelectAccountPay { .. } => Some(PendingAction::PayBill),
        ButtonAction::ShowMoreBans
        | ButtonAction::ShowBanList
        | ButtonAction::EnterBan
        | ButtonAction::SelectBan { .. } => {
            Some(state.account_action.unwrap_or(PendingAction::ViewBill))
        }
        _ => None,
    }
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}
