//! CLI channel: stdin/stdout REPL driving one local chat session.

use std::sync::Arc;

use futures::{StreamExt, stream};
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, warn};

use crate::chat::model::{Card, SessionEvent};
use crate::chat::ChatSession;
use crate::error::Error;
use crate::identity::FlowContext;

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Say(String),
    Click(String),
    Login { user_id: String, secret: String },
    Logout,
    Context(FlowContext),
    Open,
    Close,
    Reset,
    Help,
    Quit,
    Invalid(String),
}

impl CliCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let mut parts = trimmed.split_whitespace();
        let head = parts.next().unwrap_or_default();

        match head {
            "/quit" | "/exit" => Self::Quit,
            "/help" | "/?" => Self::Help,
            "/logout" => Self::Logout,
            "/open" => Self::Open,
            "/close" => Self::Close,
            "/reset" => Self::Reset,
            "/click" => match parts.next() {
                Some(action) => Self::Click(action.to_string()),
                None => Self::Invalid("usage: /click <action>".into()),
            },
            "/login" => match (parts.next(), parts.next()) {
                (Some(user_id), Some(secret)) => Self::Login {
                    user_id: user_id.to_string(),
                    secret: secret.to_string(),
                },
                _ => Self::Invalid("usage: /login <user> <password>".into()),
            },
            "/context" => match parts.next().map(str::parse::<FlowContext>) {
                Some(Ok(context)) => Self::Context(context),
                Some(Err(e)) => Self::Invalid(e),
                None => Self::Invalid("usage: /context <consumer|small-business|enterprise>".into()),
            },
            _ if head.starts_with('/') => Self::Invalid(format!("Unknown command: {head}")),
            _ => Self::Say(trimmed.to_string()),
        }
    }
}

/// REPL over stdin for a single session.
pub struct CliChannel {
    session: Arc<ChatSession>,
}

impl CliChannel {
    pub fn new(session: Arc<ChatSession>) -> Self {
        Self { session }
    }

    /// Run until `/quit` or EOF.
    pub async fn run(&self) -> Result<(), Error> {
        let printer = spawn_printer(&self.session);
        let mut commands = Box::pin(stdin_commands());
        let mut context = FlowContext::default();

        self.session.open_chat().await?;

        while let Some(command) = commands.next().await {
            match command {
                CliCommand::Quit => break,
                CliCommand::Help => print_help(),
                CliCommand::Say(text) => self.session.send_message(&text).await?,
                CliCommand::Click(action) => self.session.click(&action).await?,
                CliCommand::Login { user_id, secret } => {
                    let secret = SecretString::from(secret);
                    if self.session.login(&user_id, &secret).await? {
                        eprintln!("Signed in as {user_id}");
                        if !self.session.resume_pending(context).await? {
                            self.session.reinitialize_after_login().await?;
                        }
                    } else {
                        eprintln!("Sign-in rejected (passwords need at least 8 characters)");
                    }
                }
                CliCommand::Logout => {
                    self.session.logout()?;
                    eprintln!("Signed out");
                }
                CliCommand::Context(next) => {
                    context = next;
                    self.session.resume_after_navigation(context).await?;
                    eprintln!("Now on {} ({})", context, context.landing_path());
                }
                CliCommand::Open => self.session.open_chat().await?,
                CliCommand::Close => self.session.close_chat(),
                CliCommand::Reset => self.session.reset_chat().await?,
                CliCommand::Invalid(message) => eprintln!("{message}"),
            }
            eprint!("> ");
        }

        printer.abort();
        Ok(())
    }
}

fn stdin_commands() -> impl futures::Stream<Item = CliCommand> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        eprint!("> ");

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        eprint!("> ");
                        continue;
                    }
                    if tx.send(CliCommand::parse(&line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|cmd| (cmd, rx))
    })
}

fn spawn_printer(session: &ChatSession) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(session.subscribe());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("\n{line}\n");
                        eprint!("> ");
                    }
                }
                Err(e) => warn!(error = %e, "CLI printer lagged"),
            }
        }
    })
}

fn print_help() {
    eprintln!("Type a message, or:");
    eprintln!("  /click <action>          press a button");
    eprintln!("  /login <user> <password> sign in");
    eprintln!("  /logout                  sign out");
    eprintln!("  /context <ctx>           consumer | small-business | enterprise");
    eprintln!("  /open, /close, /reset    chat panel");
    eprintln!("  /quit                    exit");
}

/// Text rendering of a session event. User messages are not echoed.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::MessageAppended { message } if message.is_user() => None,
        SessionEvent::MessageAppended { message } => Some(render_card(&message.card)),
        SessionEvent::LogReset => Some("(chat cleared)".to_string()),
        SessionEvent::ChatVisibility { open } => {
            Some(if *open { "(chat opened)" } else { "(chat closed)" }.to_string())
        }
        SessionEvent::Redirect { path, .. } => Some(format!("-> navigate to {path}")),
        SessionEvent::DocumentReady {
            file_name,
            size_bytes,
        } => Some(format!("[saved {file_name}, {size_bytes} bytes]")),
    }
}

/// Plain-text rendering of a card.
pub fn render_card(card: &Card) -> String {
    let mut out = String::from("EVA: ");
    match card {
        Card::Card { title, subtitle, .. } | Card::Form { title, subtitle, .. } => {
            out.push_str(title);
            if let Some(subtitle) = subtitle {
                out.push_str(&format!(" - {subtitle}"));
            }
            if let Some(body) = card.body() {
                out.push_str(&format!("\n  {body}"));
            }
        }
        Card::BillSummary { title, bill_data, .. } => {
            out.push_str(&format!(
                "{title}\n  {} (account {})\n  Total due: ${:.2} by {}",
                bill_data.company_name, bill_data.account_number, bill_data.total_due, bill_data.due_date
            ));
        }
        Card::BillAnalysis {
            text,
            previous_total,
            current_total,
            bill_breakdown,
            ..
        } => {
            out.push_str(&format!("{text}\n  {previous_total} -> {current_total}"));
            for item in bill_breakdown {
                out.push_str(&format!(
                    "\n  {} {}: {} (+${:.2})",
                    item.line_number, item.name, item.change_text, item.change_amount
                ));
            }
        }
        Card::PaymentMethod {
            title,
            payment_amount,
            ..
        } => out.push_str(&format!("{title} - ${payment_amount:.2}")),
        Card::OptionCards { options } => {
            let titles: Vec<&str> = options.iter().map(|o| o.title.as_str()).collect();
            out.push_str(&titles.join(" | "));
        }
        Card::BanInput {
            text,
            ban_accounts,
            ..
        } => {
            out.push_str(text);
            for account in ban_accounts {
                out.push_str(&format!(
                    "\n  {} {} ${:.2}  [select_ban_{}]",
                    account.ban, account.name, account.balance, account.ban
                ));
            }
        }
        Card::Image { image_url, .. } => out.push_str(image_url),
        _ => out.push_str(card.body().unwrap_or_default()),
    }

    for button in card.buttons() {
        out.push_str(&format!("\n  [{}] /click {}", button.text, button.action));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::model::{Author, Button, Message};
    use rust_decimal_macros::dec;

    #[test]
    fn parses_commands() {
        assert_eq!(CliCommand::parse("/quit"), CliCommand::Quit);
        assert_eq!(CliCommand::parse("  view my bill "), CliCommand::Say("view my bill".into()));
        assert_eq!(CliCommand::parse("/click pay_bill"), CliCommand::Click("pay_bill".into()));
        assert_eq!(
            CliCommand::parse("/login pat hunter22"),
            CliCommand::Login {
                user_id: "pat".into(),
                secret: "hunter22".into()
            }
        );
        assert_eq!(
            CliCommand::parse("/context small-business"),
            CliCommand::Context(FlowContext::SmallBusiness)
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(CliCommand::parse("/click"), CliCommand::Invalid(_)));
        assert!(matches!(CliCommand::parse("/login pat"), CliCommand::Invalid(_)));
        assert!(matches!(CliCommand::parse("/context mars"), CliCommand::Invalid(_)));
        assert!(matches!(CliCommand::parse("/launch"), CliCommand::Invalid(_)));
    }

    #[test]
    fn renders_buttons_as_click_hints() {
        let card = Card::text_with_buttons("Sign in?", vec![Button::new("Sign In", "login")]);
        let text = render_card(&card);
        assert!(text.starts_with("EVA: Sign in?"));
        assert!(text.contains("[Sign In] /click login"));
    }

    #[test]
    fn renders_payment_amount() {
        let card = Card::PaymentMethod {
            title: "Select Payment Method".into(),
            payment_amount: dec!(75.00),
            buttons: vec![],
        };
        assert_eq!(render_card(&card), "EVA: Select Payment Method - $75.00");
    }

    #[test]
    fn user_messages_are_not_echoed() {
        let event = SessionEvent::MessageAppended {
            message: Message::new(Author::User, Card::text("hi")),
        };
        assert!(render_event(&event).is_none());
        assert_eq!(
            render_event(&SessionEvent::Redirect {
                path: "/login".into(),
                user_hint: None
            })
            .as_deref(),
            Some("-> navigate to /login")
        );
    }
}
