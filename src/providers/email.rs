use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Value};
use tracing::info;

use crate::breaker::{Breaker, BreakerState};
use crate::config::MailConfig;
use crate::error::FailureKind;
use crate::provider::Provider;
use crate::registry::ProviderSpec;
use crate::tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};

/// Outbound SMTP client bound to one account.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, String> {
        let from: Mailbox = config
            .address
            .parse()
            .map_err(|e| format!("invalid EMAIL_ADDRESS `{}`: {e}", config.address))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| format!("smtp relay setup failed: {e}"))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.address.clone(),
                config.app_password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    pub fn address(&self) -> &Mailbox {
        &self.from
    }

    pub async fn send(
        &self,
        recipients: &[Mailbox],
        subject: &str,
        body: &str,
    ) -> Result<(), String> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient.clone());
        }
        let message = builder
            .body(body.to_string())
            .map_err(|e| format!("could not build message: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("smtp send failed: {e}"))?;
        Ok(())
    }
}

struct SendTool {
    mailer: Option<Mailer>,
    breaker: Breaker,
}

#[async_trait]
impl ToolHandler for SendTool {
    async fn call(&self, args: &Value) -> Outcome {
        match self.breaker.state() {
            BreakerState::Unconfigured { missing } => {
                return Outcome::failure(FailureKind::Configuration, format!("{missing} not set"));
            }
            BreakerState::Disabled { reason } => {
                return Outcome::failure(
                    FailureKind::Dependency,
                    format!("mail delivery disabled: {reason}"),
                );
            }
            BreakerState::Available => {}
        }
        // Available implies the mailer built successfully at load time.
        let Some(mailer) = &self.mailer else {
            return Outcome::failure(FailureKind::Configuration, "mailer not constructed");
        };

        let body = args["body"]
            .as_str()
            .or_else(|| args["request"].as_str())
            .map(str::trim)
            .filter(|b| !b.is_empty());
        let Some(body) = body else {
            return Outcome::failure(
                FailureKind::Validation,
                "nothing to send: provide `body` or a request payload",
            );
        };
        let subject = args["subject"].as_str().unwrap_or("Concierge update");
        let send_to_self = args["send_to_self"].as_bool().unwrap_or(true);

        let mut recipients: Vec<Mailbox> = Vec::new();
        for raw in args["to_address"]
            .as_str()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            match raw.parse::<Mailbox>() {
                Ok(mailbox) => recipients.push(mailbox),
                Err(e) => {
                    return Outcome::failure(
                        FailureKind::Validation,
                        format!("invalid recipient `{raw}`: {e}"),
                    );
                }
            }
        }

        let this = mailer.address();
        if (send_to_self || recipients.is_empty()) && !recipients.contains(this) {
            recipients.push(this.clone());
        }

        match mailer.send(&recipients, subject, body).await {
            Ok(()) => {
                let sent_to: Vec<String> = recipients.iter().map(ToString::to_string).collect();
                info!(recipients = ?sent_to, %subject, "email sent");
                Outcome::success(json!({
                    "message": format!("email sent to {}", sent_to.join(", ")),
                    "recipients": sent_to,
                }))
            }
            Err(reason) => {
                self.breaker.trip(&reason);
                Outcome::failure(FailureKind::Dependency, reason)
            }
        }
    }
}

fn send_tool(mailer: Option<Mailer>, breaker: Breaker) -> Tool {
    // Delivery is a visible external side effect: a retry after a reported
    // failure may put a second copy in someone's inbox.
    Tool::new(
        "send",
        "Compose and deliver an email over SMTP",
        vec![
            ParamSpec::with_default("subject", ParamKind::String, "Concierge update"),
            ParamSpec::optional("body", ParamKind::String),
            ParamSpec::with_default("to_address", ParamKind::String, ""),
            ParamSpec::with_default("send_to_self", ParamKind::Boolean, true),
            ParamSpec::optional("request", ParamKind::String),
        ],
        SendTool { mailer, breaker },
    )
    .not_retry_safe()
}

pub fn provider(config: Option<MailConfig>) -> Result<Provider, String> {
    let (mailer, breaker) = match config {
        Some(config) => (
            Some(Mailer::new(&config)?),
            Breaker::available("smtp"),
        ),
        None => (
            None,
            Breaker::unconfigured("smtp", "EMAIL_ADDRESS or EMAIL_APP_PASSWORD"),
        ),
    };

    Ok(Provider::new(
        "email",
        "Delivers summaries and alerts as email on the assistant's behalf.",
        "Parse the incoming payload, compose a short polite email, and send it.",
    )
    .with_tool(send_tool(mailer, breaker)))
}

pub fn spec(config: Option<MailConfig>) -> ProviderSpec {
    ProviderSpec::new("email", move || provider(config))
}
