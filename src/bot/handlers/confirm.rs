//! Confirm / cancel button prompts.
//!
//! A prompt is an ephemeral message with two buttons. Only the invoking user can
//! answer, and after [`CONFIRM_TIMEOUT`] without an answer the prompt counts as
//! declined. The buttons are removed once the prompt is settled.

use crate::{bot::Context, errors::Result};
use poise::serenity_prelude as serenity;
use std::time::Duration;

/// How long a prompt waits for an answer
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The confirm button was pressed
    Confirmed,
    /// The cancel button was pressed
    Declined,
    /// Nobody answered in time
    TimedOut,
}

impl Confirmation {
    /// Whether the action should go ahead.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Reply telling the user the action was not carried out. `declined` is shown
    /// when the cancel button was pressed.
    #[must_use]
    pub fn abort_message(self, declined: &str) -> String {
        match self {
            Self::TimedOut => "**Aborted** · No answer in time.".to_string(),
            Self::Confirmed | Self::Declined => format!("**Aborted** · {declined}"),
        }
    }
}

/// Button labels of a prompt, confirm first.
#[derive(Debug, Clone, Copy)]
pub struct PromptLabels {
    /// Label of the confirm button
    pub confirm: &'static str,
    /// Label of the cancel button
    pub cancel: &'static str,
}

impl Default for PromptLabels {
    fn default() -> Self {
        Self {
            confirm: "Confirm",
            cancel: "Cancel",
        }
    }
}

/// Custom IDs of the two buttons of the prompt opened by invocation `invocation_id`.
#[must_use]
pub fn button_ids(invocation_id: u64) -> (String, String) {
    (
        format!("{invocation_id}-confirm"),
        format!("{invocation_id}-cancel"),
    )
}

/// Maps the pressed button (if any) to an answer.
#[must_use]
pub fn interpret(pressed: Option<&str>, confirm_id: &str) -> Confirmation {
    match pressed {
        None => Confirmation::TimedOut,
        Some(id) if id == confirm_id => Confirmation::Confirmed,
        Some(_) => Confirmation::Declined,
    }
}

/// Asks the invoking user to confirm and waits for the answer.
///
/// The prompt message is left in place without buttons; callers edit or follow up
/// with the outcome.
pub async fn confirm(
    ctx: Context<'_>,
    prompt: impl Into<String>,
    labels: PromptLabels,
) -> Result<Confirmation> {
    let (confirm_id, cancel_id) = button_ids(ctx.id());
    let buttons = serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(&confirm_id)
            .label(labels.confirm)
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new(&cancel_id)
            .label(labels.cancel)
            .style(serenity::ButtonStyle::Danger),
    ]);
    let prompt = prompt.into();
    let handle = ctx
        .send(
            poise::CreateReply::default()
                .content(&prompt)
                .components(vec![buttons])
                .ephemeral(true),
        )
        .await?;

    let (filter_confirm, filter_cancel) = (confirm_id.clone(), cancel_id);
    let press = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .filter(move |press| {
            press.data.custom_id == filter_confirm || press.data.custom_id == filter_cancel
        })
        .timeout(CONFIRM_TIMEOUT)
        .await;

    let answer = interpret(press.as_ref().map(|p| p.data.custom_id.as_str()), &confirm_id);
    if let Some(press) = press {
        press
            .create_response(ctx, serenity::CreateInteractionResponse::Acknowledge)
            .await?;
    }
    handle
        .edit(
            ctx,
            poise::CreateReply::default()
                .content(prompt)
                .components(Vec::new()),
        )
        .await?;

    Ok(answer)
}
