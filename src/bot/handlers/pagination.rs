//! Paginated transaction history.
//!
//! The view shows [`HISTORY_PAGE_SIZE`](crate::core::report::HISTORY_PAGE_SIZE) rows
//! per page with previous / next buttons, a button switching the last column between
//! reasons and transaction IDs, and a close button. It stops listening after
//! [`HISTORY_TIMEOUT`] of inactivity and then drops its buttons.

use crate::{
    bot::{Context, EMBED_COLOR},
    core::report::{HistoryColumn, history_pages},
    entities::transaction,
    errors::Result,
};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::time::Duration;

/// Inactivity delay after which the view stops reacting
pub const HISTORY_TIMEOUT: Duration = Duration::from_secs(60);

/// Button actions of the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    /// Previous page
    Previous,
    /// Switch between reasons and IDs
    ToggleColumn,
    /// Next page
    Next,
    /// Remove the view
    Close,
}

impl HistoryAction {
    const ALL: [Self; 4] = [Self::Previous, Self::ToggleColumn, Self::Next, Self::Close];

    const fn suffix(self) -> &'static str {
        match self {
            Self::Previous => "prev",
            Self::ToggleColumn => "toggle",
            Self::Next => "next",
            Self::Close => "close",
        }
    }

    /// Custom ID of the button for this action.
    #[must_use]
    pub fn custom_id(self, prefix: &str) -> String {
        format!("{prefix}-{}", self.suffix())
    }

    /// Action encoded by `custom_id`, if it belongs to the view with `prefix`.
    #[must_use]
    pub fn parse(custom_id: &str, prefix: &str) -> Option<Self> {
        let suffix = custom_id.strip_prefix(prefix)?.strip_prefix('-')?;
        Self::ALL.into_iter().find(|a| a.suffix() == suffix)
    }
}

/// State of a history view.
#[derive(Debug, Clone)]
pub struct HistoryView {
    title: String,
    entry_count: usize,
    by_reason: Vec<String>,
    by_id: Vec<String>,
    column: HistoryColumn,
    page: usize,
}

impl HistoryView {
    /// Builds the view of `entries` (newest first) rendered at `now`.
    #[must_use]
    pub fn new(title: String, entries: &[transaction::Model], now: DateTime<Utc>) -> Self {
        Self {
            title,
            entry_count: entries.len(),
            by_reason: history_pages(entries, HistoryColumn::Reason, now),
            by_id: history_pages(entries, HistoryColumn::Id, now),
            column: HistoryColumn::default(),
            page: 0,
        }
    }

    fn pages(&self) -> &[String] {
        match self.column {
            HistoryColumn::Reason => &self.by_reason,
            HistoryColumn::Id => &self.by_id,
        }
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages().len().max(1)
    }

    /// Zero-based current page.
    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    /// Column currently displayed.
    #[must_use]
    pub const fn column(&self) -> HistoryColumn {
        self.column
    }

    /// Applies a navigation action. Returns `false` once the view is closed.
    pub fn apply(&mut self, action: HistoryAction) -> bool {
        match action {
            HistoryAction::Previous => self.page = self.page.saturating_sub(1),
            HistoryAction::Next => self.page = (self.page + 1).min(self.page_count() - 1),
            HistoryAction::ToggleColumn => self.column = self.column.toggled(),
            HistoryAction::Close => return false,
        }
        true
    }

    /// Embed showing the current page.
    #[must_use]
    pub fn embed(&self) -> serenity::CreateEmbed {
        let body = self
            .pages()
            .get(self.page)
            .cloned()
            .unwrap_or_else(|| "No transactions yet.".to_string());
        serenity::CreateEmbed::default()
            .title(&self.title)
            .description(body)
            .color(EMBED_COLOR)
            .footer(serenity::CreateEmbedFooter::new(format!(
                "Page {}/{} · {} transaction{}",
                self.page + 1,
                self.page_count(),
                self.entry_count,
                if self.entry_count == 1 { "" } else { "s" }
            )))
    }

    /// Navigation buttons for the view with `prefix`.
    #[must_use]
    pub fn components(&self, prefix: &str) -> Vec<serenity::CreateActionRow> {
        let toggle_label = match self.column.toggled() {
            HistoryColumn::Id => "Show IDs",
            HistoryColumn::Reason => "Show reasons",
        };
        vec![serenity::CreateActionRow::Buttons(vec![
            serenity::CreateButton::new(HistoryAction::Previous.custom_id(prefix))
                .label("◀")
                .style(serenity::ButtonStyle::Secondary)
                .disabled(self.page == 0),
            serenity::CreateButton::new(HistoryAction::ToggleColumn.custom_id(prefix))
                .label(toggle_label)
                .style(serenity::ButtonStyle::Primary),
            serenity::CreateButton::new(HistoryAction::Next.custom_id(prefix))
                .label("▶")
                .style(serenity::ButtonStyle::Secondary)
                .disabled(self.page + 1 >= self.page_count()),
            serenity::CreateButton::new(HistoryAction::Close.custom_id(prefix))
                .label("Close")
                .style(serenity::ButtonStyle::Danger),
        ])]
    }
}

/// Posts the view and drives it until it is closed or times out.
pub async fn show_history(ctx: Context<'_>, mut view: HistoryView) -> Result<()> {
    let prefix = format!("{}-history", ctx.id());
    let handle = ctx
        .send(
            poise::CreateReply::default()
                .embed(view.embed())
                .components(view.components(&prefix)),
        )
        .await?;

    loop {
        let filter_prefix = prefix.clone();
        let Some(press) = serenity::ComponentInteractionCollector::new(ctx)
            .author_id(ctx.author().id)
            .filter(move |press| press.data.custom_id.starts_with(&filter_prefix))
            .timeout(HISTORY_TIMEOUT)
            .await
        else {
            break;
        };

        let Some(action) = HistoryAction::parse(&press.data.custom_id, &prefix) else {
            continue;
        };
        if !view.apply(action) {
            press
                .create_response(ctx, serenity::CreateInteractionResponse::Acknowledge)
                .await?;
            handle.delete(ctx).await?;
            return Ok(());
        }

        press
            .create_response(
                ctx,
                serenity::CreateInteractionResponse::UpdateMessage(
                    serenity::CreateInteractionResponseMessage::new()
                        .embed(view.embed())
                        .components(view.components(&prefix)),
                ),
            )
            .await?;
    }

    handle
        .edit(
            ctx,
            poise::CreateReply::default()
                .embed(view.embed())
                .components(Vec::new()),
        )
        .await?;
    Ok(())
}
