//! Gambling ledger - betting sessions, stakes, payouts and refunds.
//!
//! A channel holds at most one open session. Stakes leave the bettor's account the
//! moment the bet is placed, in the same database transaction as the bet row. A
//! session ends either by resolution (winners are paid, see [`payout`]) or by
//! cancellation (every stake is refunded). Both delete the bets and then the session.

use crate::{
    core::{
        AccountKey, account,
        format::{bar_chart, capitalize, codeblock, percent, table},
        from_db_id,
        ledger::Ledger,
        to_db_id,
    },
    entities::{Bet, Betting, bet, betting, transaction},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, instrument};

/// Maximum characters of a session title
pub const MAX_TITLE_LEN: usize = 100;
/// Fewest choices a session accepts
pub const MIN_CHOICES: usize = 2;
/// Most choices a session accepts
pub const MAX_CHOICES: usize = 4;

/// Normalized form of a choice label: trimmed and lowercase.
#[must_use]
pub fn normalize_choice(choice: &str) -> String {
    choice.trim().to_lowercase()
}

/// Parses a choice list separated by `,`, `|` or `;`.
///
/// Labels are normalized, empty ones dropped and duplicates removed keeping the first
/// occurrence. Between [`MIN_CHOICES`] and [`MAX_CHOICES`] labels must remain.
pub fn parse_choices(raw: &str) -> Result<Vec<String>> {
    let mut choices: Vec<String> = Vec::new();
    for label in raw.split([',', '|', ';']).map(normalize_choice) {
        if !label.is_empty() && !choices.contains(&label) {
            choices.push(label);
        }
    }

    if (MIN_CHOICES..=MAX_CHOICES).contains(&choices.len()) {
        Ok(choices)
    } else {
        Err(Error::InvalidChoiceCount {
            count: choices.len(),
        })
    }
}

/// An open betting session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Channel the session runs in
    pub channel_id: u64,
    /// Title shown on the board
    pub title: String,
    /// Normalized choice labels in declaration order
    pub choices: Vec<String>,
    /// Board message, once posted
    pub message_id: Option<u64>,
    /// Smallest accepted stake
    pub minimal_bet: i64,
    /// Member who opened the session
    pub author_id: u64,
}

impl Session {
    /// Whether `choice` (normalized) is one of the session's labels.
    #[must_use]
    pub fn has_choice(&self, choice: &str) -> bool {
        self.choices.iter().any(|c| *c == choice)
    }

    /// Normalizes `result` and checks it is a declared choice.
    pub fn validate_choice(&self, choice: &str) -> Result<String> {
        let choice = normalize_choice(choice);
        if self.has_choice(&choice) {
            Ok(choice)
        } else {
            Err(Error::InvalidChoice { choice })
        }
    }
}

impl From<betting::Model> for Session {
    fn from(model: betting::Model) -> Self {
        Self {
            channel_id: from_db_id(model.channel_id),
            title: model.title,
            choices: model
                .choices
                .split(',')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            message_id: (model.message_id != 0).then(|| from_db_id(model.message_id)),
            minimal_bet: model.minimal_bet,
            author_id: from_db_id(model.author_id),
        }
    }
}

/// Parameters of a session to open.
#[derive(Debug, Clone, Copy)]
pub struct NewSession<'a> {
    /// Channel to open the session in
    pub channel_id: u64,
    /// Session title
    pub title: &'a str,
    /// Raw choice list, see [`parse_choices`]
    pub choices: &'a str,
    /// Smallest accepted stake, at least 1
    pub minimal_bet: i64,
    /// Member opening the session
    pub author_id: u64,
}

/// Opens a session in a channel that has none.
#[instrument(skip(db))]
pub async fn open_session<C: ConnectionTrait>(db: &C, new: NewSession<'_>) -> Result<Session> {
    if new.title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::TitleTooLong { max: MAX_TITLE_LEN });
    }
    if new.minimal_bet < 1 {
        return Err(Error::InvalidAmount {
            amount: new.minimal_bet,
        });
    }
    let choices = parse_choices(new.choices)?;
    if get_session(db, new.channel_id).await?.is_some() {
        return Err(Error::SessionAlreadyOpen {
            channel_id: new.channel_id,
        });
    }

    let model = betting::ActiveModel {
        channel_id: Set(to_db_id(new.channel_id)),
        title: Set(new.title.to_string()),
        choices: Set(choices.join(",")),
        message_id: Set(0),
        minimal_bet: Set(new.minimal_bet),
        author_id: Set(to_db_id(new.author_id)),
    }
    .insert(db)
    .await?;

    info!(channel_id = new.channel_id, "Betting session opened");
    Ok(model.into())
}

/// Records the message displaying the session board.
pub async fn attach_display_message<C: ConnectionTrait>(
    db: &C,
    channel_id: u64,
    message_id: u64,
) -> Result<()> {
    let result = Betting::update_many()
        .col_expr(betting::Column::MessageId, Expr::value(to_db_id(message_id)))
        .filter(betting::Column::ChannelId.eq(to_db_id(channel_id)))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::NoOpenSession { channel_id });
    }
    Ok(())
}

/// Session open in `channel_id`, if any.
pub async fn get_session<C: ConnectionTrait>(db: &C, channel_id: u64) -> Result<Option<Session>> {
    Ok(Betting::find_by_id(to_db_id(channel_id))
        .one(db)
        .await?
        .map(Session::from))
}

/// Session open in `channel_id`, or [`Error::NoOpenSession`].
pub async fn require_session<C: ConnectionTrait>(db: &C, channel_id: u64) -> Result<Session> {
    get_session(db, channel_id)
        .await?
        .ok_or(Error::NoOpenSession { channel_id })
}

/// All open sessions of the guild.
pub async fn list_sessions<C: ConnectionTrait>(db: &C) -> Result<Vec<Session>> {
    Ok(Betting::find()
        .order_by_asc(betting::Column::ChannelId)
        .all(db)
        .await?
        .into_iter()
        .map(Session::from)
        .collect())
}

/// Bets placed in a session, in placement order.
pub async fn bets<C: ConnectionTrait>(db: &C, channel_id: u64) -> Result<Vec<bet::Model>> {
    Bet::find()
        .filter(bet::Column::ChannelId.eq(to_db_id(channel_id)))
        .order_by_asc(bet::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Bet of `user_id` in the session, if any.
pub async fn user_bet<C: ConnectionTrait>(
    db: &C,
    channel_id: u64,
    user_id: u64,
) -> Result<Option<bet::Model>> {
    Bet::find()
        .filter(bet::Column::ChannelId.eq(to_db_id(channel_id)))
        .filter(bet::Column::UserId.eq(to_db_id(user_id)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// What placing a bet would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetPlan {
    /// First bet of the user in this session
    New,
    /// Adds to an existing stake on the same choice
    TopUp {
        /// Stake before the top-up
        current: i64,
    },
}

/// Validates a bet without changing anything.
///
/// Checks, in order: open session, declared choice, minimum stake, balance, and that
/// an existing bet is on the same choice.
pub async fn plan_bet<C: ConnectionTrait>(
    db: &C,
    key: AccountKey,
    channel_id: u64,
    choice: &str,
    amount: i64,
) -> Result<(Session, String, BetPlan)> {
    let session = require_session(db, channel_id).await?;
    let choice = session.validate_choice(choice)?;
    if amount < session.minimal_bet {
        return Err(Error::StakeBelowMinimum {
            amount,
            minimum: session.minimal_bet,
        });
    }

    let balance = account::balance(db, key).await?;
    if balance < amount {
        return Err(Error::InsufficientFunds {
            current: balance,
            required: amount,
        });
    }

    let plan = match user_bet(db, channel_id, key.user_id).await? {
        None => BetPlan::New,
        Some(existing) if existing.choice == choice => BetPlan::TopUp {
            current: existing.amount,
        },
        Some(existing) => {
            return Err(Error::ChoiceLocked {
                current: existing.choice,
            });
        }
    };
    Ok((session, choice, plan))
}

/// Outcome of a placed bet.
#[derive(Debug, Clone)]
pub struct PlacedBet {
    /// Session bet on
    pub session: Session,
    /// Normalized choice
    pub choice: String,
    /// Amount withdrawn by this call
    pub added: i64,
    /// Total stake on the choice after this call
    pub total: i64,
    /// Whether an existing stake was increased
    pub top_up: bool,
    /// Ledger entry of the withdrawal
    pub transaction: transaction::Model,
}

/// Places or tops up a bet, withdrawing the stake in the same database transaction.
#[instrument(skip(ledger, db))]
pub async fn place_bet<C>(
    ledger: &Ledger,
    db: &C,
    key: AccountKey,
    channel_id: u64,
    choice: &str,
    amount: i64,
) -> Result<PlacedBet>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let (session, choice, plan) = plan_bet(&txn, key, channel_id, choice, amount).await?;

    let reason = format!("Bet on {}", session.title);
    let transaction = ledger.withdraw(&txn, key, amount, &reason).await?;

    let total = match plan {
        BetPlan::New => {
            bet::ActiveModel {
                user_id: Set(key.db_user_id()),
                channel_id: Set(to_db_id(channel_id)),
                choice: Set(choice.clone()),
                amount: Set(amount),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            amount
        }
        BetPlan::TopUp { current } => {
            Bet::update_many()
                .col_expr(bet::Column::Amount, Expr::col(bet::Column::Amount).add(amount))
                .filter(bet::Column::ChannelId.eq(to_db_id(channel_id)))
                .filter(bet::Column::UserId.eq(key.db_user_id()))
                .exec(&txn)
                .await?;
            current + amount
        }
    };
    txn.commit().await?;

    info!("{key} staked {amount} on {choice:?} in channel {channel_id}");
    Ok(PlacedBet {
        session,
        choice,
        added: amount,
        total,
        top_up: matches!(plan, BetPlan::TopUp { .. }),
        transaction,
    })
}

/// Total staked on one choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceTally {
    /// Choice label
    pub choice: String,
    /// Sum of stakes on it
    pub total: i64,
}

/// Stakes per choice, in declaration order.
#[must_use]
pub fn tally(session: &Session, bets: &[bet::Model]) -> Vec<ChoiceTally> {
    session
        .choices
        .iter()
        .map(|choice| ChoiceTally {
            choice: choice.clone(),
            total: bets
                .iter()
                .filter(|b| b.choice == *choice)
                .map(|b| b.amount)
                .sum(),
        })
        .collect()
}

/// Renders the board as a `diff` code block: one line per choice with its stakes,
/// share bar and percentage. With a result, the winning line starts with `+` and
/// the others with `-`.
#[must_use]
pub fn render_board(
    session: &Session,
    bets: &[bet::Model],
    currency: &str,
    result: Option<&str>,
) -> String {
    let tallies = tally(session, bets);
    let pot: i64 = tallies.iter().map(|t| t.total).sum();

    let rows: Vec<Vec<String>> = tallies
        .iter()
        .map(|t| {
            let label = capitalize(&t.choice);
            let label = match result {
                Some(winner) if winner == t.choice => format!("+{label}"),
                Some(_) => format!("-{label}"),
                None => label,
            };
            let share = if pot == 0 {
                String::new()
            } else {
                format!("{} {}%", bar_chart(t.total, pot, 10), percent(t.total, pot))
            };
            vec![label, format!("{}{currency}", t.total), share]
        })
        .collect();

    codeblock(&table(None, &rows), "diff")
}

/// Amount paid to a winner who staked `stake` out of `pot`.
///
/// Evaluates `stake * pot / stake`: every winner receives the whole pot.
#[must_use]
pub fn payout(stake: i64, pot: i64) -> i64 {
    let amount = (i128::from(stake) * i128::from(pot))
        .checked_div(i128::from(stake))
        .unwrap_or(0);
    i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Money paid to one winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Winner
    pub user_id: u64,
    /// Their stake
    pub stake: i64,
    /// Amount deposited
    pub amount: i64,
}

/// Outcome of a resolved session.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The session as it was before teardown
    pub session: Session,
    /// Bets as they were before teardown
    pub bets: Vec<bet::Model>,
    /// Winning choice
    pub result: String,
    /// Sum of all stakes
    pub pot: i64,
    /// Winners, largest stake first
    pub payouts: Vec<Payout>,
}

/// Closes a session with `result`, pays the winners and tears the session down.
///
/// A payout whose transaction ID collides with an entry of the same second (typically
/// the winner's own stake) fails the whole resolution with
/// [`Error::TransactionIdCollision`]. Nothing is applied and the call can be repeated.
#[instrument(skip(ledger, db))]
pub async fn resolve_session<C>(
    ledger: &Ledger,
    db: &C,
    guild_id: u64,
    channel_id: u64,
    result: &str,
) -> Result<Resolution>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let session = require_session(&txn, channel_id).await?;
    let result = session.validate_choice(result)?;
    let bets = bets(&txn, channel_id).await?;
    let pot: i64 = bets.iter().map(|b| b.amount).sum();

    let mut winners: Vec<&bet::Model> = bets.iter().filter(|b| b.choice == result).collect();
    winners.sort_by(|a, b| b.amount.cmp(&a.amount));

    let reason = format!("Winnings from bet {}", session.title);
    let mut payouts = Vec::with_capacity(winners.len());
    for winner in winners {
        let user_id = from_db_id(winner.user_id);
        let amount = payout(winner.amount, pot);
        ledger
            .deposit(&txn, AccountKey::new(guild_id, user_id), amount, &reason)
            .await?;
        payouts.push(Payout {
            user_id,
            stake: winner.amount,
            amount,
        });
    }

    teardown(&txn, channel_id).await?;
    txn.commit().await?;

    info!(
        channel_id,
        "Betting session resolved with {result:?}, {} winner(s)",
        payouts.len()
    );
    Ok(Resolution {
        session,
        bets,
        result,
        pot,
        payouts,
    })
}

/// Money returned to one bettor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    /// Bettor
    pub user_id: u64,
    /// Refunded stake
    pub amount: i64,
}

/// Outcome of a cancelled session.
#[derive(Debug, Clone)]
pub struct Cancellation {
    /// The session as it was before teardown
    pub session: Session,
    /// Refunds, in placement order
    pub refunds: Vec<Refund>,
}

/// Cancels a session, refunding every stake, and tears it down.
///
/// Refunds collide like payouts do in [`resolve_session`].
#[instrument(skip(ledger, db))]
pub async fn cancel_session<C>(
    ledger: &Ledger,
    db: &C,
    guild_id: u64,
    channel_id: u64,
) -> Result<Cancellation>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let session = require_session(&txn, channel_id).await?;
    let reason = format!("Refund of bet {}", session.title);

    let mut refunds = Vec::new();
    for placed in bets(&txn, channel_id).await? {
        let user_id = from_db_id(placed.user_id);
        ledger
            .deposit(&txn, AccountKey::new(guild_id, user_id), placed.amount, &reason)
            .await?;
        refunds.push(Refund {
            user_id,
            amount: placed.amount,
        });
    }

    teardown(&txn, channel_id).await?;
    txn.commit().await?;

    info!(channel_id, "Betting session cancelled, {} refund(s)", refunds.len());
    Ok(Cancellation { session, refunds })
}

async fn teardown<C: ConnectionTrait>(db: &C, channel_id: u64) -> Result<()> {
    Bet::delete_many()
        .filter(bet::Column::ChannelId.eq(to_db_id(channel_id)))
        .exec(db)
        .await?;
    Betting::delete_by_id(to_db_id(channel_id)).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    const CHANNEL: u64 = 900;

    fn new_session(choices: &str) -> NewSession<'_> {
        NewSession {
            channel_id: CHANNEL,
            title: "Final",
            choices,
            minimal_bet: 1,
            author_id: 1,
        }
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!(parse_choices("Heads, Tails").unwrap(), vec!["heads", "tails"]);
        assert_eq!(
            parse_choices(" a | b ;c,, d ").unwrap(),
            vec!["a", "b", "c", "d"]
        );
        assert_eq!(parse_choices("Yes,yes,No").unwrap(), vec!["yes", "no"]);
        assert!(matches!(
            parse_choices("only"),
            Err(Error::InvalidChoiceCount { count: 1 })
        ));
        assert!(matches!(
            parse_choices("a,b,c,d,e"),
            Err(Error::InvalidChoiceCount { count: 5 })
        ));
        assert!(matches!(
            parse_choices("same, SAME"),
            Err(Error::InvalidChoiceCount { count: 1 })
        ));
    }

    #[test]
    fn test_payout_is_whole_pot() {
        assert_eq!(payout(30, 100), 100);
        assert_eq!(payout(70, 100), 100);
        assert_eq!(payout(i64::MAX, i64::MAX), i64::MAX);
        assert_eq!(payout(0, 100), 0);
    }

    #[tokio::test]
    async fn test_open_session_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let long_title = "t".repeat(MAX_TITLE_LEN + 1);
        let result = open_session(
            &db,
            NewSession {
                title: &long_title,
                ..new_session("a,b")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::TitleTooLong { max: 100 })));

        let result = open_session(
            &db,
            NewSession {
                minimal_bet: 0,
                ..new_session("a,b")
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        let session = open_session(&db, new_session("Red | Blue")).await?;
        assert_eq!(session.choices, vec!["red", "blue"]);
        assert!(session.message_id.is_none());

        let result = open_session(&db, new_session("x,y")).await;
        assert!(matches!(
            result,
            Err(Error::SessionAlreadyOpen { channel_id: CHANNEL })
        ));

        attach_display_message(&db, CHANNEL, 12345).await?;
        let stored = require_session(&db, CHANNEL).await?;
        assert_eq!(stored.message_id, Some(12345));
        assert_eq!(list_sessions(&db).await?, vec![stored]);
        Ok(())
    }

    #[tokio::test]
    async fn test_bet_validation_order() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();

        let result = place_bet(&ledger, &db, key(2), CHANNEL, "heads", 10).await;
        assert!(matches!(result, Err(Error::NoOpenSession { .. })));

        open_session(
            &db,
            NewSession {
                minimal_bet: 5,
                ..new_session("heads,tails")
            },
        )
        .await?;

        let result = place_bet(&ledger, &db, key(2), CHANNEL, "edge", 10).await;
        assert!(matches!(result, Err(Error::InvalidChoice { .. })));

        let result = place_bet(&ledger, &db, key(2), CHANNEL, "heads", 4).await;
        assert!(matches!(
            result,
            Err(Error::StakeBelowMinimum {
                amount: 4,
                minimum: 5
            })
        ));

        let result = place_bet(&ledger, &db, key(2), CHANNEL, "heads", 101).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        let placed = place_bet(&ledger, &db, key(2), CHANNEL, " Heads ", 10).await?;
        assert_eq!(placed.choice, "heads");
        assert!(!placed.top_up);
        assert_eq!(placed.transaction.reason, "Bet on Final");
        clock.advance(Duration::seconds(1));

        let result = place_bet(&ledger, &db, key(2), CHANNEL, "tails", 10).await;
        assert!(matches!(
            result,
            Err(Error::ChoiceLocked { ref current }) if current == "heads"
        ));

        assert_eq!(account::balance(&db, key(2)).await?, 90);
        Ok(())
    }

    #[tokio::test]
    async fn test_top_up_same_choice() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("heads,tails")).await?;

        place_bet(&ledger, &db, key(2), CHANNEL, "heads", 10).await?;
        clock.advance(Duration::seconds(1));

        let (_, _, plan) = plan_bet(&db, key(2), CHANNEL, "heads", 15).await?;
        assert_eq!(plan, BetPlan::TopUp { current: 10 });

        let placed = place_bet(&ledger, &db, key(2), CHANNEL, "heads", 15).await?;
        assert!(placed.top_up);
        assert_eq!(placed.total, 25);

        let stakes = bets(&db, CHANNEL).await?;
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].amount, 25);
        assert_eq!(account::balance(&db, key(2)).await?, 75);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_pays_whole_pot() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("heads,tails")).await?;

        place_bet(&ledger, &db, key(10), CHANNEL, "heads", 30).await?;
        place_bet(&ledger, &db, key(11), CHANNEL, "tails", 70).await?;
        clock.advance(Duration::seconds(1));

        let resolution = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "Heads").await?;
        assert_eq!(resolution.pot, 100);
        assert_eq!(
            resolution.payouts,
            vec![Payout {
                user_id: 10,
                stake: 30,
                amount: 100
            }]
        );

        assert_eq!(account::balance(&db, key(10)).await?, 170);
        assert_eq!(account::balance(&db, key(11)).await?, 30);
        assert!(get_session(&db, CHANNEL).await?.is_none());
        assert!(bets(&db, CHANNEL).await?.is_empty());

        let latest = account::transactions(&db, key(10), Some(1)).await?;
        assert_eq!(latest[0].reason, "Winnings from bet Final");
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_multiple_winners_sorted_by_stake() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("a,b")).await?;

        place_bet(&ledger, &db, key(1), CHANNEL, "a", 10).await?;
        place_bet(&ledger, &db, key(2), CHANNEL, "a", 40).await?;
        place_bet(&ledger, &db, key(3), CHANNEL, "b", 50).await?;
        clock.advance(Duration::seconds(1));

        let resolution = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "a").await?;
        let winners: Vec<(u64, i64)> = resolution
            .payouts
            .iter()
            .map(|p| (p.user_id, p.amount))
            .collect();
        assert_eq!(winners, vec![(2, 100), (1, 100)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_without_winners() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("a,b,c")).await?;
        place_bet(&ledger, &db, key(1), CHANNEL, "a", 10).await?;
        clock.advance(Duration::seconds(1));

        let resolution = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "c").await?;
        assert!(resolution.payouts.is_empty());
        assert_eq!(resolution.pot, 10);
        assert_eq!(account::balance(&db, key(1)).await?, 90);
        assert!(get_session(&db, CHANNEL).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_payout_colliding_with_stake_rolls_back_until_next_second() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("a,b")).await?;
        place_bet(&ledger, &db, key(1), CHANNEL, "a", 10).await?;

        // The payout equals the stake, so its ID matches the withdrawal of this second
        let result = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "a").await;
        assert!(matches!(result, Err(Error::TransactionIdCollision { .. })));
        assert_eq!(account::balance(&db, key(1)).await?, 90);
        assert!(get_session(&db, CHANNEL).await?.is_some());
        assert_eq!(bets(&db, CHANNEL).await?.len(), 1);

        clock.advance(Duration::seconds(1));
        let resolution = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "a").await?;
        assert_eq!(resolution.payouts.len(), 1);
        assert_eq!(account::balance(&db, key(1)).await?, 100);
        assert!(get_session(&db, CHANNEL).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_refund_in_same_second_as_stake_rolls_back() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("a,b")).await?;
        place_bet(&ledger, &db, key(1), CHANNEL, "b", 25).await?;

        let result = cancel_session(&ledger, &db, TEST_GUILD, CHANNEL).await;
        assert!(matches!(result, Err(Error::TransactionIdCollision { .. })));
        assert_eq!(account::balance(&db, key(1)).await?, 75);
        assert!(get_session(&db, CHANNEL).await?.is_some());

        clock.advance(Duration::seconds(1));
        cancel_session(&ledger, &db, TEST_GUILD, CHANNEL).await?;
        assert_eq!(account::balance(&db, key(1)).await?, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_rejects_unknown_result() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        open_session(&db, new_session("a,b")).await?;

        let result = resolve_session(&ledger, &db, TEST_GUILD, CHANNEL, "z").await;
        assert!(matches!(result, Err(Error::InvalidChoice { .. })));
        assert!(get_session(&db, CHANNEL).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_refunds_exact_stakes() -> Result<()> {
        let db = setup_test_db().await?;
        let (ledger, clock) = test_ledger_with_clock();
        open_session(&db, new_session("a,b")).await?;
        place_bet(&ledger, &db, key(1), CHANNEL, "a", 25).await?;
        place_bet(&ledger, &db, key(2), CHANNEL, "b", 60).await?;
        clock.advance(Duration::seconds(1));

        let cancellation = cancel_session(&ledger, &db, TEST_GUILD, CHANNEL).await?;
        assert_eq!(
            cancellation.refunds,
            vec![
                Refund {
                    user_id: 1,
                    amount: 25
                },
                Refund {
                    user_id: 2,
                    amount: 60
                }
            ]
        );
        assert_eq!(account::balance(&db, key(1)).await?, 100);
        assert_eq!(account::balance(&db, key(2)).await?, 100);
        assert!(get_session(&db, CHANNEL).await?.is_none());
        assert!(bets(&db, CHANNEL).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_without_bets_tears_down() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        open_session(&db, new_session("a,b")).await?;

        let cancellation = cancel_session(&ledger, &db, TEST_GUILD, CHANNEL).await?;
        assert!(cancellation.refunds.is_empty());
        assert!(get_session(&db, CHANNEL).await?.is_none());

        let result = cancel_session(&ledger, &db, TEST_GUILD, CHANNEL).await;
        assert!(matches!(result, Err(Error::NoOpenSession { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_render_board() -> Result<()> {
        let db = setup_test_db().await?;
        let ledger = test_ledger();
        let session = open_session(&db, new_session("heads,tails")).await?;

        let empty = render_board(&session, &[], "✦", None);
        assert_eq!(empty, "```diff\nHeads  0✦\nTails  0✦\n```");

        place_bet(&ledger, &db, key(1), CHANNEL, "heads", 30).await?;
        place_bet(&ledger, &db, key(2), CHANNEL, "tails", 70).await?;
        let placed = bets(&db, CHANNEL).await?;

        let tallies = tally(&session, &placed);
        assert_eq!(tallies[0].total, 30);
        assert_eq!(tallies[1].total, 70);

        let board = render_board(&session, &placed, "✦", None);
        assert!(board.contains("Heads  30✦  ███ 30%"));
        assert!(board.contains("Tails  70✦  ███████ 70%"));

        let closed = render_board(&session, &placed, "✦", Some("heads"));
        assert!(closed.contains("+Heads"));
        assert!(closed.contains("-Tails"));
        Ok(())
    }
}
