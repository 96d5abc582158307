//! Dice engine - throw expressions, rolling and saved throws.
//!
//! A throw expression is a `+`-separated list of terms. Each term is either `NdF`
//! (N classic dice with faces 1 to F) or `Nd(F1,F2,...)` (N dice with the listed
//! faces). An empty or zero N means one die.

use crate::{
    entities::{SavedThrow, saved_throw},
    errors::{Error, Result},
};
use rand::Rng;
use rand::seq::SliceRandom;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder, Set};
use std::fmt;
use std::str::FromStr;

/// Most dice a single throw may contain
pub const MAX_DICE: usize = 20;

/// A single die.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Die {
    /// Faces `1..=faces`
    Classic {
        /// Number of faces, at least 1
        faces: u32,
    },
    /// Arbitrary faces, at least one
    Custom {
        /// Face values in declaration order
        faces: Vec<u32>,
    },
}

impl Die {
    /// Die with the given faces, recognized as classic when they are exactly `1..=n`.
    #[must_use]
    pub fn from_faces(faces: Vec<u32>) -> Self {
        let is_classic = !faces.is_empty()
            && faces
                .iter()
                .zip(1u32..)
                .all(|(face, expected)| *face == expected);
        match u32::try_from(faces.len()) {
            Ok(n) if is_classic => Self::Classic { faces: n },
            _ => Self::Custom { faces },
        }
    }

    /// Rolls the die once.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            Self::Classic { faces } => rng.gen_range(1..=*faces),
            Self::Custom { faces } => faces.choose(rng).copied().unwrap_or_default(),
        }
    }

    fn storage(&self) -> String {
        match self {
            Self::Classic { faces } => (1..=*faces)
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("/"),
            Self::Custom { faces } => faces
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join("/"),
        }
    }
}

impl fmt::Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic { faces } => write!(f, "d{faces}"),
            Self::Custom { faces } => {
                let faces: Vec<String> = faces.iter().map(u32::to_string).collect();
                write!(f, "d({})", faces.join(","))
            }
        }
    }
}

/// A list of dice thrown together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceThrow {
    dice: Vec<Die>,
}

impl DiceThrow {
    /// The dice, in expression order.
    #[must_use]
    pub fn dice(&self) -> &[Die] {
        &self.dice
    }

    /// Rolls every die.
    pub fn roll_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u32> {
        self.dice.iter().map(|die| die.roll(rng)).collect()
    }

    /// Rolls every die and adds the results.
    pub fn roll_sum<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.roll_all(rng).into_iter().map(u64::from).sum()
    }

    /// Storage form: dice separated by `,`, faces by `/`.
    #[must_use]
    pub fn to_storage(&self) -> String {
        self.dice
            .iter()
            .map(Die::storage)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the storage form produced by [`DiceThrow::to_storage`].
    pub fn from_storage(stored: &str) -> Result<Self> {
        let invalid = || Error::InvalidThrow {
            term: stored.to_string(),
        };
        let dice = stored
            .split(',')
            .map(|die| {
                die.split('/')
                    .map(|face| face.parse::<u32>().map_err(|_| invalid()))
                    .collect::<Result<Vec<u32>>>()
                    .map(Die::from_faces)
            })
            .collect::<Result<Vec<Die>>>()?;
        Ok(Self { dice })
    }
}

impl fmt::Display for DiceThrow {
    /// Groups identical dice in order of first appearance, e.g. `2d6 + 1d(1,5,10)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups: Vec<(&Die, usize)> = Vec::new();
        for die in &self.dice {
            match groups.iter_mut().find(|(seen, _)| *seen == die) {
                Some((_, count)) => *count += 1,
                None => groups.push((die, 1)),
            }
        }
        let parts: Vec<String> = groups
            .iter()
            .map(|(die, count)| format!("{count}{die}"))
            .collect();
        f.write_str(&parts.join(" + "))
    }
}

impl FromStr for DiceThrow {
    type Err = Error;

    fn from_str(expression: &str) -> Result<Self> {
        let mut dice = Vec::new();
        for term in expression.split('+').map(str::trim) {
            let (count, die) = parse_term(term)?;
            let total = dice.len().saturating_add(count);
            if total > MAX_DICE {
                return Err(Error::TooManyDice {
                    count: total,
                    max: MAX_DICE,
                });
            }
            dice.extend(std::iter::repeat_n(die, count));
        }
        Ok(Self { dice })
    }
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_term(term: &str) -> Result<(usize, Die)> {
    let invalid = || Error::InvalidThrow {
        term: term.to_string(),
    };

    let (count, faces) = term.split_once('d').ok_or_else(invalid)?;
    let count = match count {
        "" => 1,
        digits if is_number(digits) => digits.parse::<usize>().unwrap_or(usize::MAX).max(1),
        _ => return Err(invalid()),
    };

    let die = if let Some(list) = faces.strip_prefix('(').and_then(|f| f.strip_suffix(')')) {
        let faces = list
            .split(',')
            .map(|face| {
                if is_number(face) {
                    face.parse::<u32>().map_err(|_| invalid())
                } else {
                    Err(invalid())
                }
            })
            .collect::<Result<Vec<u32>>>()?;
        Die::Custom { faces }
    } else if is_number(faces) {
        match faces.parse::<u32>() {
            Ok(n) if n >= 1 => Die::Classic { faces: n },
            _ => return Err(invalid()),
        }
    } else {
        return Err(invalid());
    };

    Ok((count, die))
}

/// Side of a flipped coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSide {
    /// Heads
    Heads,
    /// Tails
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Heads => "Heads",
            Self::Tails => "Tails",
        })
    }
}

/// Flips a fair coin.
pub fn flip<R: Rng + ?Sized>(rng: &mut R) -> CoinSide {
    if rng.gen_bool(0.5) {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Saves `throw` under `name`, replacing any throw with the same name.
pub async fn save_throw<C: ConnectionTrait>(db: &C, name: &str, throw: &DiceThrow) -> Result<()> {
    SavedThrow::insert(saved_throw::ActiveModel {
        name: Set(normalize_name(name)),
        throw: Set(throw.to_storage()),
    })
    .on_conflict(
        OnConflict::column(saved_throw::Column::Name)
            .update_column(saved_throw::Column::Throw)
            .to_owned(),
    )
    .exec(db)
    .await?;
    Ok(())
}

/// Loads the throw saved under `name`.
pub async fn load_throw<C: ConnectionTrait>(db: &C, name: &str) -> Result<DiceThrow> {
    let name = normalize_name(name);
    let row = SavedThrow::find_by_id(name.as_str())
        .one(db)
        .await?
        .ok_or(Error::ThrowNotFound { name })?;
    DiceThrow::from_storage(&row.throw)
}

/// Deletes the throw saved under `name`.
pub async fn delete_throw<C: ConnectionTrait>(db: &C, name: &str) -> Result<()> {
    let name = normalize_name(name);
    let result = SavedThrow::delete_by_id(name.as_str()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::ThrowNotFound { name });
    }
    Ok(())
}

/// All saved throws of the guild, by name.
pub async fn list_throws<C: ConnectionTrait>(db: &C) -> Result<Vec<(String, DiceThrow)>> {
    SavedThrow::find()
        .order_by_asc(saved_throw::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|row| Ok((row.name, DiceThrow::from_storage(&row.throw)?)))
        .collect()
}
