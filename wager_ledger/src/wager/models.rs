//! Wager data models.

use crate::{
    account::{AccountId, GamblerAccount},
    ledger::Transaction,
    vip::VipPerk,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Wager model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub account_id: AccountId,
    pub wager_amount: Decimal,
    /// Net effect on the balance; never re-includes the stake on a win
    pub wager_effect: Decimal,
    pub game: Game,
    pub multiplier: Decimal,
    pub game_meta: Option<serde_json::Value>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Wager {
    /// Short human-readable summary, e.g. `Won 200 on dice (3x)`
    pub fn outcome_description(&self) -> String {
        let game = self.game;
        let effect = self.wager_effect;

        if !self.is_complete {
            format!("Pending {} on {game}", self.wager_amount)
        } else if effect > Decimal::ZERO {
            format!("Won {effect} on {game} ({}x)", self.multiplier)
        } else if effect < Decimal::ZERO {
            format!("Lost {} on {game}", -effect)
        } else {
            format!("Push on {game}")
        }
    }
}

/// Supported games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    Blackjack,
    Coinflip,
    Dice,
    Limbo,
    Mines,
    Plinko,
    Roulette,
    Slots,
    Wheel,
    Keno,
    Sportsbook,
}

impl Game {
    pub fn as_str(&self) -> &'static str {
        match self {
            Game::Blackjack => "blackjack",
            Game::Coinflip => "coinflip",
            Game::Dice => "dice",
            Game::Limbo => "limbo",
            Game::Mines => "mines",
            Game::Plinko => "plinko",
            Game::Roulette => "roulette",
            Game::Slots => "slots",
            Game::Wheel => "wheel",
            Game::Keno => "keno",
            Game::Sportsbook => "sportsbook",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blackjack" => Ok(Game::Blackjack),
            "coinflip" => Ok(Game::Coinflip),
            "dice" => Ok(Game::Dice),
            "limbo" => Ok(Game::Limbo),
            "mines" => Ok(Game::Mines),
            "plinko" => Ok(Game::Plinko),
            "roulette" => Ok(Game::Roulette),
            "slots" => Ok(Game::Slots),
            "wheel" => Ok(Game::Wheel),
            "keno" => Ok(Game::Keno),
            "sportsbook" => Ok(Game::Sportsbook),
            other => Err(format!("unknown game '{other}'")),
        }
    }
}

/// Wager not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewWager {
    pub id: Uuid,
    pub wager_amount: Decimal,
    pub wager_effect: Decimal,
    pub game: Game,
    pub multiplier: Decimal,
    pub game_meta: Option<serde_json::Value>,
    pub is_complete: bool,
}

/// Wager placement against a known account
#[derive(Debug, Clone, PartialEq)]
pub struct WagerRequest {
    pub account_id: AccountId,
    pub wager: PlaceWager,
}

/// What the game layer decided about a bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceWager {
    pub amount: Decimal,
    /// Net effect of the outcome; ignored while the wager is incomplete
    pub outcome_effect: Decimal,
    pub game: Game,
    #[serde(default = "default_complete")]
    pub is_complete: bool,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

fn default_complete() -> bool {
    true
}

impl PlaceWager {
    /// A wager whose outcome is already known
    pub fn complete(amount: Decimal, outcome_effect: Decimal, game: Game) -> Self {
        Self {
            amount,
            outcome_effect,
            game,
            is_complete: true,
            meta: None,
        }
    }

    /// A wager whose outcome is pending (the stake is held)
    pub fn pending(amount: Decimal, game: Game) -> Self {
        Self {
            amount,
            outcome_effect: -amount,
            game,
            is_complete: false,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Committed wager with the rows it produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedWager {
    pub wager: Wager,
    pub transaction: Option<Transaction>,
    pub account: GamblerAccount,
    pub balance_after: Decimal,
    /// Bonuses granted by the post-commit VIP check
    pub vip_perks: Vec<VipPerk>,
}

/// Payout ratio of a wager.
///
/// `(amount + effect) / amount` for a completed winning wager, zero for
/// losses and pending wagers. Computed in exact decimal arithmetic at full
/// precision; `None` on overflow.
pub fn derive_multiplier(amount: Decimal, effect: Decimal, is_complete: bool) -> Option<Decimal> {
    if !(is_complete && amount > Decimal::ZERO && effect > Decimal::ZERO) {
        return Some(Decimal::ZERO);
    }

    let returned = amount.checked_add(effect)?;
    if returned <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }

    Some(returned.checked_div(amount)?.normalize())
}
