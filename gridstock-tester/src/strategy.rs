use std::fmt;

use clap::ValueEnum;
use gridstock_game::ComputerPolicy;

/// Built-in computer temperaments for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Strategy {
    Balanced,
    Cautious,
    Aggressive,
    /// Buys everything it can but never builds.
    Hoarder,
}

impl Strategy {
    pub const ALL: [Self; 4] = [
        Self::Balanced,
        Self::Cautious,
        Self::Aggressive,
        Self::Hoarder,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Balanced => "Balanced",
            Self::Cautious => "Cautious",
            Self::Aggressive => "Aggressive",
            Self::Hoarder => "Hoarder",
        }
    }

    #[must_use]
    pub fn policy(self) -> ComputerPolicy {
        let base = ComputerPolicy::default();
        match self {
            Self::Balanced => base,
            Self::Cautious => ComputerPolicy {
                buy_cash_ratio: 2.0,
                bid_cash_fraction: 0.5,
                bid_price_multiple: 1.0,
                bail_reserve: 400,
                build_reserve: Some(600),
                ..base
            },
            Self::Aggressive => ComputerPolicy {
                buy_cash_ratio: 1.0,
                bid_cash_fraction: 0.95,
                bid_price_multiple: 2.0,
                bail_reserve: 50,
                build_reserve: Some(100),
                ..base
            },
            Self::Hoarder => ComputerPolicy {
                buy_cash_ratio: 1.05,
                build_reserve: None,
                ..base
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
