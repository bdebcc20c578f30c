use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of transaction categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Income")]
    Income,
    #[serde(rename = "Food & Dining")]
    FoodDining,
    #[serde(rename = "Transport & Mobility")]
    TransportMobility,
    #[serde(rename = "Bills & Utilities")]
    BillsUtilities,
    #[serde(rename = "Shopping & Entertainment")]
    ShoppingEntertainment,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    /// Every category, in fallback priority order (`Other` last).
    pub const ALL: [Category; 6] = [
        Category::Income,
        Category::FoodDining,
        Category::TransportMobility,
        Category::BillsUtilities,
        Category::ShoppingEntertainment,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Income => "Income",
            Category::FoodDining => "Food & Dining",
            Category::TransportMobility => "Transport & Mobility",
            Category::BillsUtilities => "Bills & Utilities",
            Category::ShoppingEntertainment => "Shopping & Entertainment",
            Category::Other => "Other",
        }
    }

    pub fn is_spending(self) -> bool {
        self != Category::Income
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown category: '{s}'"))
    }
}
