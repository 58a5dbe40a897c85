//! Units of measure for lot weights.
//!
//! Two families (mass, volume), each with a small and a large unit at a fixed
//! 1000:1 ratio. Aggregation always happens in the small unit.

use core::fmt;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use binstock_core::{DomainError, DomainResult};

/// Small units per large unit, for both families.
pub const SMALL_PER_LARGE: u32 = 1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureFamily {
    Mass,
    Volume,
}

impl MeasureFamily {
    pub fn small_unit(self) -> UnitOfMeasure {
        match self {
            MeasureFamily::Mass => UnitOfMeasure::Gram,
            MeasureFamily::Volume => UnitOfMeasure::Milliliter,
        }
    }

    pub fn large_unit(self) -> UnitOfMeasure {
        match self {
            MeasureFamily::Mass => UnitOfMeasure::Kilogram,
            MeasureFamily::Volume => UnitOfMeasure::Liter,
        }
    }
}

impl fmt::Display for MeasureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureFamily::Mass => f.write_str("mass"),
            MeasureFamily::Volume => f.write_str("volume"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    Gram,
    Kilogram,
    Milliliter,
    Liter,
}

impl UnitOfMeasure {
    pub fn family(self) -> MeasureFamily {
        match self {
            UnitOfMeasure::Gram | UnitOfMeasure::Kilogram => MeasureFamily::Mass,
            UnitOfMeasure::Milliliter | UnitOfMeasure::Liter => MeasureFamily::Volume,
        }
    }

    pub fn is_large(self) -> bool {
        matches!(self, UnitOfMeasure::Kilogram | UnitOfMeasure::Liter)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnitOfMeasure::Gram => "g",
            UnitOfMeasure::Kilogram => "kg",
            UnitOfMeasure::Milliliter => "mL",
            UnitOfMeasure::Liter => "L",
        }
    }

    /// Convert a value expressed in this unit into the family's small unit.
    pub fn to_small(self, value: Decimal) -> DomainResult<Decimal> {
        if !self.is_large() {
            return Ok(value);
        }
        value
            .checked_mul(Decimal::from(SMALL_PER_LARGE))
            .ok_or_else(|| DomainError::validation(format!("{value}{self} is too large to convert")))
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for UnitOfMeasure {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(UnitOfMeasure::Gram),
            "kg" | "kilogram" | "kilograms" => Ok(UnitOfMeasure::Kilogram),
            "ml" | "milliliter" | "milliliters" => Ok(UnitOfMeasure::Milliliter),
            "l" | "liter" | "liters" => Ok(UnitOfMeasure::Liter),
            other => Err(DomainError::validation(format!("unknown unit of measure: {other:?}"))),
        }
    }
}

/// Render a total expressed in the family's small unit.
///
/// At or above 1000 small units the value is shown in the large unit with at
/// most two decimals (`1.5kg`, `1L`); below that it is a whole number of
/// small units (`999g`).
pub fn format_weight(family: MeasureFamily, small_total: Decimal) -> String {
    let per_large = Decimal::from(SMALL_PER_LARGE);
    if small_total >= per_large {
        let large = (small_total / per_large)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .normalize();
        format!("{large}{}", family.large_unit().symbol())
    } else {
        let small = small_total
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .normalize();
        format!("{small}{}", family.small_unit().symbol())
    }
}
