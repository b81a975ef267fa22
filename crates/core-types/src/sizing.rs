use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Satoshis per bitcoin; the exchange counts margin in XBt.
pub const SATOSHIS_PER_BTC: i64 = 100_000_000;

/// How one contract of an instrument is valued in bitcoin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Bitcoin per contract for inverse instruments; bitcoin per contract
    /// per unit of price for linear ones.
    pub value: Decimal,
    /// Inverse instruments are quoted in currency per bitcoin.
    pub inverse: bool,
    /// Smallest order size increment.
    pub lot_size: Decimal,
}

impl ContractSpec {
    /// Builds the spec from the exchange's signed satoshi `multiplier`.
    pub fn from_multiplier(multiplier: i64, inverse: bool, lot_size: Decimal) -> Self {
        Self {
            value: Decimal::new(multiplier, 8).abs(),
            inverse,
            lot_size,
        }
    }

    /// Bitcoin of margin one contract ties up at `price`.
    pub fn margin_per_contract(&self, price: Decimal) -> Option<Decimal> {
        if self.inverse {
            self.value.checked_div(price)
        } else {
            price.checked_mul(self.value)
        }
    }
}

/// Rounds `quantity` to the nearest multiple of `tick`. Halves go to the
/// even multiple.
pub fn tick_round(quantity: Decimal, tick: Decimal) -> Option<Decimal> {
    if tick <= Decimal::ZERO {
        return Some(quantity.round());
    }
    quantity.checked_div(tick)?.round().checked_mul(tick)
}

/// Converts bitcoin to whole satoshis, or `None` if it does not fit.
pub fn satoshis(btc: Decimal) -> Option<i64> {
    btc.checked_mul(Decimal::from(SATOSHIS_PER_BTC))?
        .round()
        .to_i64()
}
