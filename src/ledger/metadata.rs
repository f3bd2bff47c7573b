use tracing::warn;

use crate::traits::AssetContract;
use crate::types::{Address, AssetMetadata};

pub const DEFAULT_DECIMALS: u8 = 18;

/// Best-effort read of an asset's symbol and decimals.
///
/// Unlike required reads, failures here never propagate: the caller's
/// `fallback_symbol` and `DEFAULT_DECIMALS` are substituted instead.
pub async fn fetch_metadata<A>(ledger: &A, asset: &Address, fallback_symbol: &str) -> AssetMetadata
where
    A: AssetContract + ?Sized,
{
    let symbol = match ledger.symbol(asset).await {
        Ok(symbol) if !symbol.is_empty() => symbol,
        Ok(_) => fallback_symbol.to_string(),
        Err(e) => {
            warn!("symbol() of {} unavailable, using \"{}\": {}", asset, fallback_symbol, e);
            fallback_symbol.to_string()
        }
    };

    let decimals = match ledger.decimals(asset).await {
        Ok(decimals) => decimals,
        Err(e) => {
            warn!("decimals() of {} unavailable, using {}: {}", asset, DEFAULT_DECIMALS, e);
            DEFAULT_DECIMALS
        }
    };

    AssetMetadata { symbol, decimals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;

    #[tokio::test]
    async fn falls_back_when_symbol_is_missing() {
        let ledger = MockLedger::new(Address([9; 20]), 0);
        let usdc = Address([1; 20]);
        let sct = Address([2; 20]);
        ledger.set_symbol(usdc, "USDC");

        let known = fetch_metadata(&ledger, &usdc, "installment token").await;
        assert_eq!(known.symbol, "USDC");
        assert_eq!(known.decimals, 6);

        let unknown = fetch_metadata(&ledger, &sct, "protocol token").await;
        assert_eq!(unknown.symbol, "protocol token");
    }
}
