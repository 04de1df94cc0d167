//! Backtested performance reference tables, served verbatim over the API.

use serde::Serialize;

use super::error::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct PutSellingRow {
    pub delta: u32,
    pub ann_return: f64,
    pub sharpe: f64,
    pub std_dev: f64,
    pub win_rate: f64,
    pub avg_premium: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverwritingRow {
    pub fcf_quintile: &'static str,
    pub ann_return: f64,
    pub sharpe: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HedgingRow {
    pub strategy: &'static str,
    pub ann_return: f64,
    pub vol: f64,
    pub sharpe: f64,
    pub max_dd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorSensitivityRow {
    pub sector: &'static str,
    pub activity: f64,
    pub credit: f64,
    pub employment: f64,
    pub housing: f64,
    pub oil: f64,
    pub policy: f64,
    pub prices: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalVolRow {
    pub index: &'static str,
    pub iv_1m: f64,
    pub pctile_1m_5y: f64,
    pub iv_3m: f64,
    pub pctile_3m_5y: f64,
    pub variance_basis_1m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZeroDtePremiumRow {
    pub day: &'static str,
    pub ndx_premium: &'static str,
    pub gamma_imbalance: &'static str,
    pub bias: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolRiskPremiumRow {
    pub tenor: &'static str,
    pub atm: i32,
    pub otm_25d: i32,
    pub otm_10d: i32,
    pub otm_5d: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailTradingRow {
    pub configuration: &'static str,
    pub ann_return: f64,
    pub vol: Option<f64>,
    pub sharpe: Option<f64>,
    pub max_dd: Option<f64>,
}

/// A reference table, typed per table but uniform on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReferenceTable {
    PutSelling(&'static [PutSellingRow]),
    Overwriting(&'static [OverwritingRow]),
    Hedging(&'static [HedgingRow]),
    SectorSensitivity(&'static [SectorSensitivityRow]),
    GlobalVol(&'static [GlobalVolRow]),
    ZeroDtePremium(&'static [ZeroDtePremiumRow]),
    VolRiskPremium(&'static [VolRiskPremiumRow]),
    TailTrading(&'static [TailTradingRow]),
}

// Put selling performance by delta (10-year study)
static PUT_SELLING: &[PutSellingRow] = &[
    PutSellingRow { delta: 70, ann_return: 7.1, sharpe: 0.50, std_dev: 17.0, win_rate: 0.68, avg_premium: 0.24 },
    PutSellingRow { delta: 60, ann_return: 6.9, sharpe: 0.51, std_dev: 16.0, win_rate: 0.56, avg_premium: 0.19 },
    PutSellingRow { delta: 50, ann_return: 6.3, sharpe: 0.50, std_dev: 14.5, win_rate: 0.44, avg_premium: 0.14 },
    PutSellingRow { delta: 40, ann_return: 5.6, sharpe: 0.50, std_dev: 12.6, win_rate: 0.32, avg_premium: 0.10 },
    PutSellingRow { delta: 30, ann_return: 4.8, sharpe: 0.50, std_dev: 10.1, win_rate: 0.23, avg_premium: 0.07 },
    PutSellingRow { delta: 20, ann_return: 3.8, sharpe: 0.54, std_dev: 7.6, win_rate: 0.15, avg_premium: 0.04 },
];

// Overwriting performance by FCF yield quintile (16-year study)
static OVERWRITING: &[OverwritingRow] = &[
    OverwritingRow { fcf_quintile: "Q1 (Low)", ann_return: 2.6, sharpe: 0.27, std_dev: 13.0 },
    OverwritingRow { fcf_quintile: "Q2", ann_return: 6.1, sharpe: 0.62, std_dev: 11.0 },
    OverwritingRow { fcf_quintile: "Q3", ann_return: 7.9, sharpe: 0.92, std_dev: 9.0 },
    OverwritingRow { fcf_quintile: "Q4", ann_return: 7.9, sharpe: 0.91, std_dev: 9.0 },
    OverwritingRow { fcf_quintile: "Q5 (High)", ann_return: 8.8, sharpe: 0.90, std_dev: 10.0 },
];

// Hedging strategy comparison (27-year backtest)
static HEDGING: &[HedgingRow] = &[
    HedgingRow { strategy: "S&P 500 (unhedged)", ann_return: 9.2, vol: 18.2, sharpe: 0.51, max_dd: -38.0 },
    HedgingRow { strategy: "Put Spread Collar 3m/3m", ann_return: 7.6, vol: 8.8, sharpe: 0.88, max_dd: -14.0 },
    HedgingRow { strategy: "Long Put (monthly roll)", ann_return: 6.0, vol: 10.8, sharpe: 0.56, max_dd: -13.0 },
    HedgingRow { strategy: "Put Spread", ann_return: 7.5, vol: 13.5, sharpe: 0.56, max_dd: -17.0 },
    HedgingRow { strategy: "Covered Call (10% OTM)", ann_return: 10.7, vol: 14.0, sharpe: 0.76, max_dd: -25.0 },
    HedgingRow { strategy: "Put Selling (10% OTM)", ann_return: 5.5, vol: 7.0, sharpe: 0.76, max_dd: -22.0 },
];

// Macro event sensitivity by sector (15-year study)
static SECTOR_SENSITIVITY: &[SectorSensitivityRow] = &[
    SectorSensitivityRow { sector: "Energy", activity: 0.1, credit: 0.2, employment: 0.1, housing: 0.1, oil: 0.8, policy: 0.1, prices: 0.4 },
    SectorSensitivityRow { sector: "Real Estate", activity: 0.1, credit: 0.4, employment: 0.3, housing: 0.8, oil: 0.1, policy: 0.3, prices: 0.1 },
    SectorSensitivityRow { sector: "Financials", activity: 0.1, credit: 0.5, employment: 0.1, housing: 0.4, oil: 0.1, policy: 0.4, prices: 0.3 },
    SectorSensitivityRow { sector: "Tech", activity: 0.1, credit: 0.1, employment: 0.2, housing: 0.1, oil: 0.1, policy: 0.2, prices: 0.2 },
    SectorSensitivityRow { sector: "Healthcare", activity: 0.1, credit: 0.1, employment: 0.1, housing: 0.1, oil: 0.1, policy: 0.2, prices: 0.1 },
];

// Global vol levels and percentiles
static GLOBAL_VOL: &[GlobalVolRow] = &[
    GlobalVolRow { index: "SPX", iv_1m: 21.2, pctile_1m_5y: 15.5, iv_3m: 22.5, pctile_3m_5y: 18.2, variance_basis_1m: -3.3 },
    GlobalVolRow { index: "NDX", iv_1m: 19.0, pctile_1m_5y: 12.5, iv_3m: 21.0, pctile_3m_5y: 10.5, variance_basis_1m: 7.7 },
    GlobalVolRow { index: "DAX", iv_1m: 15.2, pctile_1m_5y: 23.4, iv_3m: 15.9, pctile_3m_5y: 24.1, variance_basis_1m: -6.3 },
    GlobalVolRow { index: "HSCEI", iv_1m: 22.1, pctile_1m_5y: 15.2, iv_3m: 22.4, pctile_3m_5y: 24.3, variance_basis_1m: 0.0 },
];

// 0DTE day-of-week vol premium
static ZERO_DTE_PREMIUM: &[ZeroDtePremiumRow] = &[
    ZeroDtePremiumRow { day: "Monday", ndx_premium: "3.2-4.5%", gamma_imbalance: "-175 to -125bps", bias: "SELL" },
    ZeroDtePremiumRow { day: "Tuesday", ndx_premium: "3.2-4.5%", gamma_imbalance: "-125 to -100bps", bias: "SELL" },
    ZeroDtePremiumRow { day: "Wednesday", ndx_premium: "2.2-2.5%", gamma_imbalance: "-50bps", bias: "AVOID/BUY" },
    ZeroDtePremiumRow { day: "Thursday", ndx_premium: "2.2-2.5%", gamma_imbalance: "-75bps", bias: "SELECTIVE" },
    ZeroDtePremiumRow { day: "Friday", ndx_premium: "3.0-3.5%", gamma_imbalance: "-150bps", bias: "SELL" },
];

// Vol risk premium matrix by tenor
static VOL_RISK_PREMIUM: &[VolRiskPremiumRow] = &[
    VolRiskPremiumRow { tenor: "2Y", atm: 42, otm_25d: 25, otm_10d: 12, otm_5d: 3 },
    VolRiskPremiumRow { tenor: "5Y", atm: 16, otm_25d: 10, otm_10d: 5, otm_5d: 3 },
    VolRiskPremiumRow { tenor: "10Y", atm: 7, otm_25d: 3, otm_10d: -1, otm_5d: -3 },
    VolRiskPremiumRow { tenor: "20Y", atm: 2, otm_25d: -3, otm_10d: -8, otm_5d: -12 },
];

// Three-pillar tail trading performance
static TAIL_TRADING: &[TailTradingRow] = &[
    TailTradingRow { configuration: "SPX only", ann_return: 12.5, vol: Some(18.2), sharpe: Some(0.69), max_dd: Some(-31.0) },
    TailTradingRow { configuration: "SPX + Put Spread", ann_return: 10.2, vol: Some(14.8), sharpe: Some(0.69), max_dd: Some(-12.0) },
    TailTradingRow { configuration: "SPX + Tail + Put Spread", ann_return: 17.1, vol: Some(15.4), sharpe: Some(1.11), max_dd: Some(-17.6) },
    TailTradingRow { configuration: "2025 YTD: PS only", ann_return: 0.8, vol: None, sharpe: None, max_dd: None },
    TailTradingRow { configuration: "2025 YTD: PS + Tail", ann_return: 7.6, vol: None, sharpe: None, max_dd: None },
];

const TABLE_NAMES: &[&str] = &[
    "put_selling",
    "overwriting",
    "hedging",
    "sector_sensitivity",
    "global_vol",
    "zero_dte_premium",
    "vol_risk_premium",
    "tail_trading",
];

pub struct ReferenceTables;

impl ReferenceTables {
    pub fn list_tables() -> Vec<String> {
        TABLE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    pub fn get_table(name: &str) -> Result<ReferenceTable, EngineError> {
        match name {
            "put_selling" => Ok(ReferenceTable::PutSelling(PUT_SELLING)),
            "overwriting" => Ok(ReferenceTable::Overwriting(OVERWRITING)),
            "hedging" => Ok(ReferenceTable::Hedging(HEDGING)),
            "sector_sensitivity" => Ok(ReferenceTable::SectorSensitivity(SECTOR_SENSITIVITY)),
            "global_vol" => Ok(ReferenceTable::GlobalVol(GLOBAL_VOL)),
            "zero_dte_premium" => Ok(ReferenceTable::ZeroDtePremium(ZERO_DTE_PREMIUM)),
            "vol_risk_premium" => Ok(ReferenceTable::VolRiskPremium(VOL_RISK_PREMIUM)),
            "tail_trading" => Ok(ReferenceTable::TailTrading(TAIL_TRADING)),
            other => Err(EngineError::unknown_name(
                "reference table",
                other,
                Self::list_tables(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_table_resolves() {
        for name in ReferenceTables::list_tables() {
            assert!(ReferenceTables::get_table(&name).is_ok(), "{name}");
        }
    }

    #[test]
    fn unknown_table_lists_all_alternatives() {
        let err = ReferenceTables::get_table("momentum").unwrap_err();
        match err {
            EngineError::UnknownName { available, .. } => {
                assert_eq!(available, ReferenceTables::list_tables());
            }
            other => panic!("expected UnknownName, got {other:?}"),
        }
    }

    #[test]
    fn put_selling_rows_serialize_flat() {
        let table = ReferenceTables::get_table("put_selling").unwrap();
        let value = serde_json::to_value(&table).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["delta"], 70);
        assert_eq!(rows[0]["win_rate"], 0.68);
    }

    #[test]
    fn tail_trading_ytd_rows_omit_missing_stats() {
        let table = ReferenceTables::get_table("tail_trading").unwrap();
        let value = serde_json::to_value(&table).unwrap();
        assert!(value.as_array().unwrap()[3]["sharpe"].is_null());
    }
}
