//! Event playbooks: FOMC, CPI, NFP, Earnings, and the 0DTE day-of-week book.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::regime::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookPhase {
    PreEvent,
    EventEve,
    PostEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookPhaseDetail {
    pub phase: PlaybookPhase,
    pub timing: &'static str,
    pub iv_behavior: &'static str,
    pub strategy: &'static str,
    pub sizing: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPlaybook {
    pub event_type: EventType,
    pub phases: Vec<PlaybookPhaseDetail>,
    pub notes: Vec<&'static str>,
    pub key_rules: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayOfWeek {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "monday" => Some(DayOfWeek::Monday),
            "tuesday" => Some(DayOfWeek::Tuesday),
            "wednesday" => Some(DayOfWeek::Wednesday),
            "thursday" => Some(DayOfWeek::Thursday),
            "friday" => Some(DayOfWeek::Friday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ZeroDteDayInfo {
    pub day: DayOfWeek,
    pub premium: &'static str,
    pub bias: &'static str,
    pub gamma_imbalance: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZeroDtePlaybook {
    pub theta: &'static str,
    pub gamma: &'static str,
    pub sizing: &'static str,
    pub ndx_vol_correlation: f64,
    pub days: Vec<ZeroDteDayInfo>,
    pub entry_rule: &'static str,
    pub event_block: &'static str,
}

pub struct EventPlaybooks;

impl EventPlaybooks {
    pub fn get(event_type: EventType) -> Result<EventPlaybook, EngineError> {
        match event_type {
            EventType::Fomc => Ok(Self::fomc()),
            EventType::Cpi => Ok(Self::cpi()),
            EventType::Nfp => Ok(Self::nfp()),
            EventType::Earnings => Ok(Self::earnings()),
            EventType::None => Err(EngineError::unknown_name(
                "playbook",
                "NONE",
                vec![
                    "FOMC".to_string(),
                    "CPI".to_string(),
                    "NFP".to_string(),
                    "EARNINGS".to_string(),
                ],
            )),
        }
    }

    pub fn parse_event_type(value: &str) -> Result<EventType, EngineError> {
        match value.to_ascii_uppercase().as_str() {
            "FOMC" => Ok(EventType::Fomc),
            "CPI" => Ok(EventType::Cpi),
            "NFP" => Ok(EventType::Nfp),
            "EARNINGS" => Ok(EventType::Earnings),
            other => Err(EngineError::unknown_name(
                "event type",
                other,
                vec![
                    "FOMC".to_string(),
                    "CPI".to_string(),
                    "NFP".to_string(),
                    "EARNINGS".to_string(),
                ],
            )),
        }
    }

    fn fomc() -> EventPlaybook {
        EventPlaybook {
            event_type: EventType::Fomc,
            phases: vec![
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PreEvent,
                    timing: "T-5 to T-3",
                    iv_behavior: "Front-end IV expansion begins",
                    strategy: "Buy calendar spreads (sell front-week, buy front+30 DTE)",
                    sizing: "Standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::EventEve,
                    timing: "T-1",
                    iv_behavior: "IV peaks. Premium richest.",
                    strategy: "Initiate short front-end vol (straddle sell or calendar) if comfortable",
                    sizing: "50% of standard (gap risk)",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PostEvent,
                    timing: "T+0 to T+1",
                    iv_behavior: "30-60% of front-end excess IV evaporates within 24hrs",
                    strategy: "Close calendars. If directional view, enter cheap debit spreads.",
                    sizing: "Standard (post-crush, vol cheap)",
                },
            ],
            notes: vec![
                "FOMC produces the largest implied moves of all macro events",
                "Multi-event weeks (FOMC + CPI): IV premium rises ~40% above baseline",
                "Fed rate decisions show the most persistent significance",
            ],
            key_rules: Vec::new(),
        }
    }

    fn earnings() -> EventPlaybook {
        EventPlaybook {
            event_type: EventType::Earnings,
            phases: vec![
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PreEvent,
                    timing: "T-5 to T-3",
                    iv_behavior: "20-40% above normal IV",
                    strategy: "VIX-conditional: <20 = calendars; 20-35 = iron condors at implied \
                               move; 35-45 = call buying; >45 = short strangles",
                    sizing: "Standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::EventEve,
                    timing: "T-1",
                    iv_behavior: "Peak IV expansion",
                    strategy: "Position per VIX-conditional matrix above; no adjustments day-of",
                    sizing: "50% if first earnings play",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PostEvent,
                    timing: "T+0 to T+1",
                    iv_behavior: "IV crush of 30-60%",
                    strategy: "Close all event-specific positions within 24 hours post-report",
                    sizing: "N/A - closing only",
                },
            ],
            notes: Vec::new(),
            key_rules: vec![
                "Avg S&P stock moves +/-4.3% on earnings (18yr avg)",
                "Options market prices +/-5.6% (systematically overestimates)",
                "Sticker shock: stocks >$100 have underpriced earnings moves",
                "Call buying profitable 15/15 years, +13% avg ROP",
                "Tech implied moves 1.5-2.0x realized",
                "Financials implied ~1.1-1.2x realized",
            ],
        }
    }

    fn cpi() -> EventPlaybook {
        EventPlaybook {
            event_type: EventType::Cpi,
            phases: vec![
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PreEvent,
                    timing: "T-3 to T-1",
                    iv_behavior: "Front-end IV expansion, less than FOMC",
                    strategy: "Calendar spreads or short front-end straddles",
                    sizing: "75% of standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::EventEve,
                    timing: "T-1",
                    iv_behavior: "IV peaks pre-release",
                    strategy: "Short front-end vol if IV expansion > 20% above normal",
                    sizing: "50% of standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PostEvent,
                    timing: "T+0",
                    iv_behavior: "Quick IV crush, often completes within hours",
                    strategy: "Close event trades. Directional entries if view formed.",
                    sizing: "Standard post-event",
                },
            ],
            notes: vec![
                "CPI second-most impactful after FOMC",
                "Multi-event weeks add ~40% IV premium",
            ],
            key_rules: Vec::new(),
        }
    }

    fn nfp() -> EventPlaybook {
        EventPlaybook {
            event_type: EventType::Nfp,
            phases: vec![
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PreEvent,
                    timing: "T-3 to T-1",
                    iv_behavior: "Moderate front-end IV expansion",
                    strategy: "Calendar spreads if IV premium > 15% above normal",
                    sizing: "75% of standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::EventEve,
                    timing: "T-1 (Thursday before)",
                    iv_behavior: "IV plateaus",
                    strategy: "Short front-end straddle if premium rich, or wait",
                    sizing: "50% of standard",
                },
                PlaybookPhaseDetail {
                    phase: PlaybookPhase::PostEvent,
                    timing: "T+0 (Friday)",
                    iv_behavior: "IV normalizes",
                    strategy: "Close event positions",
                    sizing: "Standard post-event",
                },
            ],
            notes: vec![
                "NFP less impactful than FOMC/CPI but still material",
                "Often coincides with Friday 0DTE elevated premium",
            ],
            key_rules: Vec::new(),
        }
    }

    pub fn zero_dte() -> ZeroDtePlaybook {
        ZeroDtePlaybook {
            theta: "100% decays in a single day",
            gamma: "Extreme - binary-like instruments",
            sizing: "0.1-0.25% of NAV per trade (max)",
            ndx_vol_correlation: 0.88,
            days: vec![
                ZeroDteDayInfo {
                    day: DayOfWeek::Monday,
                    premium: "HIGH (3.2-4.5%)",
                    bias: "SELL straddles at 10am",
                    gamma_imbalance: "-175 to -125bps",
                },
                ZeroDteDayInfo {
                    day: DayOfWeek::Tuesday,
                    premium: "HIGH",
                    bias: "SELL straddles at 10am",
                    gamma_imbalance: "-125 to -100bps",
                },
                ZeroDteDayInfo {
                    day: DayOfWeek::Wednesday,
                    premium: "LOW (2.2-2.5%)",
                    bias: "AVOID or buy premium",
                    gamma_imbalance: "-50bps",
                },
                ZeroDteDayInfo {
                    day: DayOfWeek::Thursday,
                    premium: "LOW",
                    bias: "Selective selling only",
                    gamma_imbalance: "-75bps",
                },
                ZeroDteDayInfo {
                    day: DayOfWeek::Friday,
                    premium: "ELEVATED",
                    bias: "SELL if no weekend event risk",
                    gamma_imbalance: "-150bps",
                },
            ],
            entry_rule: "Theta must exceed 2x expected intraday move",
            event_block: "No 0DTE on FOMC/CPI/NFP days",
        }
    }

    pub fn zero_dte_day(day: &str) -> Result<ZeroDteDayInfo, EngineError> {
        let parsed = DayOfWeek::parse(day).ok_or_else(|| {
            EngineError::unknown_name(
                "0DTE day",
                day,
                ["monday", "tuesday", "wednesday", "thursday", "friday"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
        })?;
        Ok(Self::zero_dte()
            .days
            .into_iter()
            .find(|d| d.day == parsed)
            .expect("every weekday has a 0DTE record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tracked_event_has_a_playbook() {
        for event in [
            EventType::Fomc,
            EventType::Cpi,
            EventType::Nfp,
            EventType::Earnings,
        ] {
            let playbook = EventPlaybooks::get(event).unwrap();
            assert_eq!(playbook.event_type, event);
            assert_eq!(playbook.phases.len(), 3);
        }
    }

    #[test]
    fn none_event_has_no_playbook() {
        assert!(EventPlaybooks::get(EventType::None).is_err());
    }

    #[test]
    fn parse_event_type_is_case_insensitive() {
        assert_eq!(EventPlaybooks::parse_event_type("fomc").unwrap(), EventType::Fomc);
        assert_eq!(EventPlaybooks::parse_event_type("CPI").unwrap(), EventType::Cpi);
        assert!(EventPlaybooks::parse_event_type("opex").is_err());
    }

    #[test]
    fn zero_dte_covers_the_trading_week() {
        let playbook = EventPlaybooks::zero_dte();
        assert_eq!(playbook.days.len(), 5);

        let monday = EventPlaybooks::zero_dte_day("Monday").unwrap();
        assert!(monday.bias.contains("SELL"));

        let wednesday = EventPlaybooks::zero_dte_day("wednesday").unwrap();
        assert!(wednesday.bias.contains("AVOID"));

        assert!(EventPlaybooks::zero_dte_day("saturday").is_err());
    }
}
