//! Message bodies for notification channels

use chrono::{DateTime, Local, Utc};
use signal_engine::CandidateSignal;

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn local_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Full signal card
pub fn detailed_signal(signal: &CandidateSignal) -> String {
    let header = if signal.approved { "FILTER-APPROVED" } else { "LIVE" };
    let filter_line = match (&signal.filter_reason, signal.approved) {
        (Some(reason), true) => format!("\n🧠 Filter: {}", reason),
        _ => String::new(),
    };
    let indicators = &signal.technicals.indicators;
    let labels = &signal.technicals.labels;

    format!(
        "🚨 {header} TRADING SIGNAL 🚨\n\
         \n\
         📊 {name}\n\
         ⚡ Update Frequency: {frequency}\n\
         🎯 Direction: {direction}\n\
         💰 Entry: {entry}\n\
         🛡️ Stop Loss: {stop}\n\
         🎯 Take Profit: {take}\n\
         📈 Risk/Reward: {rr}\n\
         ⚡ Confidence: {confidence}%\n\
         \n\
         📋 Technical Analysis:\n\
         • RSI: {rsi:.1}\n\
         • Volatility: {vol:.2}%\n\
         • Trend: {trend}\n\
         • Momentum: {momentum}\n\
         \n\
         💡 Reason: {reason}{filter_line}\n\
         📊 Spread: {spread:.4}\n\
         ⏰ Time: {time}\n\
         \n\
         🔴 LIVE {freq_upper} DATA - Risk: {risk}% max\n\
         \n\
         Execute manually on Deriv platform",
        name = signal.instrument_name,
        frequency = signal.frequency,
        direction = signal.direction,
        entry = signal.entry_price,
        stop = signal.stop_loss,
        take = signal.take_profit,
        rr = signal.risk_reward,
        confidence = signal.confidence,
        rsi = indicators.rsi,
        vol = indicators.volatility,
        trend = labels.trend.as_str(),
        momentum = labels.momentum.as_str(),
        reason = signal.reason,
        spread = signal.spread,
        time = local_time(signal.created_at),
        freq_upper = signal.frequency.to_uppercase(),
        risk = signal.risk_percent,
    )
}

/// Short signal card for SMS-style channels
pub fn concise_signal(signal: &CandidateSignal) -> String {
    let tag = if signal.approved { "[FILTER✓] " } else { "" };
    format!(
        "🚨 {tag}{direction} SIGNAL\n\
         \n\
         📊 {name}\n\
         💰 Entry: {entry}\n\
         🛡️ SL: {stop}\n\
         🎯 TP: {take}\n\
         ⚡ Confidence: {confidence}%\n\
         📈 R/R: {rr}\n\
         \n\
         💡 {reason}\n\
         ⏰ {time}\n\
         \n\
         Risk: {risk}% max",
        direction = signal.direction,
        name = signal.instrument_name,
        entry = signal.entry_price,
        stop = signal.stop_loss,
        take = signal.take_profit,
        confidence = signal.confidence,
        rr = signal.risk_reward,
        reason = signal.reason,
        time = local_time(signal.created_at),
        risk = signal.risk_percent,
    )
}

/// Connectivity check message
pub fn test_message(now: DateTime<Utc>) -> String {
    format!(
        "🤖 SIGNAL BOT TEST MESSAGE\n\
         \n\
         ✅ Bot connected to live Deriv data\n\
         📱 Notification channel working\n\
         \n\
         Time: {}",
        local_datetime(now)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

pub fn alert(title: &str, body: &str, priority: Priority, now: DateTime<Utc>) -> String {
    let emoji = match priority {
        Priority::High => "🚨",
        Priority::Normal => "ℹ️",
    };
    format!("{} {}\n\n{}\n\n⏰ {}", emoji, title, body, local_datetime(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use signal_engine::classifier::{Momentum, PriceAction, Trend, VolatilityRegime};
    use signal_engine::signal::Technicals;
    use signal_engine::{ClassificationLabels, Direction, IndicatorSnapshot};
    use uuid::Uuid;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn signal() -> CandidateSignal {
        CandidateSignal {
            id: Uuid::new_v4(),
            symbol: "1HZ75V".to_string(),
            instrument_name: "Volatility 75 (1s) Index".to_string(),
            frequency: "1s".to_string(),
            direction: Direction::Bullish,
            entry_price: Decimal::from(1000),
            stop_loss: Decimal::from(900),
            take_profit: Decimal::from(1250),
            confidence: 80,
            risk_reward: "1:2.5".to_string(),
            risk_percent: 2.2,
            technicals: Technicals {
                indicators: IndicatorSnapshot {
                    sma_fast: 1000.0,
                    sma_mid: 999.0,
                    sma_slow: 998.0,
                    rsi: 62.0,
                    volatility: 1.2,
                    price_change_pct: 0.2,
                },
                labels: ClassificationLabels {
                    trend: Trend::Bullish,
                    momentum: Momentum::Neutral,
                    volatility_regime: VolatilityRegime::Normal,
                    price_action: PriceAction::StrongMove,
                    strength: 80.0,
                },
            },
            reason: "Technical Confluence".to_string(),
            spread: 0.0,
            created_at: at(),
            approved: false,
            filter_reason: None,
            filter_confidence: None,
            adjusted: false,
            evaluated_at: None,
        }
    }

    #[test]
    fn test_detailed_signal() {
        let mut signal = signal();
        signal.approved = true;
        signal.filter_reason = Some("Signal passed all checks".to_string());

        let expected = [
            "🚨 FILTER-APPROVED TRADING SIGNAL 🚨",
            "",
            "📊 Volatility 75 (1s) Index",
            "⚡ Update Frequency: 1s",
            "🎯 Direction: BULLISH",
            "💰 Entry: 1000",
            "🛡️ Stop Loss: 900",
            "🎯 Take Profit: 1250",
            "📈 Risk/Reward: 1:2.5",
            "⚡ Confidence: 80%",
            "",
            "📋 Technical Analysis:",
            "• RSI: 62.0",
            "• Volatility: 1.20%",
            "• Trend: BULLISH",
            "• Momentum: NEUTRAL",
            "",
            "💡 Reason: Technical Confluence",
            "🧠 Filter: Signal passed all checks",
            "📊 Spread: 0.0000",
            &format!("⏰ Time: {}", local_time(at())),
            "",
            "🔴 LIVE 1S DATA - Risk: 2.2% max",
            "",
            "Execute manually on Deriv platform",
        ]
        .join("\n");
        assert_eq!(detailed_signal(&signal), expected);

        // Unfiltered signals carry the live header and no filter line
        signal.approved = false;
        let text = detailed_signal(&signal);
        assert!(text.starts_with("🚨 LIVE TRADING SIGNAL 🚨"));
        assert!(!text.contains("🧠 Filter"));
    }

    #[test]
    fn test_concise_signal() {
        let expected = [
            "🚨 BULLISH SIGNAL",
            "",
            "📊 Volatility 75 (1s) Index",
            "💰 Entry: 1000",
            "🛡️ SL: 900",
            "🎯 TP: 1250",
            "⚡ Confidence: 80%",
            "📈 R/R: 1:2.5",
            "",
            "💡 Technical Confluence",
            &format!("⏰ {}", local_time(at())),
            "",
            "Risk: 2.2% max",
        ]
        .join("\n");
        assert_eq!(concise_signal(&signal()), expected);

        let mut approved = signal();
        approved.approved = true;
        assert!(concise_signal(&approved).starts_with("🚨 [FILTER✓] BULLISH SIGNAL"));
    }

    #[test]
    fn test_alert() {
        assert_eq!(
            alert("Live feed lost", "Restart the bot.", Priority::High, at()),
            format!("🚨 Live feed lost\n\nRestart the bot.\n\n⏰ {}", local_datetime(at()))
        );
        assert!(alert("Live feed connected", "Streaming", Priority::Normal, at()).starts_with("ℹ️ Live feed connected"));
    }
}
