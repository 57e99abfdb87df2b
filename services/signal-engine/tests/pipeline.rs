//! End-to-end pipeline behaviour through a BotSession

use chrono::{DateTime, Duration, Utc, Weekday};
use rust_decimal::Decimal;
use signal_engine::{
    BotSession, ClockContext, Direction, MarketQuote, PriceSample, TickOutcome, Trend,
};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Uptrend with pullbacks: +1.5% then -0.8%, repeated
fn uptrend(len: usize) -> Vec<f64> {
    let mut prices = vec![100_000.0];
    for i in 0..len - 1 {
        let last = prices[i];
        prices.push(last * if i % 2 == 0 { 1.015 } else { 0.992 });
    }
    prices
}

fn downtrend(len: usize) -> Vec<f64> {
    let mut prices = vec![100_000.0];
    for i in 0..len - 1 {
        let last = prices[i];
        prices.push(last * if i % 2 == 0 { 0.985 } else { 1.008 });
    }
    prices
}

fn feed(session: &mut BotSession, prices: &[f64], start: DateTime<Utc>, hour: u32, weekday: Weekday) -> Vec<TickOutcome> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| {
            let at = start + Duration::seconds(i as i64);
            let clock = ClockContext::at(at, hour, weekday);
            let sample = PriceSample::new(price, at).unwrap();
            session.on_tick(sample, MarketQuote::new(price), &clock).unwrap()
        })
        .collect()
}

fn decisions(outcomes: &[TickOutcome]) -> Vec<&signal_engine::Decision> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            TickOutcome::Evaluated(d) => Some(d.as_ref()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_uptrend_emits_one_approved_bullish_signal() {
    let mut session = BotSession::for_symbol("1HZ75V").unwrap();
    session.start();

    let outcomes = feed(&mut session, &uptrend(60), t0(), 10, Weekday::Tue);
    let evaluated = decisions(&outcomes);

    // The first evaluation opens the gate's cooldown for the rest of the minute
    assert_eq!(evaluated.len(), 1);
    let decision = evaluated[0];
    assert!(decision.approved());

    let signal = &decision.signal;
    assert_eq!(signal.direction, Direction::Bullish);
    assert_eq!(signal.technicals.labels.trend, Trend::StrongBullish);
    assert!(signal.stop_loss < signal.entry_price);
    assert!(signal.entry_price < signal.take_profit);
    assert_eq!(signal.confidence, 86);
    assert_eq!(signal.risk_reward, "1:2.5");

    // RSI sits just above 65 after an up tick, so the target is pulled in
    assert_eq!(signal.take_profit - signal.entry_price, Decimal::from(175));
    assert!(signal.adjusted);

    assert!(outcomes[19..].iter().skip(1).all(|o| matches!(o, TickOutcome::CoolingDown { .. })));
    assert_eq!(session.recent_signals(10).len(), 1);
    assert_eq!(session.stats().approved_signals, 1);
    assert_eq!(session.gate().last_emitted_at(), Some(t0() + Duration::seconds(19)));
}

#[test]
fn test_gate_reopens_after_interval() {
    let mut session = BotSession::for_symbol("1HZ75V").unwrap();
    session.start();

    let prices = uptrend(80);
    feed(&mut session, &prices[..40], t0(), 10, Weekday::Tue);
    assert_eq!(session.recent_signals(10).len(), 1);

    // Resume the same series five minutes later
    let later = t0() + Duration::minutes(5) + Duration::seconds(19);
    let outcomes = feed(&mut session, &prices[40..], later, 10, Weekday::Tue);
    assert_eq!(decisions(&outcomes).len(), 1);

    let recent = session.recent_signals(10);
    assert_eq!(recent.len(), 2);
    assert!(recent[0].created_at > recent[1].created_at);
}

#[test]
fn test_weekend_rejection_does_not_arm_gate() {
    let mut session = BotSession::for_symbol("1HZ75V").unwrap();
    session.start();

    let outcomes = feed(&mut session, &uptrend(25), t0(), 10, Weekday::Sat);
    let evaluated = decisions(&outcomes);

    // Every eligible tick is evaluated and rejected; nothing is stored
    assert_eq!(evaluated.len(), 6);
    assert!(evaluated.iter().all(|d| !d.approved()));
    assert!(evaluated[0].verdict.reason.contains("Weekend"));
    assert_eq!(session.gate().last_emitted_at(), None);
    assert!(session.recent_signals(10).is_empty());
    assert_eq!(session.stats().rejected_signals, 6);
}

#[test]
fn test_downtrend_emits_bearish_signal() {
    let mut session = BotSession::for_symbol("1HZ50V").unwrap();
    session.start();

    let outcomes = feed(&mut session, &downtrend(40), t0(), 14, Weekday::Wed);
    let evaluated = decisions(&outcomes);

    assert_eq!(evaluated.len(), 1);
    let signal = &evaluated[0].signal;
    assert!(evaluated[0].approved());
    assert_eq!(signal.direction, Direction::Bearish);
    assert!(signal.take_profit < signal.entry_price);
    assert!(signal.entry_price < signal.stop_loss);
}
