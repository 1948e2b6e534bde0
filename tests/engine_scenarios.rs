mod common;

use chrono::NaiveDate;
use common::*;
use tradetest::prelude::*;

#[test]
fn always_buy_on_flat_prices_is_force_closed_at_the_end() {
    let data = market(&[100.0; 10]);
    let mut strategy = Scripted::always(Signal::Buy, 10);
    let result = run(&mut strategy, &data, config(0.001));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.size, 10);
    assert_eq!(trade.days_held, 9);
    assert_close(trade.gross_pnl, 0.0);
    assert_close(trade.commission_paid, 2.0);
    assert_close(trade.realized_pnl, -2.0);

    assert_eq!(result.equity_curve.len(), 10);
    assert_close(result.equity_curve[0].equity, 99_999.0);
    assert_close(result.summary.final_equity, 99_998.0);
    assert_close(result.summary.total_commission, 2.0);
    assert_eq!(result.summary.num_forced_exits, 1);
    assert_close(result.summary.exposure, 1.0);
    assert!(result.anomalies.is_empty());
}

#[test]
fn long_round_trip_nets_both_commissions() {
    let data = market(&[100.0, 102.0, 104.0, 106.0, 110.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10).exit_after(4);
    let result = run(&mut strategy, &data, config(0.001));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_eq!(trade.exit_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    assert_close(trade.gross_pnl, 100.0);
    assert_close(trade.commission_paid, 2.1);
    assert_close(trade.realized_pnl, 97.9);
    assert_close(result.summary.final_equity, 100_097.9);
    assert_close(result.summary.win_rate, 1.0);
}

#[test]
fn empty_data_gives_an_empty_result() {
    let data = MarketData::empty("TEST");
    let mut strategy = Scripted::always(Signal::Buy, 10);
    let result = run(&mut strategy, &data, config(0.001));

    assert!(result.trades.is_empty());
    assert!(result.equity_curve.is_empty());
    assert!(result.anomalies.is_empty());
    assert_eq!(result.start_date, None);
    assert_close(result.summary.final_equity, 100_000.0);
    assert_close(result.summary.total_return, 0.0);
    assert_close(result.summary.max_drawdown, 0.0);
    assert_close(result.summary.sharpe_ratio, 0.0);
    assert_close(result.summary.win_rate, 0.0);
}

#[test]
fn single_bar_table_trades_nothing() {
    let data = market(&[100.0]);
    let mut strategy = Scripted::always(Signal::Buy, 10);
    let result = run(&mut strategy, &data, config(0.001));

    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), 1);
    assert_close(result.equity_curve[0].equity, 100_000.0);
    assert_close(result.summary.final_equity, 100_000.0);
    assert_close(result.summary.total_commission, 0.0);
    assert_eq!(result.summary.num_forced_exits, 0);
}

#[test]
fn buy_on_the_last_bar_is_ignored() {
    let data = market(&[100.0, 101.0, 102.0]);
    let mut strategy = Scripted {
        signals: vec![0.0, 0.0, 1.0],
        ..Scripted::always(Signal::Hold, 10)
    };
    let result = run(&mut strategy, &data, config(0.001));

    assert!(result.trades.is_empty());
    assert_close(result.summary.final_equity, 100_000.0);
    assert_close(result.summary.exposure, 0.0);
}

#[test]
fn negative_size_is_an_anomaly_and_opens_nothing() {
    let data = market(&[100.0; 5]);
    let mut strategy = Scripted::always(Signal::Buy, -5);
    let result = run(&mut strategy, &data, config(0.001));

    //the final bar never reads an entry
    assert!(result.trades.is_empty());
    assert_eq!(result.anomalies.len(), 4);
    assert!(result
        .anomalies
        .iter()
        .all(|a| a.kind == AnomalyKind::InvalidPositionSize { size: -5 }));
    assert!(result.equity_curve.iter().all(|p| p.equity == 100_000.0));
    assert_eq!(strategy.exit_calls, 0);
}

#[test]
fn no_reentry_on_the_exit_day() {
    let data = market(&[100.0; 8]);
    let mut strategy = Scripted::always(Signal::Buy, 10).exit_after(2);
    let result = run(&mut strategy, &data, config(0.0));

    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let spans: Vec<(NaiveDate, NaiveDate)> = result
        .trades
        .iter()
        .map(|t| (t.entry_date, t.exit_date))
        .collect();
    assert_eq!(
        spans,
        vec![(day(1), day(3)), (day(4), day(6)), (day(7), day(8))]
    );
    assert!(result.trades[2].is_forced());
}

#[test]
fn hard_stop_loss_closes_at_the_close() {
    let data = market(&[100.0, 99.0, 94.0, 93.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10);
    let config = BacktestConfig {
        stop_loss_pct: Some(0.05),
        ..config(0.0)
    };
    let result = run(&mut strategy, &data, config);

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_eq!(result.trades[0].exit_price, 94.0);
    assert_close(result.trades[0].realized_pnl, -60.0);
}

#[test]
fn trailing_stop_tracks_the_best_close() {
    let data = market(&[100.0, 120.0, 130.0, 116.0, 110.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10);
    let config = BacktestConfig {
        trailing_stop_pct: Some(0.10),
        ..config(0.0)
    };
    let result = run(&mut strategy, &data, config);

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::TrailingStop);
    assert_eq!(result.trades[0].exit_price, 116.0);
}

#[test]
fn hard_stop_wins_over_strategy_exit() {
    let data = market(&[100.0, 90.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10).exit_after(1);
    let config = BacktestConfig {
        stop_loss_pct: Some(0.05),
        ..config(0.0)
    };
    let result = run(&mut strategy, &data, config);

    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_eq!(strategy.exit_calls, 0);
}

#[test]
fn short_position_profits_from_a_decline() {
    let data = market(&[100.0, 95.0, 90.0]);
    let mut strategy = Scripted::once(Signal::Sell, 10).exit_after(2);
    let result = run(&mut strategy, &data, config(0.0));

    let trade = &result.trades[0];
    assert_eq!(trade.side, Side::Short);
    assert_close(trade.gross_pnl, 100.0);
    assert_close(result.summary.final_equity, 100_100.0);
}

#[test]
fn leverage_scales_pnl() {
    let data = market(&[100.0, 110.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10)
        .exit_after(1)
        .with_leverage(2.0);
    let result = run(&mut strategy, &data, config(0.0));

    assert_close(result.trades[0].leverage, 2.0);
    assert_close(result.trades[0].gross_pnl, 200.0);
    assert_close(result.summary.final_equity, 100_200.0);
}

#[test]
fn invalid_leverage_falls_back_to_default() {
    let data = market(&[100.0, 110.0]);
    let mut strategy = Scripted::once(Signal::Buy, 10)
        .exit_after(1)
        .with_leverage(0.5);
    let result = run(&mut strategy, &data, config(0.0));

    assert_eq!(
        result.anomalies[0].kind,
        AnomalyKind::InvalidLeverage { value: 0.5 }
    );
    assert_close(result.trades[0].leverage, 1.0);
    assert_close(result.trades[0].gross_pnl, 100.0);
}

#[test]
fn unaffordable_entry_is_skipped() {
    let data = market(&[100.0; 3]);
    let mut strategy = Scripted::always(Signal::Buy, 10_000);
    let result = run(&mut strategy, &data, config(0.001));

    assert!(result.trades.is_empty());
    assert_eq!(result.anomalies.len(), 2);
    assert!(matches!(
        result.anomalies[0].kind,
        AnomalyKind::OversizedPosition { size: 10_000, .. }
    ));
}

#[test]
fn undefined_and_out_of_domain_signals_hold() {
    let data = market(&[100.0; 4]);

    let mut nan_signal = Scripted {
        default_signal: f64::NAN,
        ..Scripted::always(Signal::Hold, 10)
    };
    let result = run(&mut nan_signal, &data, config(0.0));
    assert!(result.trades.is_empty());
    assert_eq!(result.anomalies.len(), 3);
    assert!(result
        .anomalies
        .iter()
        .all(|a| a.kind == AnomalyKind::UndefinedSignal));

    let mut out_of_domain = Scripted {
        default_signal: 2.0,
        ..Scripted::always(Signal::Hold, 10)
    };
    let result = run(&mut out_of_domain, &data, config(0.0));
    assert!(result.trades.is_empty());
    assert_eq!(
        result.anomalies[0].kind,
        AnomalyKind::InvalidSignal { value: 2.0 }
    );
}

#[test]
fn missing_signal_column_holds_quietly() {
    let data = market(&[100.0; 4]);
    let mut strategy = Scripted {
        write_signal: false,
        ..Scripted::always(Signal::Buy, 10)
    };
    let result = run(&mut strategy, &data, config(0.0));
    assert!(result.trades.is_empty());
    assert!(result.anomalies.is_empty());
}

#[test]
fn short_frames_are_degenerate() {
    let data = market(&[100.0; 3]);
    let mut strategy = Scripted {
        drop_last_row: true,
        ..Scripted::always(Signal::Buy, 10)
    };
    let result = run(&mut strategy, &data, config(0.0));

    assert!(result.trades.is_empty());
    assert_eq!(
        result.anomalies[0].kind,
        AnomalyKind::DegenerateFrame {
            expected: 1,
            found: 0
        }
    );
    assert_eq!(result.anomalies.len(), 3);
}

#[test]
fn calendar_gaps_are_recorded() {
    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let bars = vec![
        Bar::flat(day(1), 100.0, 1.0),
        Bar::flat(day(2), 100.0, 1.0),
        Bar::flat(day(13), 100.0, 1.0),
    ];
    let data = MarketData::new("TEST", bars).unwrap();
    let mut strategy = Scripted::always(Signal::Hold, 0);
    let result = run(&mut strategy, &data, config(0.0));

    assert_eq!(result.anomalies.len(), 1);
    assert_eq!(result.anomalies[0].day_index, 2);
    assert_eq!(
        result.anomalies[0].kind,
        AnomalyKind::DataGap { calendar_days: 11 }
    );
    assert!(!result.anomalies[0].kind.is_contract_violation());
}

#[test]
fn reusing_an_engine_gives_identical_results() {
    let data = market(&[100.0, 101.0, 99.0, 103.0, 98.0, 104.0, 97.0]);
    let script = Scripted::always(Signal::Buy, 10).exit_after(2);
    let mut engine = BacktestEngine::new(config(0.001)).unwrap();

    let first = engine.run(&mut script.clone(), &data);
    let second = engine.run(&mut script.clone(), &data);
    assert_eq!(first, second);
    assert_eq!(engine.portfolio().trade_log.len(), first.trades.len());
}

#[test]
fn builtin_strategies_conserve_cash() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let bars: Vec<Bar> = (0..400)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 20.0 * (x / 15.0).sin() + 0.05 * x;
            let volume = 1_000.0 + 800.0 * (x / 4.0).sin().abs();
            Bar::new(start + chrono::Duration::days(i), close, close + 1.5, close - 1.5, close, volume)
                .unwrap()
        })
        .collect();
    let data = MarketData::new("WAVE", bars).unwrap();
    let registry = StrategyRegistry::builtin();

    for name in registry.names() {
        let mut strategy = registry.create(name).unwrap();
        let result = run(strategy.as_mut(), &data, config(0.001));

        let gross: f64 = result.trades.iter().map(|t| t.gross_pnl).sum();
        assert_close(
            result.summary.final_equity,
            100_000.0 + gross - result.summary.total_commission,
        );
        assert_eq!(result.equity_curve.len(), 400);
    }
}
