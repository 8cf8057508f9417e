//! Decision policy: the per-bar state machine.
//!
//! States are `Flat` and `InPosition`. Each bar is evaluated once, in order:
//! 1. InPosition and held for at least `max_bars_in_trade` bars → exit (time limit)
//! 2. InPosition and crossover exit enabled and fast crossed below slow → exit (signal)
//! 3. InPosition otherwise → hold; stop/target rest with the execution side
//! 4. Flat, snapshot actionable and all entry predicates hold → size, plan bracket, enter
//! 5. Flat otherwise → no action
//!
//! Entry evaluation never runs while a position is open.

use std::fmt;

use tracing::{debug, info};

use crate::domain::bracket::{BracketId, BracketPlan, BracketPlanner};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::position::Position;
use crate::domain::sizing::position_size;
use crate::domain::strategy::{EntryVariant, StrategyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    Flat,
    InPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Stop,
    Target,
    Signal,
    TimeLimit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "stop"),
            ExitReason::Target => write!(f, "target"),
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::TimeLimit => write!(f, "time_limit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Enter(BracketPlan),
    Hold,
    /// Close `position` at the next available price.
    Exit {
        position: Position,
        reason: ExitReason,
    },
    NoAction,
}

#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    config: StrategyConfig,
    planner: BracketPlanner,
    position: Option<Position>,
    next_index: usize,
}

impl DecisionPolicy {
    pub fn new(config: StrategyConfig) -> Self {
        DecisionPolicy {
            config,
            planner: BracketPlanner::new(),
            position: None,
            next_index: 0,
        }
    }

    pub fn state(&self) -> PolicyState {
        if self.position.is_some() {
            PolicyState::InPosition
        } else {
            PolicyState::Flat
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Index of the most recently evaluated bar.
    pub fn bar_index(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    pub fn on_bar(
        &mut self,
        snapshot: &IndicatorSnapshot,
        equity: f64,
    ) -> Result<Decision, TraderError> {
        let index = self.next_index;
        self.next_index += 1;

        if let Some(position) = &self.position {
            let held = position.bars_held(index);
            let time_limit_hit = self
                .config
                .risk
                .max_bars_in_trade
                .is_some_and(|max| held >= max);

            let reason = if time_limit_hit {
                Some(ExitReason::TimeLimit)
            } else if self.config.exit_on_cross_below && snapshot.crossover_sign < 0 {
                Some(ExitReason::Signal)
            } else {
                None
            };

            return Ok(match reason {
                Some(reason) => {
                    let position = self.position.take().ok_or_else(|| {
                        TraderError::invariant("position vanished during exit")
                    })?;
                    info!(bar = index, bars_held = held, %reason, bracket = %position.bracket, "exit");
                    Decision::Exit { position, reason }
                }
                None => Decision::Hold,
            });
        }

        let need = self.config.indicators.warmup_bars();
        if let Err(e) = snapshot.actionable(index + 1, need) {
            debug!(bar = index, error = %e, "no entry");
            return Ok(Decision::NoAction);
        }
        if !self.entry_signal(snapshot) {
            return Ok(Decision::NoAction);
        }

        let stop_distance = self.config.risk.stop_distance(snapshot.atr);
        let size = match position_size(equity, stop_distance, snapshot.close, &self.config.risk) {
            Ok(size) => size,
            Err(e) if e.is_local() => {
                debug!(bar = index, error = %e, "entry aborted");
                return Ok(Decision::NoAction);
            }
            Err(e) => return Err(e),
        };

        let plan = self
            .planner
            .plan(snapshot.close, snapshot.atr, size, &self.config.risk);
        self.open(&plan, index)?;
        info!(
            bar = index,
            price = snapshot.close,
            size,
            stop = plan.stop_price,
            target = ?plan.target_price,
            bracket = %plan.bracket,
            "enter"
        );
        Ok(Decision::Enter(plan))
    }

    /// The execution side closed the bracket's position (stop, target or
    /// market close). Returns whether the tracked position was cleared;
    /// notifications for positions already released are ignored.
    pub fn on_position_closed(&mut self, bracket: BracketId) -> bool {
        match &self.position {
            Some(position) if position.bracket == bracket => {
                self.position = None;
                true
            }
            _ => false,
        }
    }

    fn entry_signal(&self, s: &IndicatorSnapshot) -> bool {
        let trend_ok = s.close > s.trend_ma;
        let momentum_ok = match self.config.variant {
            EntryVariant::MeanReversion { rsi_low, rsi_high } => {
                s.fast_ma > s.slow_ma && rsi_low < s.rsi && s.rsi < rsi_high
            }
            EntryVariant::TrendFollowing { rsi_upper } => {
                s.crossover_sign == 1 && s.rsi < rsi_upper
            }
        };
        trend_ok && momentum_ok
    }

    fn open(&mut self, plan: &BracketPlan, index: usize) -> Result<(), TraderError> {
        if let Some(existing) = &self.position {
            return Err(TraderError::invariant(format!(
                "entry {} attempted while bracket {} is open",
                plan.bracket, existing.bracket
            )));
        }
        self.position = Some(Position::from_plan(plan, index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::RiskConfig;
    use crate::domain::strategy::VariantKind;
    use approx::assert_relative_eq;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 400.0,
            fast_ma: 398.0,
            slow_ma: 395.0,
            trend_ma: 390.0,
            rsi: 45.0,
            atr: 2.0,
            crossover_sign: 0,
            warming_up: false,
        }
    }

    fn mean_reversion() -> DecisionPolicy {
        DecisionPolicy::new(StrategyConfig::preset(VariantKind::MeanReversion))
    }

    fn trend_following() -> DecisionPolicy {
        DecisionPolicy::new(StrategyConfig::preset(VariantKind::TrendFollowing))
    }

    #[test]
    fn starts_flat() {
        let policy = mean_reversion();
        assert_eq!(policy.state(), PolicyState::Flat);
        assert!(policy.position().is_none());
        assert_eq!(policy.bar_index(), None);
    }

    #[test]
    fn mean_reversion_enters_inside_rsi_band() {
        let mut policy = mean_reversion();
        let decision = policy.on_bar(&snapshot(), 100_000.0).unwrap();

        let Decision::Enter(plan) = decision else {
            panic!("expected entry, got {:?}", decision);
        };
        assert_relative_eq!(plan.size(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(plan.stop_price, 397.0);
        assert_eq!(plan.target_price, Some(406.0));
        assert_eq!(policy.state(), PolicyState::InPosition);
        assert_eq!(policy.position().unwrap().entry_bar_index, 0);
    }

    #[test]
    fn mean_reversion_suppressed_above_band() {
        let mut policy = mean_reversion();
        let snap = IndicatorSnapshot {
            rsi: 60.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
        assert_eq!(policy.state(), PolicyState::Flat);
    }

    #[test]
    fn mean_reversion_band_is_exclusive() {
        let mut policy = mean_reversion();
        for rsi in [40.0, 55.0] {
            let snap = IndicatorSnapshot { rsi, ..snapshot() };
            assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
        }
    }

    #[test]
    fn mean_reversion_requires_fast_above_slow() {
        let mut policy = mean_reversion();
        let snap = IndicatorSnapshot {
            fast_ma: 394.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
    }

    #[test]
    fn trend_filter_blocks_entries_below_trend_ma() {
        let mut policy = mean_reversion();
        let snap = IndicatorSnapshot {
            trend_ma: 401.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
    }

    #[test]
    fn trend_following_enters_on_fresh_cross_under_ceiling() {
        let mut policy = trend_following();
        let snap = IndicatorSnapshot {
            crossover_sign: 1,
            rsi: 65.0,
            ..snapshot()
        };
        assert!(matches!(
            policy.on_bar(&snap, 100_000.0).unwrap(),
            Decision::Enter(_)
        ));
    }

    #[test]
    fn trend_following_suppressed_above_ceiling() {
        let mut policy = trend_following();
        let snap = IndicatorSnapshot {
            crossover_sign: 1,
            rsi: 75.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
    }

    #[test]
    fn trend_following_needs_a_cross() {
        let mut policy = trend_following();
        let snap = IndicatorSnapshot {
            rsi: 65.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
    }

    #[test]
    fn warming_up_never_enters() {
        let mut policy = mean_reversion();
        let snap = IndicatorSnapshot {
            warming_up: true,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
    }

    #[test]
    fn zero_atr_aborts_entry() {
        let mut policy = mean_reversion();
        let snap = IndicatorSnapshot {
            atr: 0.0,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&snap, 100_000.0).unwrap(), Decision::NoAction);
        assert_eq!(policy.state(), PolicyState::Flat);
    }

    #[test]
    fn zero_equity_aborts_entry() {
        let mut policy = mean_reversion();
        assert_eq!(policy.on_bar(&snapshot(), 0.0).unwrap(), Decision::NoAction);
        assert_eq!(policy.state(), PolicyState::Flat);
    }

    #[test]
    fn holds_while_in_position() {
        let mut policy = mean_reversion();
        policy.on_bar(&snapshot(), 100_000.0).unwrap();
        // Entry conditions still hold, but a position is already open.
        assert_eq!(policy.on_bar(&snapshot(), 100_000.0).unwrap(), Decision::Hold);
        assert_eq!(policy.state(), PolicyState::InPosition);
    }

    #[test]
    fn time_limit_fires_exactly_at_max_bars() {
        let mut config = StrategyConfig::preset(VariantKind::MeanReversion);
        config.risk.max_bars_in_trade = Some(3);
        let mut policy = DecisionPolicy::new(config);

        assert!(matches!(
            policy.on_bar(&snapshot(), 100_000.0).unwrap(),
            Decision::Enter(_)
        ));
        assert_eq!(policy.on_bar(&snapshot(), 100_000.0).unwrap(), Decision::Hold);
        assert_eq!(policy.on_bar(&snapshot(), 100_000.0).unwrap(), Decision::Hold);

        match policy.on_bar(&snapshot(), 100_000.0).unwrap() {
            Decision::Exit { position, reason } => {
                assert_eq!(reason, ExitReason::TimeLimit);
                assert_eq!(position.bars_held(3), 3);
            }
            other => panic!("expected time-limit exit, got {:?}", other),
        }
        assert_eq!(policy.state(), PolicyState::Flat);
        assert_eq!(policy.bar_index(), Some(3));
    }

    #[test]
    fn time_limit_takes_priority_over_signal() {
        let mut config = StrategyConfig::preset(VariantKind::TrendFollowing);
        config.risk.max_bars_in_trade = Some(1);
        let mut policy = DecisionPolicy::new(config);

        let cross_up = IndicatorSnapshot {
            crossover_sign: 1,
            rsi: 60.0,
            ..snapshot()
        };
        policy.on_bar(&cross_up, 100_000.0).unwrap();

        let cross_down = IndicatorSnapshot {
            crossover_sign: -1,
            ..snapshot()
        };
        match policy.on_bar(&cross_down, 100_000.0).unwrap() {
            Decision::Exit { reason, .. } => assert_eq!(reason, ExitReason::TimeLimit),
            other => panic!("expected exit, got {:?}", other),
        }
    }

    #[test]
    fn no_time_limit_when_disabled() {
        let mut config = StrategyConfig::preset(VariantKind::MeanReversion);
        config.risk.max_bars_in_trade = None;
        let mut policy = DecisionPolicy::new(config);

        policy.on_bar(&snapshot(), 100_000.0).unwrap();
        for _ in 0..500 {
            assert_eq!(policy.on_bar(&snapshot(), 100_000.0).unwrap(), Decision::Hold);
        }
    }

    #[test]
    fn signal_exit_on_cross_below() {
        let mut policy = trend_following();
        let cross_up = IndicatorSnapshot {
            crossover_sign: 1,
            rsi: 60.0,
            ..snapshot()
        };
        policy.on_bar(&cross_up, 100_000.0).unwrap();
        assert_eq!(policy.on_bar(&snapshot(), 100_000.0).unwrap(), Decision::Hold);

        let cross_down = IndicatorSnapshot {
            crossover_sign: -1,
            ..snapshot()
        };
        match policy.on_bar(&cross_down, 100_000.0).unwrap() {
            Decision::Exit { reason, position } => {
                assert_eq!(reason, ExitReason::Signal);
                assert_eq!(position.entry_bar_index, 0);
            }
            other => panic!("expected signal exit, got {:?}", other),
        }
        assert_eq!(policy.state(), PolicyState::Flat);
    }

    #[test]
    fn cross_below_ignored_when_signal_exit_disabled() {
        let mut policy = mean_reversion();
        policy.on_bar(&snapshot(), 100_000.0).unwrap();
        let cross_down = IndicatorSnapshot {
            crossover_sign: -1,
            ..snapshot()
        };
        assert_eq!(policy.on_bar(&cross_down, 100_000.0).unwrap(), Decision::Hold);
    }

    #[test]
    fn closed_notification_returns_to_flat() {
        let mut policy = mean_reversion();
        let Decision::Enter(plan) = policy.on_bar(&snapshot(), 100_000.0).unwrap() else {
            panic!("expected entry");
        };

        assert!(!policy.on_position_closed(BracketId(999)));
        assert_eq!(policy.state(), PolicyState::InPosition);

        assert!(policy.on_position_closed(plan.bracket));
        assert_eq!(policy.state(), PolicyState::Flat);

        // A late duplicate is ignored.
        assert!(!policy.on_position_closed(plan.bracket));
    }

    #[test]
    fn can_reenter_after_close() {
        let mut policy = mean_reversion();
        let Decision::Enter(first) = policy.on_bar(&snapshot(), 100_000.0).unwrap() else {
            panic!("expected entry");
        };
        policy.on_position_closed(first.bracket);

        let Decision::Enter(second) = policy.on_bar(&snapshot(), 100_000.0).unwrap() else {
            panic!("expected second entry");
        };
        assert_ne!(first.bracket, second.bracket);
        assert_eq!(policy.position().unwrap().entry_bar_index, 1);
    }

    #[test]
    fn open_while_in_position_is_invariant_violation() {
        let mut policy = mean_reversion();
        let Decision::Enter(plan) = policy.on_bar(&snapshot(), 100_000.0).unwrap() else {
            panic!("expected entry");
        };
        let err = policy.open(&plan, 1).unwrap_err();
        assert!(matches!(err, TraderError::InvariantViolation { .. }));
    }

    #[test]
    fn entry_without_target_when_disabled() {
        let mut config = StrategyConfig::preset(VariantKind::MeanReversion);
        config.risk = RiskConfig {
            target_multiple_of_atr: None,
            ..config.risk
        };
        let mut policy = DecisionPolicy::new(config);
        let Decision::Enter(plan) = policy.on_bar(&snapshot(), 100_000.0).unwrap() else {
            panic!("expected entry");
        };
        assert!(plan.target.is_none());
        assert!(policy.position().unwrap().target_price.is_none());
    }
}
