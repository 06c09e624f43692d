// Per-tick ramp/failsafe law
//
// Priority order inside one tick:
//   1. expired watchdog forces the safe default, nothing else runs
//   2. a mode change ramps duty down in the old mode before switching
//   3. a duty change steps by the commanded unit, or snaps when the level
//      is Off or the remaining gap is smaller than one step
//
// Target is never mutated here; actual is never mutated anywhere else.

use super::state::{ChangeLevel, MotorState, duty_approx_eq};

/// Advance `actual` one control tick toward `target`.
pub fn coordinate(target: &MotorState, actual: &mut MotorState) {
    if actual.ttl() == 0 {
        actual.set_duty_cycle(0.0);
        actual.set_run_mode(MotorState::DEFAULT.run_mode());
        return;
    }

    actual.decrement_ttl();

    // Mode change requested: decelerate in the old mode first
    if actual.run_mode() != target.run_mode() {
        if target.fall_level() == ChangeLevel::Off {
            actual.set_duty_cycle(target.duty_cycle());
            actual.set_run_mode(target.run_mode());
        } else if actual.duty_cycle() <= target.fall_unit() {
            // Less than one ramp step of duty left in the old mode
            actual.set_duty_cycle(0.0);
            actual.set_run_mode(target.run_mode());
        } else {
            actual.set_duty_cycle(actual.duty_cycle() - target.fall_unit());
        }
        return;
    }

    let gap = target.duty_cycle() - actual.duty_cycle();
    if duty_approx_eq(target.duty_cycle(), actual.duty_cycle()) {
        return;
    }

    // Passive modes ignore the commanded duty cycle
    if target.run_mode().is_passive() {
        return;
    }

    if gap >= target.rise_unit() {
        if target.rise_level() == ChangeLevel::Off {
            actual.set_duty_cycle(target.duty_cycle());
        } else {
            actual.set_duty_cycle(actual.duty_cycle() + target.rise_unit());
        }
    } else if gap <= -target.fall_unit() {
        if target.fall_level() == ChangeLevel::Off {
            actual.set_duty_cycle(target.duty_cycle());
        } else {
            actual.set_duty_cycle(actual.duty_cycle() - target.fall_unit());
        }
    } else {
        // The remaining gap is smaller than one step in either direction;
        // land exactly on the target instead of creeping toward it
        actual.set_duty_cycle(target.duty_cycle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WATCHDOG_TTL_TICKS;
    use crate::motor::state::RunMode;

    fn target(
        mode: RunMode,
        duty: f32,
        rise: (f32, ChangeLevel),
        fall: (f32, ChangeLevel),
    ) -> MotorState {
        let mut state = MotorState::new();
        state.set_run_mode(mode);
        state.set_duty_cycle(duty);
        state.set_rise(rise.0, rise.1);
        state.set_fall(fall.0, fall.1);
        state
    }

    #[test]
    fn watchdog_forces_safe_state_once_budget_is_spent() {
        let cmd = target(
            RunMode::Forward,
            1.0,
            (0.1, ChangeLevel::Off),
            (0.1, ChangeLevel::Off),
        );
        let mut actual = MotorState::new();

        // First tick snaps to the target (fall level Off); the watchdog
        // leaves the ramp alone while budget remains
        for _ in 0..WATCHDOG_TTL_TICKS {
            coordinate(&cmd, &mut actual);
            assert_eq!(actual.run_mode(), RunMode::Forward);
            assert_eq!(actual.duty_cycle(), 1.0);
        }
        assert_eq!(actual.ttl(), 0);

        // Budget exhausted: the very next tick fails safe
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Brake);
        assert_eq!(actual.duty_cycle(), 0.0);

        // And stays there while the bus is silent
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Brake);
        assert_eq!(actual.duty_cycle(), 0.0);
    }

    #[test]
    fn rise_converges_in_gap_over_unit_ticks() {
        let cmd = target(
            RunMode::Forward,
            0.5,
            (0.2, ChangeLevel::Low),
            (0.2, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);

        coordinate(&cmd, &mut actual);
        assert!((actual.duty_cycle() - 0.2).abs() < 1e-6);
        coordinate(&cmd, &mut actual);
        assert!((actual.duty_cycle() - 0.4).abs() < 1e-6);

        // ceil(0.5 / 0.2) = 3 ticks, the last one landing exactly
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.duty_cycle(), 0.5);

        // Converged: further ticks change nothing
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.duty_cycle(), 0.5);
    }

    #[test]
    fn mode_switch_waits_for_ramp_down() {
        let cmd = target(
            RunMode::Reverse,
            0.8,
            (0.3, ChangeLevel::Low),
            (0.3, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);
        actual.set_duty_cycle(1.0);

        // Ramping down in the old mode
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Forward);
        assert!((actual.duty_cycle() - 0.7).abs() < 1e-6);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Forward);
        assert!((actual.duty_cycle() - 0.4).abs() < 1e-6);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Forward);
        assert!((actual.duty_cycle() - 0.1).abs() < 1e-6);

        // Remaining duty fits inside one fall step: switch now, from zero
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Reverse);
        assert_eq!(actual.duty_cycle(), 0.0);

        // Then rise toward the new target in the new mode
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Reverse);
        assert!((actual.duty_cycle() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn off_fall_level_switches_mode_immediately() {
        let cmd = target(
            RunMode::Reverse,
            0.8,
            (0.1, ChangeLevel::Low),
            (0.1, ChangeLevel::Off),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);
        actual.set_duty_cycle(1.0);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.run_mode(), RunMode::Reverse);
        assert_eq!(actual.duty_cycle(), 0.8);
    }

    #[test]
    fn off_rise_level_snaps_in_one_tick() {
        let cmd = target(
            RunMode::Forward,
            0.9,
            (0.1, ChangeLevel::Off),
            (0.1, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.duty_cycle(), 0.9);
    }

    #[test]
    fn off_fall_level_snaps_down_in_one_tick() {
        let cmd = target(
            RunMode::Forward,
            0.1,
            (0.05, ChangeLevel::Low),
            (0.05, ChangeLevel::Off),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);
        actual.set_duty_cycle(0.9);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.duty_cycle(), 0.1);
    }

    #[test]
    fn passive_target_mode_freezes_duty() {
        let cmd = target(
            RunMode::Brake,
            0.0,
            (0.1, ChangeLevel::Low),
            (0.1, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();
        actual.set_duty_cycle(0.4); // mode already Brake

        for _ in 0..5 {
            coordinate(&cmd, &mut actual);
            assert_eq!(actual.duty_cycle(), 0.4);
        }
    }

    #[test]
    fn sub_step_gap_lands_exactly_on_target() {
        let cmd = target(
            RunMode::Forward,
            0.15,
            (0.1, ChangeLevel::Low),
            (0.1, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();
        actual.set_run_mode(RunMode::Forward);

        coordinate(&cmd, &mut actual);
        assert!((actual.duty_cycle() - 0.1).abs() < 1e-6);

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.duty_cycle(), 0.15);
    }

    #[test]
    fn each_tick_burns_one_ttl() {
        let cmd = target(
            RunMode::Brake,
            0.0,
            (0.1, ChangeLevel::Low),
            (0.1, ChangeLevel::Low),
        );
        let mut actual = MotorState::new();

        coordinate(&cmd, &mut actual);
        assert_eq!(actual.ttl(), WATCHDOG_TTL_TICKS - 1);
        coordinate(&cmd, &mut actual);
        assert_eq!(actual.ttl(), WATCHDOG_TTL_TICKS - 2);
    }
}
