//! Scoring: the flee step budget, the find-speed bonus and the final score.

use crate::config::GameConfig;

/// Steps granted for the flee phase: the shortest escape plus slack
/// proportional to the size of the sewer.
pub fn flee_budget(min_flee_steps: u64, open_tiles: usize, config: &GameConfig) -> u32 {
    let slack = config.extra_time_factor
        * f64::from(config.max_edge_weight + 1)
        * open_tiles as f64
        / 2.0;
    let total = min_flee_steps.saturating_add(slack.floor() as u64);
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Bonus multiplier for finding the ring in `steps_taken` steps when the
/// shortest route is `min_find_steps`. Linear from `max_bonus` at the
/// optimum down to `min_bonus` at `no_bonus_length` times the optimum extra.
pub fn bonus_factor(steps_taken: u32, min_find_steps: u64, config: &GameConfig) -> f64 {
    let denominator = min_find_steps.max(1) as f64;
    let diff = (f64::from(steps_taken) - min_find_steps as f64) / denominator;
    if diff <= 0.0 {
        return config.max_bonus;
    }
    let bonus =
        config.max_bonus - diff / config.no_bonus_length * (config.max_bonus - config.min_bonus);
    bonus.max(config.min_bonus)
}

/// Final score. Coins only count when the diver made it out.
pub fn score(bonus: f64, coins: u32, fled: bool) -> u64 {
    if fled {
        (bonus * f64::from(coins)).floor() as u64
    } else {
        0
    }
}
