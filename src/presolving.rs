use anyhow::Result;

use crate::datastructures::*;
use crate::schedules::static_to_schedules;

/// Builder of a static pre-solving schedule: a fixed list of
/// (algorithm, budget) pairs run on every instance before any feature-based
/// decision. Fit once on training performance data; the schedule carries no
/// per-instance logic, so `predict` repeats it for every instance.
///
/// The schedule construction itself (e.g. an answer-set-programming
/// timeout-minimal schedule) lives outside this crate; implementations only
/// have to honor this contract.
pub trait PreSolver {
    fn fit(&mut self, scenario: &Scenario, config: &Config) -> Result<()>;

    /// The fitted (algorithm, budget) list, empty before `fit`.
    fn schedule(&self) -> Schedule;

    fn predict(&self, scenario: &Scenario) -> Schedules {
        static_to_schedules(&self.schedule(), &scenario.instances)
    }
}
