use colorize_payment_engine::{cpe_api::settlement_objects::Decision, SweepSummary};
use cucumber::World;

use crate::support::TestSystem;

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<TestSystem>,
    pub decisions: Vec<Decision>,
    pub sweep: Option<SweepSummary>,
}

impl SettlementWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The system has not been initialised. Start with 'Given a fresh install'")
    }

    pub fn last_decision(&self) -> &Decision {
        self.decisions.last().expect("Nothing has been resolved yet")
    }
}
