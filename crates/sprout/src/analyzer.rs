//! Land state classification.
//!
//! Pure functions from a plot snapshot and a clock reading to action sets.
//! Every unlocked plot lands in exactly one of empty, dead, harvestable or
//! growing. Growing plots additionally carry zero or more care needs.

use crate::clock::to_time_sec;
use crate::proto::{LandInfo, PlantInfo, PlantPhaseInfo};

/// Growth stage ordinals as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantPhase {
    Unknown,
    Seed,
    Germination,
    SmallLeaves,
    LargeLeaves,
    Blooming,
    Mature,
    Dead,
}

impl PlantPhase {
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Self::Seed,
            2 => Self::Germination,
            3 => Self::SmallLeaves,
            4 => Self::LargeLeaves,
            5 => Self::Blooming,
            6 => Self::Mature,
            7 => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotState {
    Empty,
    Dead,
    Harvestable,
    Growing,
}

/// Care flags of a growing plot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Needs {
    pub water: bool,
    pub weed: bool,
    pub insect: bool,
}

impl Needs {
    pub fn any(&self) -> bool {
        self.water || self.weed || self.insect
    }
}

/// Classification of a single unlocked plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotAssessment {
    pub land_id: i64,
    pub state: PlotState,
    pub needs: Needs,
    /// Mature, marked stealable and with fruit left.
    pub stealable: bool,
    pub plant_id: Option<i64>,
    pub remaining_fruit: i64,
}

/// Plot ids grouped by what can be done with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandReport {
    pub empty: Vec<i64>,
    pub dead: Vec<i64>,
    pub harvestable: Vec<i64>,
    pub growing: Vec<i64>,
    pub need_water: Vec<i64>,
    pub need_weed: Vec<i64>,
    pub need_insect: Vec<i64>,
    /// Subset of `harvestable` a visitor may steal from.
    pub stealable: Vec<i64>,
    pub plots: Vec<PlotAssessment>,
}

impl LandReport {
    pub fn unlocked(&self) -> usize {
        self.plots.len()
    }

    pub fn has_work(&self) -> bool {
        !(self.empty.is_empty()
            && self.dead.is_empty()
            && self.harvestable.is_empty()
            && self.need_water.is_empty()
            && self.need_weed.is_empty()
            && self.need_insect.is_empty())
    }

    /// Plant id on `land_id`, if the plot was planted.
    pub fn plant_on(&self, land_id: i64) -> Option<i64> {
        self.plots
            .iter()
            .find(|plot| plot.land_id == land_id)
            .and_then(|plot| plot.plant_id)
    }
}

/// The latest phase whose start time has passed.
///
/// Scans from the end. When no phase has started on our clock (skew), the
/// first phase is returned. `None` only for an empty list.
pub fn current_phase(phases: &[PlantPhaseInfo], now_sec: i64) -> Option<&PlantPhaseInfo> {
    phases
        .iter()
        .rev()
        .find(|phase| {
            let begin = to_time_sec(phase.begin_time);
            begin > 0 && begin <= now_sec
        })
        .or_else(|| phases.first())
}

/// Classifies one plot. Locked plots yield `None`.
pub fn assess(land: &LandInfo, now_sec: i64) -> Option<PlotAssessment> {
    if !land.unlocked {
        return None;
    }

    let mut plot = PlotAssessment {
        land_id: land.id,
        state: PlotState::Empty,
        needs: Needs::default(),
        stealable: false,
        plant_id: None,
        remaining_fruit: 0,
    };

    let Some(plant) = land.plant.as_ref() else {
        return Some(plot);
    };
    let Some(phase) = current_phase(&plant.phases, now_sec) else {
        return Some(plot);
    };

    plot.plant_id = Some(plant.id);
    plot.remaining_fruit = plant.left_fruit_num;

    match PlantPhase::from_wire(phase.phase) {
        PlantPhase::Dead => plot.state = PlotState::Dead,
        PlantPhase::Mature => {
            plot.state = PlotState::Harvestable;
            plot.stealable = plant.stealable && plant.left_fruit_num > 0;
        }
        _ => {
            plot.state = PlotState::Growing;
            plot.needs = needs(plant, phase, now_sec);
        }
    }
    Some(plot)
}

/// Counter OR elapsed threshold, per need. Pushed counters can lag the
/// server, so either signal is enough.
fn needs(plant: &PlantInfo, phase: &PlantPhaseInfo, now_sec: i64) -> Needs {
    let elapsed = |at: i64| {
        let at = to_time_sec(at);
        at > 0 && at <= now_sec
    };
    Needs {
        water: plant.dry_num > 0 || elapsed(phase.dry_time),
        weed: !plant.weed_owners.is_empty() || elapsed(phase.weeds_time),
        insect: !plant.insect_owners.is_empty() || elapsed(phase.insect_time),
    }
}

/// Classifies a whole snapshot.
pub fn analyze(lands: &[LandInfo], now_sec: i64) -> LandReport {
    let mut report = LandReport::default();

    for plot in lands.iter().filter_map(|land| assess(land, now_sec)) {
        let id = plot.land_id;
        match plot.state {
            PlotState::Empty => report.empty.push(id),
            PlotState::Dead => report.dead.push(id),
            PlotState::Harvestable => {
                report.harvestable.push(id);
                if plot.stealable {
                    report.stealable.push(id);
                }
            }
            PlotState::Growing => {
                report.growing.push(id);
                if plot.needs.water {
                    report.need_water.push(id);
                }
                if plot.needs.weed {
                    report.need_weed.push(id);
                }
                if plot.needs.insect {
                    report.need_insect.push(id);
                }
            }
        }
        report.plots.push(plot);
    }
    report
}
