use crate::domain::timeframe::TimeFrame;
use crate::domain::types::ArchiveUnit;
use std::collections::BTreeSet;

/// Full (timeframe x pair) product: timeframes in declaration order, pairs sorted
pub fn plan(pairs: &BTreeSet<String>) -> Vec<ArchiveUnit> {
    TimeFrame::ALL
        .iter()
        .flat_map(|tf| pairs.iter().map(move |pair| ArchiveUnit::new(*tf, pair.clone())))
        .collect()
}

/// Split a planned sequence into runs of units sharing a timeframe.
///
/// Adjacent units are grouped, so the input order is preserved.
pub fn group_by_timeframe(units: Vec<ArchiveUnit>) -> Vec<(TimeFrame, Vec<ArchiveUnit>)> {
    let mut groups: Vec<(TimeFrame, Vec<ArchiveUnit>)> = Vec::new();
    for unit in units {
        match groups.last_mut() {
            Some((timeframe, group)) if *timeframe == unit.timeframe => group.push(unit),
            _ => groups.push((unit.timeframe, vec![unit])),
        }
    }
    groups
}
