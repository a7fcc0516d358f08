use crate::model::FuelRecord;

/// Concatenates per-source record sets, keeping source order and then row
/// order within each source.
pub fn consolidate<I>(record_sets: I) -> Vec<FuelRecord>
where
    I: IntoIterator<Item = Vec<FuelRecord>>,
{
    record_sets.into_iter().flatten().collect()
}
