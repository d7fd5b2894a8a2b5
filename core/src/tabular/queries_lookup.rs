//! Stable data source ids across extractions.
//!
//! Power BI regenerates the GUID name of a global-pipe data source on every
//! save. The manifest keeps `location -> stable id`; the first id seen for a
//! location wins and is reused for as long as the location exists.

use std::collections::BTreeMap;

pub trait QueriesLookup {
    /// Stable id for the data source currently named `current_id`. Unknown
    /// ids map to themselves.
    fn lookup_original_data_source_id(&self, current_id: &str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct DataSourceIdCache {
    by_location: BTreeMap<String, String>,
    location_by_current: BTreeMap<String, String>,
}

impl DataSourceIdCache {
    /// `cached` is the manifest's `location -> stable id` map, `current` the
    /// `(current id, location)` pairs of the model being extracted. Cached
    /// locations no longer present are dropped.
    pub fn new<I>(cached: &BTreeMap<String, String>, current: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cache = DataSourceIdCache::default();
        for (current_id, location) in current {
            let stable = cached
                .get(&location)
                .cloned()
                .unwrap_or_else(|| current_id.clone());
            cache.by_location.entry(location.clone()).or_insert(stable);
            cache.location_by_current.insert(current_id, location);
        }
        cache
    }

    pub fn stable_id_for_location(&self, location: &str) -> Option<&str> {
        self.by_location.get(location).map(String::as_str)
    }

    pub fn into_queries(self) -> BTreeMap<String, String> {
        self.by_location
    }
}

impl QueriesLookup for DataSourceIdCache {
    fn lookup_original_data_source_id(&self, current_id: &str) -> String {
        self.location_by_current
            .get(current_id)
            .and_then(|location| self.by_location.get(location))
            .cloned()
            .unwrap_or_else(|| current_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(id, loc)| (id.to_string(), loc.to_string()))
            .collect()
    }

    #[test]
    fn first_seen_id_is_kept_for_a_location() {
        let first = DataSourceIdCache::new(&BTreeMap::new(), pairs(&[("guid-1", "Sales")]));
        assert_eq!(first.lookup_original_data_source_id("guid-1"), "guid-1");
        let cached = first.into_queries();

        let second = DataSourceIdCache::new(&cached, pairs(&[("guid-2", "Sales")]));
        assert_eq!(second.lookup_original_data_source_id("guid-2"), "guid-1");
        assert_eq!(second.stable_id_for_location("Sales"), Some("guid-1"));
    }

    #[test]
    fn vanished_locations_are_dropped_and_new_ones_added() {
        let mut cached = BTreeMap::new();
        cached.insert("Old".to_string(), "guid-old".to_string());
        cached.insert("Sales".to_string(), "guid-1".to_string());
        let cache = DataSourceIdCache::new(&cached, pairs(&[("guid-2", "Sales"), ("guid-3", "Budget")]));
        let queries = cache.into_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries["Sales"], "guid-1");
        assert_eq!(queries["Budget"], "guid-3");
    }

    #[test]
    fn unknown_ids_map_to_themselves() {
        let cache = DataSourceIdCache::new(&BTreeMap::new(), Vec::new());
        assert_eq!(cache.lookup_original_data_source_id("SqlServer localhost"), "SqlServer localhost");
    }
}
