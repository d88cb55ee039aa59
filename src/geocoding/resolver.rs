use crate::geocoding::client::Geocoder;
use crate::lineage::tree::FamilyTree;
use crate::types::{Location, PlaceLookup};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub requests: usize,
    pub located: usize,
    pub empty: usize,
}

/// Attaches geocoded birth and death places to people.
///
/// Each distinct place string is sent to the geocoder once per resolver, and
/// each person field is filled at most once for the life of the person.
pub struct PlaceResolver<'a> {
    geocoder: &'a dyn Geocoder,
    cache: HashMap<String, Option<Location>>,
    requests: usize,
}

impl<'a> PlaceResolver<'a> {
    pub fn new(geocoder: &'a dyn Geocoder) -> Self {
        Self {
            geocoder,
            cache: HashMap::new(),
            requests: 0,
        }
    }

    async fn lookup(&mut self, place: &str) -> Option<Location> {
        if let Some(cached) = self.cache.get(place) {
            return cached.clone();
        }

        self.requests += 1;
        let result = self.geocoder.lookup(place).await;
        self.cache.insert(place.to_string(), result.clone());
        result
    }

    async fn resolve_field(&mut self, place: Option<&str>, lookup: &mut PlaceLookup) -> bool {
        if lookup.is_requested() {
            return false;
        }
        let Some(place) = place.map(str::trim).filter(|place| !place.is_empty()) else {
            return false;
        };

        *lookup = self.lookup(place).await.into();
        true
    }

    pub async fn resolve_tree(&mut self, tree: &mut FamilyTree) -> ResolveSummary {
        let requests_before = self.requests;
        let mut summary = ResolveSummary::default();

        for person in tree.people_mut() {
            let fields = [
                (person.birth_place.as_deref(), &mut person.birth_location),
                (person.death_place.as_deref(), &mut person.death_location),
            ];

            for (place, lookup) in fields {
                if self.resolve_field(place, lookup).await {
                    match lookup {
                        PlaceLookup::Located(_) => summary.located += 1,
                        _ => summary.empty += 1,
                    }
                }
            }
            debug!("Resolved places for {}", person.xref);
        }

        summary.requests = self.requests - requests_before;
        info!(
            "Place resolution: {} requests, {} located, {} empty",
            summary.requests, summary.located, summary.empty
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::client::{MockGeocoder, UnavailableGeocoder};
    use crate::lineage::linker::TreeLinker;

    const PLACES: &str = "\
0 @I1@ INDI
1 BIRT
2 PLAC Boston
1 DEAT
2 PLAC Salem
0 @I2@ INDI
1 BIRT
2 PLAC Boston
0 @I3@ INDI
1 NAME No Places
";

    fn boston() -> Location {
        Location {
            display_name: "Boston, Massachusetts".to_string(),
            coordinates: (42.36, -71.06),
        }
    }

    #[tokio::test]
    async fn test_one_request_per_distinct_place() {
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_lookup()
            .withf(|place| place == "Boston")
            .times(1)
            .returning(|_| Some(boston()));
        geocoder
            .expect_lookup()
            .withf(|place| place == "Salem")
            .times(1)
            .returning(|_| None);

        let mut tree = TreeLinker::from_text(PLACES);
        let summary = PlaceResolver::new(&geocoder).resolve_tree(&mut tree).await;

        assert_eq!(summary, ResolveSummary { requests: 2, located: 2, empty: 1 });

        let first = tree.person(tree.find_person("@I1@").unwrap());
        assert_eq!(first.birth_location.location(), Some(&boston()));
        assert_eq!(first.death_location, PlaceLookup::Empty);

        let second = tree.person(tree.find_person("@I2@").unwrap());
        assert_eq!(second.birth_location.location(), Some(&boston()));

        let third = tree.person(tree.find_person("@I3@").unwrap());
        assert_eq!(third.birth_location, PlaceLookup::NotRequested);
    }

    #[tokio::test]
    async fn test_person_fields_are_never_looked_up_twice() {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_lookup().times(2).returning(|_| None);

        let mut tree = TreeLinker::from_text(PLACES);
        let first = PlaceResolver::new(&geocoder).resolve_tree(&mut tree).await;
        // A fresh resolver has an empty cache, yet no field is requested again
        let second = PlaceResolver::new(&geocoder).resolve_tree(&mut tree).await;

        assert_eq!(first.requests, 2);
        assert_eq!(second, ResolveSummary::default());
    }

    #[tokio::test]
    async fn test_unavailable_geocoder_leaves_every_place_empty() {
        let geocoder = UnavailableGeocoder;
        let mut tree = TreeLinker::from_text(PLACES);

        let summary = PlaceResolver::new(&geocoder).resolve_tree(&mut tree).await;

        assert_eq!(summary.located, 0);
        assert_eq!(summary.empty, 3);
        assert!(tree.people().all(|(_, person)| person.birth_location.location().is_none()));
    }
}
