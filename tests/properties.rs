use ldp::{LanguageDistribution, MigrationRequest, Region};
use proptest::prelude::*;

fn distribution(english: f64, french: f64) -> LanguageDistribution {
    LanguageDistribution::from_pairs([("english", english), ("french", french)])
}

fn request(source: &str, population: f64, english: f64, french: f64) -> MigrationRequest {
    MigrationRequest {
        source: source.into(),
        destination: "dest".into(),
        population,
        languages: distribution(english, french),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn growth_compounds(
        population in 0.0f64..10_000.0,
        births in 0.0f64..0.05,
        deaths in 0.0f64..0.05,
        years in 0u32..40,
    ) {
        let mut region = Region::new("r", population).with_vital_rates(births, deaths);
        for _ in 0..years {
            region.grow_population();
        }
        let expected = population * (1.0 + births - deaths).powi(years as i32);
        prop_assert!(close(region.population(), expected));
    }

    #[test]
    fn equal_vital_rates_keep_population(population in 0.0f64..10_000.0, rate in 0.0f64..0.1) {
        let mut region = Region::new("r", population).with_vital_rates(rate, rate);
        region.grow_population();
        prop_assert_eq!(region.population(), population);
    }

    #[test]
    fn drain_order_does_not_matter(
        base in 1.0f64..1_000.0,
        first in 0.0f64..100.0,
        second in 0.0f64..100.0,
        shares in proptest::array::uniform6(0.0f64..=1.0),
    ) {
        let [home_en, home_fr, a_en, a_fr, b_en, b_fr] = shares;
        let a = request("a", first, a_en, a_fr);
        let b = request("b", second, b_en, b_fr);

        let mut forward = Region::new("dest", base).with_languages(distribution(home_en, home_fr));
        forward.apply_immigration(&a).unwrap();
        forward.apply_immigration(&b).unwrap();

        let mut backward = Region::new("dest", base).with_languages(distribution(home_en, home_fr));
        backward.apply_immigration(&b).unwrap();
        backward.apply_immigration(&a).unwrap();

        prop_assert!(close(forward.population(), backward.population()));
        for language in ["english", "french"] {
            let lhs = forward.languages().get(language).unwrap();
            let rhs = backward.languages().get(language).unwrap();
            prop_assert!(close(lhs, rhs), "{}: {} vs {}", language, lhs, rhs);
        }
    }

    #[test]
    fn mixing_stays_within_bounds(
        base in 0.0f64..1_000.0,
        incoming in 0.0f64..1_000.0,
        shares in proptest::array::uniform4(0.0f64..=1.0),
    ) {
        let [home_en, home_fr, in_en, in_fr] = shares;
        let mut region = Region::new("dest", base).with_languages(distribution(home_en, home_fr));
        region.apply_immigration(&request("src", incoming, in_en, in_fr)).unwrap();
        for (_, share) in region.languages().iter() {
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&share));
        }
    }

    #[test]
    fn empty_request_leaves_distribution(
        base in 0.0f64..1_000.0,
        shares in proptest::array::uniform2(0.0f64..=1.0),
    ) {
        let [english, french] = shares;
        let mut region = Region::new("dest", base).with_languages(distribution(english, french));
        region.apply_immigration(&request("src", 0.0, 0.3, 0.3)).unwrap();
        for (language, share) in region.languages().iter() {
            let original = distribution(english, french).get(language).unwrap();
            prop_assert!(close(share, original));
        }
    }
}
