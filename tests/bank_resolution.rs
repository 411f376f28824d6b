mod common;

use std::sync::Arc;

use common::{load, sine};
use saavy_sf::bank::generator::GeneratorType;
use saavy_sf::bank::parts::{BankBuilder, ZoneBuilder};
use saavy_sf::bank::InstrumentBank;

fn gen(set: &saavy_sf::bank::generator::GeneratorSet, kind: GeneratorType) -> i32 {
    set[kind.index()]
}

/// Two instrument zones split at key 72, both under a global zone, played
/// through a preset with its own global zone.
fn layered_bank() -> InstrumentBank {
    let mut b = BankBuilder::new("layers");
    let low = b.add_sample("low", &sine(256), 44_100, 48);
    let high = b.add_sample("high", &sine(256), 44_100, 84);
    let inst = b.add_instrument(
        "split",
        vec![
            ZoneBuilder::global()
                .generator(GeneratorType::Pan, 100)
                .generator(GeneratorType::CoarseTune, 2),
            ZoneBuilder::sample(low).key_range(0, 71).generator(GeneratorType::Pan, -200),
            ZoneBuilder::sample(high).key_range(72, 127),
        ],
    );
    b.add_preset(
        "split",
        0,
        0,
        vec![
            ZoneBuilder::global().generator(GeneratorType::FineTune, 10),
            ZoneBuilder::instrument(inst)
                .key_range(0, 100)
                .generator(GeneratorType::CoarseTune, 1),
        ],
    );

    // two velocity layers stacked on the same keys
    let soft = b.add_instrument("soft", vec![ZoneBuilder::sample(low).vel_range(0, 80)]);
    let hard = b.add_instrument("hard", vec![ZoneBuilder::sample(high).vel_range(60, 127)]);
    b.add_preset(
        "stack",
        0,
        1,
        vec![ZoneBuilder::instrument(soft), ZoneBuilder::instrument(hard)],
    );
    load(b)
}

#[test]
fn local_generators_override_the_instrument_global_zone() {
    let mut bank = layered_bank();
    let layers = bank.samples_and_generators(0, 60, 100);
    assert_eq!(layers.len(), 1);
    let set = layers[0].generators();
    assert_eq!(gen(&set, GeneratorType::Pan), -200, "local pan wins");
    assert_eq!(gen(&set, GeneratorType::CoarseTune), 3, "global 2 plus preset 1");
    assert_eq!(gen(&set, GeneratorType::FineTune), 10, "preset global zone applies");

    let layers = bank.samples_and_generators(0, 80, 100);
    assert_eq!(bank.samples()[layers[0].sample].name, "high");
    assert_eq!(gen(&layers[0].generators(), GeneratorType::Pan), 100, "inherited from global");
}

#[test]
fn absent_generators_keep_their_defaults() {
    let mut bank = layered_bank();
    let set = bank.samples_and_generators(0, 60, 100)[0].generators();
    for kind in [GeneratorType::InitialFilterFc, GeneratorType::ReleaseVolEnv, GeneratorType::ScaleTuning] {
        assert_eq!(gen(&set, kind), kind.limits().default, "{}", kind.name());
    }
}

#[test]
fn preset_key_range_limits_the_layers() {
    let mut bank = layered_bank();
    assert!(bank.samples_and_generators(0, 110, 100).is_empty());
}

#[test]
fn overlapping_velocity_zones_stack() {
    let mut bank = layered_bank();
    let names = |bank: &mut InstrumentBank, velocity| -> Vec<String> {
        let layers = bank.samples_and_generators(1, 60, velocity);
        layers.iter().map(|l| bank.samples()[l.sample].name.clone()).collect()
    };
    assert_eq!(names(&mut bank, 30), ["low"]);
    assert_eq!(names(&mut bank, 70), ["low", "high"]);
    assert_eq!(names(&mut bank, 120), ["high"]);
}

#[test]
fn layers_are_shared_until_the_caches_are_cleared() {
    let mut bank = layered_bank();
    let first = bank.samples_and_generators(0, 60, 100);
    let again = bank.samples_and_generators(0, 60, 100);
    assert!(Arc::ptr_eq(&first, &again));

    // same zones, same list
    let neighbour = bank.samples_and_generators(0, 61, 99);
    assert!(Arc::ptr_eq(&first, &neighbour));
    let other_zone = bank.samples_and_generators(0, 80, 100);
    assert!(!Arc::ptr_eq(&first, &other_zone));

    bank.clear_caches();
    let rebuilt = bank.samples_and_generators(0, 60, 100);
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(*first, *rebuilt);
}

#[test]
fn loaded_banks_come_with_layers_resolved() {
    let mut bank = layered_bank();
    let soft = bank.samples_and_generators(1, 30, 10);
    let both = bank.samples_and_generators(1, 90, 70);
    let hard = bank.samples_and_generators(1, 60, 127);
    assert_eq!(soft.len(), 1);
    assert_eq!(both.len(), 2);
    assert_eq!(hard.len(), 1);

    // preparing again keeps the lists already built
    bank.prepare_layers();
    assert!(Arc::ptr_eq(&both, &bank.samples_and_generators(1, 61, 80)));

    bank.clear_caches();
    bank.prepare_layers();
    let rebuilt = bank.samples_and_generators(1, 90, 70);
    assert!(!Arc::ptr_eq(&both, &rebuilt));
    assert_eq!(*both, *rebuilt);
}

#[test]
fn layers_carry_the_default_modulators() {
    let mut bank = layered_bank();
    let defaults = bank.default_modulators().len();
    let layers = bank.samples_and_generators(0, 60, 100);
    assert!(layers[0].modulators.len() >= defaults);
}

#[test]
fn note_dump_names_preset_and_samples() {
    let mut bank = layered_bank();
    let text = bank.dump_note(1, 60, 70).to_string();
    assert!(text.starts_with("stack (0:1) note 60 velocity 70: 2 layer(s)"));
    assert!(text.contains("sample \"low\""));
    assert!(text.contains("sample \"high\""));
}
