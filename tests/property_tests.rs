use bsdstat::format::truncate_name;
use bsdstat::system::cpu::CpuLoad;
use bsdstat::system::kernel::CpuTicks;
use bsdstat::system::memory::{pagetok, page_shift};
use bsdstat::system::network::accumulate;
use bsdstat::system::sensors::{MAX_SENSORS, parse_sensor_index};
use proptest::prelude::*;

fn cpu_ticks() -> impl Strategy<Value = CpuTicks> {
    prop::array::uniform6(0u64..1_000_000).prop_map(CpuTicks)
}

proptest! {
    #[test]
    fn net_totals_never_decrease_across_wraps(
        readings in prop::collection::vec(0u64..=u32::MAX as u64, 1..64),
    ) {
        let mut total = 0u64;
        let mut last_raw = 0u64;
        for raw in readings {
            let before = total;
            accumulate(&mut total, &mut last_raw, raw);
            prop_assert!(total >= before, "total went backwards: {} -> {}", before, total);
            prop_assert!(total - before <= u32::MAX as u64);
            prop_assert_eq!(last_raw, raw);
        }
    }

    #[test]
    fn unchanged_ticks_give_zero_usage(ticks in cpu_ticks()) {
        let mut load = CpuLoad::default();
        load.sample(&ticks);
        prop_assert_eq!(load.sample(&ticks), 0.0);
    }

    #[test]
    fn increasing_ticks_give_usage_in_unit_range(
        start in cpu_ticks(),
        step in prop::array::uniform6(0u64..10_000),
    ) {
        let mut next = start;
        for (slot, add) in next.0.iter_mut().zip(step) {
            *slot += add;
        }

        let mut load = CpuLoad::default();
        load.sample(&start);
        let usage = load.sample(&next);
        prop_assert!((0.0..=1.0).contains(&usage), "usage out of range: {}", usage);
    }

    #[test]
    fn pagetok_matches_byte_arithmetic(
        pages in 0u64..1 << 32,
        exp in 10u32..20,
    ) {
        let page_size = 1usize << exp;
        prop_assert_eq!(pagetok(pages, page_shift(page_size)), pages * page_size as u64 / 1024);
    }

    #[test]
    fn truncated_names_are_bounded_prefixes(name in "\\PC{0,40}", max in 0usize..32) {
        let out = truncate_name(&name, max);
        prop_assert!(out.len() <= max);
        prop_assert!(name.starts_with(&out));
    }

    #[test]
    fn sensor_index_is_always_in_range(arg in "\\PC{0,12}") {
        prop_assert!(parse_sensor_index(&arg) < MAX_SENSORS);
    }
}
