use std::sync::{Arc, Mutex};
use std::time::Duration;

use emberlife_core::{FrameSink, FrameView, LifeConfig, NullSink, Simulator};

fn test_config() -> LifeConfig {
    LifeConfig {
        width: 16,
        height: 16,
        initial_density: 0.0,
        stable_generations: 5,
        reseed_pause: Duration::ZERO,
        rng_seed: Some(0xE3B0),
        ..LifeConfig::default()
    }
}

#[test]
fn bounded_run_honors_the_stop_condition() {
    let config = LifeConfig {
        width: 32,
        height: 32,
        initial_density: 0.33,
        ..test_config()
    };
    let mut sim = Simulator::new(config, Box::new(NullSink)).expect("simulator");
    let mut steps = 0u32;
    sim.run(|events| {
        steps += 1;
        assert!(events.population.is_some());
        steps < 25
    });
    assert_eq!(steps, 25);
}

#[test]
fn planted_blinker_drives_a_full_reseed_cycle() {
    // Empty board plus one blinker: population is a constant 3, so the
    // watchdog sees a static window once it fills and reseeds at the
    // threshold. Density 0 makes the reseeded board empty again.
    let mut sim = Simulator::new(test_config(), Box::new(NullSink)).expect("simulator");
    let max = sim.grid().max_level();
    let grid = sim.grid_mut();
    grid.set(7, 8, max);
    grid.set(8, 8, max);
    grid.set(9, 8, max);

    let mut reseed_generation = None;
    let mut steps = 0u32;
    sim.run(|events| {
        steps += 1;
        if events.population.is_some() && !events.reseeded && events.generation > 0 {
            assert_eq!(events.population, Some(3));
        }
        if events.reseeded {
            reseed_generation = Some(steps);
        }
        reseed_generation.is_none() && steps < 100
    });

    // Window fills at generation 3, stable_count reaches 5 at generation 7.
    assert_eq!(reseed_generation, Some(7));
    assert_eq!(sim.generation(), 0);
    assert_eq!(sim.stable_count(), 0);
    assert!(sim.history().counts().iter().all(|&count| count == 0));
    assert_eq!(sim.grid().population(), 0);
}

#[test]
fn dead_blinker_cells_leave_a_fading_trail() {
    let config = LifeConfig {
        auto_reset_on_stable: false,
        ..test_config()
    };
    let mut sim = Simulator::new(config, Box::new(NullSink)).expect("simulator");
    let max = sim.grid().max_level();
    let grid = sim.grid_mut();
    grid.set(7, 8, max);
    grid.set(8, 8, max);
    grid.set(9, 8, max);

    sim.step();
    // Endpoints died this generation and sit one level below alive.
    assert_eq!(sim.grid().get(7, 8), Some(max - 1));
    assert_eq!(sim.grid().get(9, 8), Some(max - 1));
    sim.step();
    // Reborn endpoints snap back to full brightness.
    assert_eq!(sim.grid().get(7, 8), Some(max));
    assert_eq!(sim.grid().get(9, 8), Some(max));
    // The vertical arms now fade instead.
    assert_eq!(sim.grid().get(8, 7), Some(max - 1));
    assert_eq!(sim.grid().get(8, 9), Some(max - 1));
}

struct CountingSink {
    presented: Arc<Mutex<u32>>,
}

impl FrameSink for CountingSink {
    fn present(&mut self, frame: FrameView<'_>) {
        assert_eq!(
            frame.cells().len(),
            (frame.width() * frame.height()) as usize
        );
        *self.presented.lock().expect("presented lock") += 1;
    }
}

#[test]
fn every_generation_presents_exactly_one_frame() {
    let presented = Arc::new(Mutex::new(0u32));
    let sink = CountingSink {
        presented: Arc::clone(&presented),
    };
    let mut sim = Simulator::new(test_config(), Box::new(sink)).expect("simulator");
    for _ in 0..12 {
        sim.step();
    }
    assert_eq!(*presented.lock().expect("presented lock"), 12);
}
