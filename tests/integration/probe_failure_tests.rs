//! Probe loss through the real sensor front-end: all three probes going
//! silent mid-cycle must land the appliance in Error with outputs off.

use shoedryer::actuator::ActuatorDriver;
use shoedryer::app::coordinator::Coordinator;
use shoedryer::app::ports::{ProbePort, RawSample};
use shoedryer::bus::snapshot::SensorSnapshot;
use shoedryer::bus::{Event, EventQueue, LocalBus};
use shoedryer::config::DryerConfig;
use shoedryer::error::{Fault, SensorError};
use shoedryer::fsm::global::GlobalState;
use shoedryer::fsm::shoe::ShoeState;
use shoedryer::sensors::SensorFrontEnd;

use crate::mock_hw::{ActuatorCall, MockHardware, MockPanel, RecordingSink};

struct BenchProbes {
    alive: bool,
}

impl ProbePort for BenchProbes {
    fn read_probe(&mut self, _probe: usize) -> Result<RawSample, SensorError> {
        if self.alive {
            Ok(RawSample {
                temp_c: 22.0,
                rh_pct: 45.0,
            })
        } else {
            Err(SensorError::NoResponse)
        }
    }
}

struct Bench {
    cfg: DryerConfig,
    front: SensorFrontEnd,
    probes: BenchProbes,
    coord: Coordinator,
    driver: ActuatorDriver,
    bus: LocalBus,
    hw: MockHardware,
    panel: MockPanel,
    sink: RecordingSink,
    snap: SensorSnapshot,
    now: u32,
}

impl Bench {
    fn new() -> Self {
        let cfg = DryerConfig::default();
        let mut b = Self {
            front: SensorFrontEnd::new(&cfg),
            probes: BenchProbes { alive: true },
            coord: Coordinator::new(cfg.clone()),
            driver: ActuatorDriver::new(&cfg),
            cfg,
            bus: LocalBus::new(),
            hw: MockHardware::default(),
            panel: MockPanel::default(),
            sink: RecordingSink::default(),
            snap: SensorSnapshot::default(),
            now: 0,
        };
        b.snap = b.front.sample(0, &mut b.probes, &mut b.bus);
        b.coord.start(0, &mut b.bus, &mut b.sink);
        b
    }

    fn run_for(&mut self, ms: u32) {
        let end = self.now + ms;
        while self.now < end {
            self.now += self.cfg.coordinator_period_ms;
            if self.now % self.cfg.sensor_period_ms == 0 {
                self.snap = self.front.sample(self.now, &mut self.probes, &mut self.bus);
            }
            if self.now % self.cfg.actuator_period_ms == 0 {
                self.driver
                    .tick(self.now, &self.snap, &mut self.bus, &mut self.hw);
            }
            self.coord
                .tick(self.now, &self.snap, &mut self.bus, &mut self.panel, &mut self.sink);
        }
    }
}

#[test]
fn losing_every_probe_mid_uv_is_fatal() {
    let mut b = Bench::new();
    b.bus.post(Event::StartPressed);
    b.run_for(10_000);
    assert_eq!(b.coord.state(), GlobalState::Running);
    assert_eq!(b.coord.shoe_state(0), ShoeState::Dry);
    assert_eq!(b.coord.shoe_state(1), ShoeState::Dry);
    b.run_for(10_000);
    assert!(b.hw.uv > 0, "lamp on after start delay and ramp");

    b.probes.alive = false;
    // Two failed cycles only hold the last reading.
    b.run_for(2 * b.cfg.sensor_period_ms);
    assert_eq!(b.coord.state(), GlobalState::Running);

    b.run_for(b.cfg.sensor_period_ms + 200);
    assert_eq!(b.coord.state(), GlobalState::Error);
    assert_ne!(b.coord.faults() & Fault::ProbeTimeout.mask(), 0);
    assert!(b.hw.all_outputs_off());
    assert!(b.hw.calls.contains(&ActuatorCall::AllOff));
    assert!(b.panel.error_led);
    assert!(!b.panel.status_led);

    // Error is latched: probes coming back or Start do nothing.
    b.probes.alive = true;
    b.bus.post(Event::StartPressed);
    b.run_for(10_000);
    assert_eq!(b.coord.state(), GlobalState::Error);

    b.bus.post(Event::ResetPressed);
    b.run_for(100);
    assert_eq!(b.coord.state(), GlobalState::Idle);
    assert_eq!(b.coord.faults(), 0);
}

#[test]
fn probes_dead_at_power_on_block_the_cycle() {
    let mut b = Bench::new();
    b.probes.alive = false;
    b.run_for(4 * b.cfg.sensor_period_ms);
    assert_eq!(b.coord.state(), GlobalState::Error);
    assert!(b.sink.global_path().contains(&GlobalState::Error));
}
