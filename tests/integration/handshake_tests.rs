//! Handshake sessions driven step by step.
//!
//! The session future is polled by hand between synthetic edges, so every
//! test is deterministic and never sleeps.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use caster_interface::app::code::OutputCode;
use caster_interface::app::events::{AbortReason, InterfaceEvent};
use caster_interface::app::handshake::HandshakeController;
use caster_interface::config::InterfaceConfig;
use caster_interface::drivers::mcp23017::{Chip, Register};
use caster_interface::error::{BusError, Error};
use caster_interface::sensors::cycle::{CycleSensor, InputState};
use embedded_hal::i2c::ErrorKind;

use crate::mock_hw::{EdgeFeeder, MockBus, RecordingSink, poll};

const CODE: OutputCode = OutputCode::new(0x11, 0x35, 0x64, 0xAA);

fn rig() -> (HandshakeController, EdgeFeeder) {
    let sensor = Arc::new(CycleSensor::new(Duration::from_millis(10)));
    let feeder = EdgeFeeder::new(&sensor);
    let controller = HandshakeController::new(sensor, &InterfaceConfig::default());
    (controller, feeder)
}

#[test]
fn full_cycle_latches_then_clears() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();
    let events = sink.clone();

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.len(), 0, "nothing written before the first transition");

        edges.toggle();
        assert!(poll(session.as_mut()).is_none(), "On must not end the session");
        assert_eq!(
            log.writes(),
            vec![
                (Chip::Mcp0, Register::GpioA, 0x11),
                (Chip::Mcp0, Register::GpioB, 0x35),
                (Chip::Mcp1, Register::GpioA, 0x64),
                (Chip::Mcp1, Register::GpioB, 0xAA),
            ]
        );

        edges.toggle();
        assert_eq!(poll(session.as_mut()), Some(Ok(())));
    }

    assert_eq!(
        log.since(4),
        vec![
            (Chip::Mcp0, Register::GpioA, 0x00),
            (Chip::Mcp0, Register::GpioB, 0x00),
            (Chip::Mcp1, Register::GpioA, 0x00),
            (Chip::Mcp1, Register::GpioB, 0x00),
        ]
    );
    assert_eq!(
        events.events(),
        vec![
            InterfaceEvent::CodeLatched(CODE),
            InterfaceEvent::OutputsCleared,
            InterfaceEvent::CycleCompleted { cycles: 1 },
        ]
    );

    let stats = ctl.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.codes_latched, 1);
    assert_eq!(stats.transitions_missed, 0);
}

#[test]
fn bounces_inside_a_phase_do_not_retrigger() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());

        edges.toggle_with_bounce(7);
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.len(), 4, "one latch for the whole burst");

        edges.toggle_with_bounce(3);
        assert_eq!(poll(session.as_mut()), Some(Ok(())));
    }

    assert_eq!(log.outputs(), [0; 4]);
    assert_eq!(ctl.stats().bounces, 10);
}

#[test]
fn stale_changes_before_the_call_are_ignored() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();

    // A whole cycle happens while nobody is transmitting.
    edges.toggle();
    edges.toggle();
    assert_eq!(ctl.sensor().state(), InputState::Off);

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.len(), 0, "pre-call edges must not trigger anything");

        edges.toggle();
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.outputs(), CODE.bytes());

        edges.toggle();
        assert_eq!(poll(session.as_mut()), Some(Ok(())));
    }
    assert_eq!(log.outputs(), [0; 4]);
}

#[test]
fn missed_transitions_are_reported_and_current_state_wins() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();
    let events = sink.clone();

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());

        // Off → On → Off → On before the controller gets to look.
        edges.toggle();
        edges.toggle();
        edges.toggle();
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.outputs(), CODE.bytes());

        edges.toggle();
        assert_eq!(poll(session.as_mut()), Some(Ok(())));
    }

    assert_eq!(
        events.events(),
        vec![
            InterfaceEvent::TransitionsMissed(2),
            InterfaceEvent::CodeLatched(CODE),
            InterfaceEvent::OutputsCleared,
            InterfaceEvent::CycleCompleted { cycles: 1 },
        ]
    );
    assert_eq!(ctl.stats().transitions_missed, 2);
}

#[test]
fn off_without_latch_still_completes_the_cycle() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();

    // Line was physically on at boot.
    ctl.sensor().resync(InputState::On);

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        edges.toggle();
        assert_eq!(poll(session.as_mut()), Some(Ok(())));
    }

    assert_eq!(log.writes().len(), 4);
    assert_eq!(log.outputs(), [0; 4]);
    assert_eq!(ctl.stats().codes_latched, 0);
    assert_eq!(ctl.stats().cycles_completed, 1);
}

#[test]
fn bus_failure_surfaces_which_register_failed() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::failing_on(Chip::Mcp1, Register::GpioA);
    let log = bus.log();
    let mut sink = RecordingSink::default();

    let result = {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        edges.toggle();
        poll(session.as_mut())
    };

    assert_eq!(
        result,
        Some(Err(Error::Bus(BusError {
            chip: Chip::Mcp1,
            register: Register::GpioA,
            kind: ErrorKind::Other,
        })))
    );
    // Writes stop at the failing register.
    assert_eq!(log.len(), 2);

    // Recovery: explicit all-off once the bus is back.
    bus.heal();
    ctl.all_off(&mut bus).unwrap();
    assert_eq!(log.outputs(), [0; 4]);
}

#[test]
fn bus_failure_while_clearing_does_not_complete_the_cycle() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let fault = bus.fault();
    let log = bus.log();
    let mut sink = RecordingSink::default();
    let events = sink.clone();

    let result = {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        edges.toggle();
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.outputs(), CODE.bytes());

        fault.set(Chip::Mcp0, Register::GpioA);
        edges.toggle();
        poll(session.as_mut())
    };

    assert!(matches!(
        result,
        Some(Err(Error::Bus(BusError {
            chip: Chip::Mcp0,
            register: Register::GpioA,
            ..
        })))
    ));
    // The code is still latched; nothing was cleared.
    assert_eq!(log.outputs(), CODE.bytes());
    assert_eq!(events.events(), vec![InterfaceEvent::CodeLatched(CODE)]);

    let stats = ctl.stats();
    assert_eq!(stats.codes_latched, 1);
    assert_eq!(stats.cycles_completed, 0);
    assert_eq!(stats.aborted, 0);
}

#[test]
fn cancel_with_failing_bus_reports_the_bus_error() {
    let (mut ctl, mut edges) = rig();
    let cancel = ctl.cancel_handle();
    let mut bus = MockBus::new();
    let fault = bus.fault();
    let mut sink = RecordingSink::default();
    let events = sink.clone();

    let result = {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        edges.toggle();
        assert!(poll(session.as_mut()).is_none());

        fault.set(Chip::Mcp0, Register::GpioA);
        cancel.cancel();
        poll(session.as_mut())
    };

    assert!(matches!(result, Some(Err(Error::Bus(_)))));
    assert!(
        !events
            .events()
            .iter()
            .any(|e| matches!(e, InterfaceEvent::Aborted(_) | InterfaceEvent::OutputsCleared))
    );
    assert_eq!(ctl.stats().aborted, 0);
    assert_eq!(ctl.stats().cycles_completed, 0);

    // Once the bus recovers, the caller's all-off clears the latches.
    fault.clear();
    ctl.all_off(&mut bus).unwrap();
    assert_eq!(bus.log().outputs(), [0; 4]);
}

#[test]
fn cancel_forces_all_off() {
    let (mut ctl, mut edges) = rig();
    let cancel = ctl.cancel_handle();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();
    let events = sink.clone();

    {
        let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
        assert!(poll(session.as_mut()).is_none());
        edges.toggle();
        assert!(poll(session.as_mut()).is_none());
        assert_eq!(log.outputs(), CODE.bytes());

        cancel.cancel();
        assert_eq!(poll(session.as_mut()), Some(Err(Error::Cancelled)));
    }

    assert_eq!(log.outputs(), [0; 4]);
    assert_eq!(
        events.events()[1..],
        [
            InterfaceEvent::OutputsCleared,
            InterfaceEvent::Aborted(AbortReason::Cancelled),
        ]
    );
    assert_eq!(ctl.stats().aborted, 1);
    assert_eq!(ctl.stats().cycles_completed, 0);
}

#[test]
fn cancel_between_sessions_is_discarded() {
    let (mut ctl, mut edges) = rig();
    let mut bus = MockBus::new();
    let mut sink = RecordingSink::default();

    ctl.cancel_handle().cancel();

    let mut session = pin!(ctl.transmit_async(CODE, &mut bus, &mut sink));
    assert!(poll(session.as_mut()).is_none(), "stale cancel must not abort");
    edges.toggle();
    edges.toggle();
    // Two transitions at once: reported as one missed, Off wins.
    assert_eq!(poll(session.as_mut()), Some(Ok(())));
}

#[test]
fn initialise_configures_both_chips_as_outputs() {
    let (mut ctl, _) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();
    let mut sink = RecordingSink::default();

    ctl.initialise(&mut bus, &mut sink).unwrap();

    let writes = log.writes();
    assert_eq!(
        writes[..4],
        [
            (Chip::Mcp0, Register::IodirA, 0x00),
            (Chip::Mcp0, Register::IodirB, 0x00),
            (Chip::Mcp1, Register::IodirA, 0x00),
            (Chip::Mcp1, Register::IodirB, 0x00),
        ]
    );
    assert_eq!(writes.len(), 8);
    assert_eq!(log.outputs(), [0; 4]);
    assert_eq!(sink.events(), vec![InterfaceEvent::Initialised]);
}

#[test]
fn set_outputs_latches_immediately() {
    let (mut ctl, _) = rig();
    let mut bus = MockBus::new();
    let log = bus.log();

    ctl.set_outputs(&CODE, &mut bus).unwrap();
    assert_eq!(log.outputs(), [0x11, 0x35, 0x64, 0xAA]);

    ctl.all_off(&mut bus).unwrap();
    assert_eq!(log.outputs(), [0; 4]);
}
