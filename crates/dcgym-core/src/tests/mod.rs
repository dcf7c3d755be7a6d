use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::{cast, Event, EventHandler, EventListener, Simulation};

#[derive(Clone, Serialize)]
struct Probe {
    tag: u32,
}

#[derive(Clone, Serialize)]
struct Tick {}

struct Recorder {
    received: Rc<RefCell<Vec<(f64, u32)>>>,
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) {
        let time = event.time;
        cast!(match event.data {
            Probe { tag } => {
                self.received.borrow_mut().push((time, tag));
            }
        })
    }
}

fn make_recorder(sim: &mut Simulation, name: &str) -> (u32, Rc<RefCell<Vec<(f64, u32)>>>) {
    let received = Rc::new(RefCell::new(Vec::new()));
    let recorder = Rc::new(RefCell::new(Recorder {
        received: received.clone(),
    }));
    let id = sim.add_handler(name, recorder);
    (id, received)
}

#[test]
fn equal_time_events_are_fifo() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    let (dst, received) = make_recorder(&mut sim, "recorder");
    for tag in 0..5 {
        ctx.emit(Probe { tag }, dst, 1.0);
    }
    sim.step_until_no_events();
    let received = received.borrow();
    assert_eq!(received.len(), 5);
    for (tag, entry) in received.iter().enumerate() {
        assert_eq!(*entry, (1.0, tag as u32));
    }
}

#[test]
fn min_delay_floors_event_latency() {
    let mut sim = Simulation::new(42);
    sim.set_min_delay(0.01);
    let ctx = sim.create_context("source");
    let (dst, received) = make_recorder(&mut sim, "recorder");
    ctx.emit_now(Probe { tag: 0 }, dst);
    ctx.emit(Probe { tag: 1 }, dst, 0.5);
    sim.step_until_no_events();
    let received = received.borrow();
    assert_eq!(received[0], (0.01, 0));
    assert_eq!(received[1], (0.5, 1));
}

#[test]
#[should_panic]
fn negative_delay_panics() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    ctx.emit_self(Tick {}, -1.0);
}

#[test]
fn run_until_processes_due_events_and_advances_clock() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    let (dst, received) = make_recorder(&mut sim, "recorder");
    ctx.emit(Probe { tag: 0 }, dst, 1.0);
    ctx.emit(Probe { tag: 1 }, dst, 2.0);
    ctx.emit(Probe { tag: 2 }, dst, 3.5);

    let time = sim.run_until(2.0, 1000);
    assert_eq!(time, 2.0);
    assert_eq!(sim.time(), 2.0);
    assert_eq!(received.borrow().len(), 2);

    // no due events: the clock still advances to the target
    let time = sim.run_until(3.0, 1000);
    assert_eq!(time, 3.0);
    assert_eq!(received.borrow().len(), 2);

    let time = sim.run_until(4.0, 1000);
    assert_eq!(time, 4.0);
    assert_eq!(received.borrow().len(), 3);
}

struct Echo {
    ctx: crate::SimulationContext,
}

impl EventHandler for Echo {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Tick {} => {
                self.ctx.emit_self(Tick {}, 0.001);
            }
        })
    }
}

#[test]
fn run_until_breaks_on_iteration_budget() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("echo");
    let echo = Rc::new(RefCell::new(Echo { ctx: ctx.clone() }));
    sim.add_handler("echo", echo);
    ctx.emit_self(Tick {}, 0.001);

    sim.run_until(10.0, 50);
    // one initial event plus 50 processed re-emissions
    assert_eq!(sim.event_count(), 51);
    assert!(sim.time() < 10.0);
}

#[test]
fn canceled_events_are_not_delivered() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    let (dst, received) = make_recorder(&mut sim, "recorder");
    ctx.emit(Probe { tag: 0 }, dst, 1.0);
    let canceled = ctx.emit(Probe { tag: 1 }, dst, 2.0);
    ctx.emit(Probe { tag: 2 }, dst, 3.0);
    ctx.cancel_event(canceled);
    sim.step_until_no_events();
    let received = received.borrow();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].1, 0);
    assert_eq!(received[1].1, 2);
    assert_eq!(sim.time(), 3.0);
}

#[test]
fn cancel_and_get_events_returns_harvested_events() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    let (dst, _received) = make_recorder(&mut sim, "recorder");
    ctx.emit(Probe { tag: 7 }, dst, 1.0);
    ctx.emit(Probe { tag: 8 }, dst, 2.0);
    let harvested = ctx.cancel_and_get_events(|e| e.data.is::<Probe>());
    assert_eq!(harvested.len(), 2);
    assert_eq!(sim.pending_event_count(), 0);
    assert!(!sim.step());
}

#[test]
fn deterministic_random_sequence() {
    let mut sim1 = Simulation::new(123);
    let mut sim2 = Simulation::new(123);
    for _ in 0..100 {
        assert_eq!(sim1.rand(), sim2.rand());
    }
}

struct CountingListener {
    seen: Rc<RefCell<Vec<usize>>>,
}

impl EventListener for CountingListener {
    fn on_event(&mut self, _event: &Event, pending_events: usize) {
        self.seen.borrow_mut().push(pending_events);
    }
}

#[test]
fn listeners_fire_after_each_event() {
    let mut sim = Simulation::new(42);
    let ctx = sim.create_context("source");
    let (dst, _received) = make_recorder(&mut sim, "recorder");
    let seen = Rc::new(RefCell::new(Vec::new()));
    sim.add_listener(Rc::new(RefCell::new(CountingListener { seen: seen.clone() })));
    ctx.emit(Probe { tag: 0 }, dst, 1.0);
    ctx.emit(Probe { tag: 1 }, dst, 2.0);
    ctx.emit(Probe { tag: 2 }, dst, 3.0);
    sim.step_until_no_events();
    assert_eq!(*seen.borrow(), vec![2, 1, 0]);
}
